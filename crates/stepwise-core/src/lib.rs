use serde::{Deserialize, Serialize};
use thiserror::Error;

mod category;
mod semantic;

pub use category::TagCategory;
pub use semantic::TrailingSemantic;

pub type Tag = String;
pub type Step = u64;

pub const STEP_COLUMN: &str = "step";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub step: Step,
    pub value: f64,
}

impl Sample {
    pub fn new(step: Step, value: f64) -> Self {
        Self { step, value }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("series '{tag}' has non-increasing step {step} after {previous}")]
    NonIncreasingStep { tag: Tag, previous: Step, step: Step },
    #[error("series '{tag}' has non-finite value at step {step}")]
    NonFiniteValue { tag: Tag, step: Step },
}

/// Samples of one tag, strictly increasing by step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarSeries {
    tag: Tag,
    samples: Vec<Sample>,
}

impl ScalarSeries {
    pub fn new(tag: impl Into<Tag>, samples: Vec<Sample>) -> Result<Self, SeriesError> {
        let tag = tag.into();
        let mut previous: Option<Step> = None;
        for sample in &samples {
            if !sample.value.is_finite() {
                return Err(SeriesError::NonFiniteValue {
                    tag,
                    step: sample.step,
                });
            }
            if let Some(previous) = previous.filter(|previous| *previous >= sample.step) {
                return Err(SeriesError::NonIncreasingStep {
                    tag,
                    previous,
                    step: sample.step,
                });
            }
            previous = Some(sample.step);
        }

        Ok(Self { tag, samples })
    }

    /// Builds a series from samples in store order. Non-finite values are
    /// dropped; for a repeated step the sample written last wins.
    pub fn from_unordered(tag: impl Into<Tag>, samples: impl IntoIterator<Item = Sample>) -> Self {
        let mut samples: Vec<Sample> = samples
            .into_iter()
            .filter(|sample| sample.value.is_finite())
            .collect();
        // Stable sort keeps store order among equal steps.
        samples.sort_by_key(|sample| sample.step);

        let mut deduped: Vec<Sample> = Vec::with_capacity(samples.len());
        for sample in samples {
            match deduped.last_mut() {
                Some(last) if last.step == sample.step => *last = sample,
                _ => deduped.push(sample),
            }
        }

        Self {
            tag: tag.into(),
            samples: deduped,
        }
    }

    pub fn empty(tag: impl Into<Tag>) -> Self {
        Self {
            tag: tag.into(),
            samples: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.samples.iter().map(|sample| sample.step)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|sample| sample.value)
    }

    pub fn first_step(&self) -> Option<Step> {
        self.samples.first().map(|sample| sample.step)
    }

    pub fn last_step(&self) -> Option<Step> {
        self.samples.last().map(|sample| sample.step)
    }
}
