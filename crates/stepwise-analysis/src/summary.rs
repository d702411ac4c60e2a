use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stepwise_config::{BaselineMetric, DerivedConfig};
use stepwise_core::{Step, Tag};

use crate::{AlignedTable, AnalysisError, Window};

/// Window statistics for one metric.
///
/// `std` is the sample standard deviation (N - 1 denominator) and is 0 for a
/// single value. With no defined values every statistic is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MetricSummary {
    pub fn from_baseline(constants: &BaselineMetric) -> Self {
        Self {
            count: constants.count,
            mean: Some(constants.mean),
            std: Some(constants.std),
            min: None,
            max: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.mean.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestSample {
    pub step: Step,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DerivedIndicators {
    pub collision_rate_percent: Option<f64>,
    pub success_rate_percent: Option<f64>,
}

impl DerivedIndicators {
    pub fn compute(metrics: &BTreeMap<Tag, MetricSummary>, config: &DerivedConfig) -> Self {
        let collision = config
            .collision_tag
            .as_deref()
            .and_then(|tag| metrics.get(tag))
            .and_then(collision_rate_percent);

        let success = config
            .success_tag
            .as_deref()
            .and_then(|tag| metrics.get(tag))
            .and_then(|summary| match success_rate_percent(summary, config.success_max) {
                Ok(rate) => rate,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping success rate");
                    None
                }
            });

        Self {
            collision_rate_percent: collision,
            success_rate_percent: success,
        }
    }
}

pub fn summarize_values(values: &[f64]) -> MetricSummary {
    let count = values.len();
    if count == 0 {
        return MetricSummary::default();
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let squared: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
        (squared / (count - 1) as f64).sqrt()
    } else {
        0.0
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    MetricSummary {
        count,
        mean: Some(mean),
        std: Some(std),
        min: Some(min),
        max: Some(max),
    }
}

/// Summaries for `tags` over the window's defined cells. Tags missing from
/// the table summarize to count 0.
pub fn summarize(window: &Window<'_>, tags: &[Tag]) -> BTreeMap<Tag, MetricSummary> {
    tags.iter()
        .map(|tag| {
            let values: Vec<f64> = window
                .values(tag)
                .map(|cells| cells.iter().flatten().copied().collect())
                .unwrap_or_default();
            (tag.clone(), summarize_values(&values))
        })
        .collect()
}

/// Percentage of episodes flagged by a 0/1 collision indicator.
pub fn collision_rate_percent(indicator: &MetricSummary) -> Option<f64> {
    indicator.mean.map(|mean| mean * 100.0)
}

pub fn success_rate_percent(
    metric: &MetricSummary,
    max_possible: f64,
) -> Result<Option<f64>, AnalysisError> {
    if !(max_possible.is_finite() && max_possible > 0.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "success maximum must be positive, got {max_possible}"
        )));
    }
    Ok(metric.mean.map(|mean| mean / max_possible * 100.0))
}

/// Highest value of `tag` over the whole table; the earliest step wins ties.
pub fn best_of(table: &AlignedTable, tag: &str) -> Option<BestSample> {
    extreme_of(table, tag, |candidate, current| candidate > current)
}

/// Lowest value of `tag` over the whole table; the earliest step wins ties.
pub fn worst_of(table: &AlignedTable, tag: &str) -> Option<BestSample> {
    extreme_of(table, tag, |candidate, current| candidate < current)
}

fn extreme_of(
    table: &AlignedTable,
    tag: &str,
    better: impl Fn(f64, f64) -> bool,
) -> Option<BestSample> {
    let column = table.column(tag)?;
    table
        .steps()
        .iter()
        .zip(column.values())
        .filter_map(|(step, value)| value.map(|value| BestSample { step: *step, value }))
        .fold(None, |current: Option<BestSample>, candidate| match current {
            Some(current) if !better(candidate.value, current.value) => Some(current),
            _ => Some(candidate),
        })
}

#[cfg(test)]
mod tests {
    use stepwise_core::{Sample, TrailingSemantic};
    use stepwise_source::InMemorySource;

    use super::*;
    use crate::{align, select_all, select_by_step_range, select_by_trailing_fraction};

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be defined");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn reward_table() -> AlignedTable {
        let mut source = InMemorySource::new();
        source.insert_samples("Reward", [Sample::new(0, 1.0), Sample::new(20, 3.0)]);
        source.insert_samples("Clock", [Sample::new(10, 0.0), Sample::new(30, 0.0)]);
        align(&["Reward".to_owned(), "Clock".to_owned()], &source).expect("align")
    }

    #[test]
    fn forward_filled_mean_over_full_window() {
        let table = reward_table();
        let summaries = summarize(&select_all(&table), &["Reward".to_owned()]);
        let reward = summaries["Reward"];

        assert_eq!(reward.count, 4);
        assert_close(reward.mean, 2.0);
        assert_eq!(reward.min, Some(1.0));
        assert_eq!(reward.max, Some(3.0));
        // values 1, 1, 3, 3: squared deviations sum to 4, divided by N - 1.
        assert_close(reward.std, (4.0f64 / 3.0).sqrt());
    }

    #[test]
    fn single_value_has_zero_std_and_empty_has_no_statistics() {
        let single = summarize_values(&[4.5]);
        assert_eq!(single.count, 1);
        assert_eq!(single.std, Some(0.0));

        let empty = summarize_values(&[]);
        assert_eq!(empty, MetricSummary::default());
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.std, None);
        assert!(!empty.has_data());
    }

    #[test]
    fn wholly_undefined_tag_yields_count_zero_not_zero_mean() {
        let mut source = InMemorySource::new();
        source.insert_samples("Reward", [Sample::new(0, 1.0), Sample::new(10, 2.0)]);
        source.insert_samples("TargetsFound", [Sample::new(50, 4.0)]);
        let table = align(
            &["Reward".to_owned(), "TargetsFound".to_owned()],
            &source,
        )
        .expect("align");

        let early = select_by_step_range(&table, 0, Some(10)).expect("early");
        let summaries = summarize(
            &early,
            &[
                "Reward".to_owned(),
                "TargetsFound".to_owned(),
                "Absent".to_owned(),
            ],
        );

        assert_eq!(summaries["Reward"].count, 2);
        assert_eq!(summaries["TargetsFound"], MetricSummary::default());
        assert_eq!(summaries["Absent"].count, 0);
        assert_eq!(summaries["Absent"].mean, None);
    }

    #[test]
    fn success_rate_is_fraction_of_maximum() {
        let targets = summarize_values(&[2.0, 3.0, 2.5]);
        assert_close(
            success_rate_percent(&targets, 5.0).expect("rate"),
            50.0,
        );

        let no_data = MetricSummary::default();
        assert_eq!(success_rate_percent(&no_data, 5.0).expect("rate"), None);

        let err = success_rate_percent(&targets, 0.0).expect_err("zero maximum");
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));
    }

    #[test]
    fn collision_rate_scales_indicator_mean() {
        let indicator = MetricSummary {
            count: 100,
            mean: Some(0.12),
            std: Some(0.3),
            min: Some(0.0),
            max: Some(1.0),
        };
        assert_close(collision_rate_percent(&indicator), 12.0);
        assert_eq!(collision_rate_percent(&MetricSummary::default()), None);
    }

    #[test]
    fn best_of_reports_step_of_maximum_over_full_table() {
        let mut source = InMemorySource::new();
        source.insert_samples(
            "Reward",
            [
                Sample::new(100, -3.0),
                Sample::new(200, 7.8),
                Sample::new(300, 4.1),
            ],
        );
        let table = align(&["Reward".to_owned()], &source).expect("align");

        assert_eq!(
            best_of(&table, "Reward"),
            Some(BestSample {
                step: 200,
                value: 7.8
            })
        );
        assert_eq!(
            worst_of(&table, "Reward"),
            Some(BestSample {
                step: 100,
                value: -3.0
            })
        );
        assert_eq!(best_of(&table, "Missing"), None);
    }

    #[test]
    fn best_of_prefers_earliest_step_on_ties() {
        let table = reward_table();
        // Reward is 3.0 from step 20 onward through forward fill.
        assert_eq!(
            best_of(&table, "Reward"),
            Some(BestSample {
                step: 20,
                value: 3.0
            })
        );
    }

    #[test]
    fn derived_indicators_use_configured_tags() {
        let mut source = InMemorySource::new();
        source.insert_samples(
            "GroundCollision",
            [Sample::new(1, 0.0), Sample::new(2, 1.0), Sample::new(3, 0.0), Sample::new(4, 1.0)],
        );
        source.insert_samples("TargetsFound", [Sample::new(1, 5.0), Sample::new(4, 3.0)]);
        let tags = ["GroundCollision".to_owned(), "TargetsFound".to_owned()];
        let table = align(&tags, &source).expect("align");
        let window = select_by_trailing_fraction(&table, 1.0, TrailingSemantic::ByRowPosition)
            .expect("window");
        let metrics = summarize(&window, &tags);

        let derived = DerivedIndicators::compute(&metrics, &DerivedConfig::default());

        assert_close(derived.collision_rate_percent, 50.0);
        // TargetsFound cells: 5, 5, 5, 3 -> mean 4.5 of 5.
        assert_close(derived.success_rate_percent, 90.0);

        let disabled = DerivedConfig {
            collision_tag: None,
            success_tag: None,
            success_max: 5.0,
        };
        assert_eq!(
            DerivedIndicators::compute(&metrics, &disabled),
            DerivedIndicators::default()
        );
    }
}
