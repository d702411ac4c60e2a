use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use stepwise_config::{BaselineMetric, DerivedConfig};
use stepwise_core::Tag;

use crate::{AnalysisError, AnalysisWarning, DerivedIndicators, MetricSummary, WarningCode};

pub const COMPARISON_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyOrigin {
    Computed { run_id: String, window: String },
    Baseline,
}

/// Metric summaries of one policy, either computed from a run or injected
/// as baseline constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub policy: String,
    pub origin: PolicyOrigin,
    pub metrics: BTreeMap<Tag, MetricSummary>,
    pub derived: DerivedIndicators,
}

impl PolicySummary {
    pub fn computed(
        policy: impl Into<String>,
        window: impl Into<String>,
        metrics: BTreeMap<Tag, MetricSummary>,
        derived: DerivedIndicators,
    ) -> Self {
        let policy = policy.into();
        Self {
            origin: PolicyOrigin::Computed {
                run_id: policy.clone(),
                window: window.into(),
            },
            policy,
            metrics,
            derived,
        }
    }

    pub fn baseline(
        policy: impl Into<String>,
        constants: &BTreeMap<Tag, BaselineMetric>,
        derived_config: &DerivedConfig,
    ) -> Self {
        let metrics: BTreeMap<Tag, MetricSummary> = constants
            .iter()
            .map(|(metric, constants)| (metric.clone(), MetricSummary::from_baseline(constants)))
            .collect();
        let derived = DerivedIndicators::compute(&metrics, derived_config);
        Self {
            policy: policy.into(),
            origin: PolicyOrigin::Baseline,
            metrics,
            derived,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonCell {
    Available(MetricSummary),
    Unavailable,
}

impl ComparisonCell {
    pub fn summary(&self) -> Option<&MetricSummary> {
        match self {
            Self::Available(summary) => Some(summary),
            Self::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub policy: String,
    pub origin: PolicyOrigin,
    pub cells: BTreeMap<Tag, ComparisonCell>,
    pub derived: DerivedIndicators,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMismatch {
    pub policy: String,
    pub missing: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub schema_version: String,
    pub metrics: Vec<Tag>,
    pub rows: Vec<ComparisonRow>,
    pub mismatches: Vec<SchemaMismatch>,
    pub warnings: Vec<AnalysisWarning>,
}

impl ComparisonTable {
    pub fn row(&self, policy: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|row| row.policy == policy)
    }

    pub fn cell(&self, policy: &str, metric: &str) -> Option<&ComparisonCell> {
        self.row(policy).and_then(|row| row.cells.get(metric))
    }
}

/// Groups policy summaries into one table keyed by the union of their
/// metrics. A policy lacking a metric gets an `Unavailable` cell and a
/// mismatch record; assembly itself only fails on duplicate policy names.
pub fn assemble(policies: Vec<PolicySummary>) -> Result<ComparisonTable, AnalysisError> {
    let mut names = HashSet::new();
    for summary in &policies {
        if !names.insert(summary.policy.as_str()) {
            return Err(AnalysisError::InvalidArgument(format!(
                "policy '{}' appears more than once",
                summary.policy
            )));
        }
    }

    let mut metrics: Vec<Tag> = Vec::new();
    for summary in &policies {
        for metric in summary.metrics.keys() {
            if !metrics.contains(metric) {
                metrics.push(metric.clone());
            }
        }
    }

    let mut mismatches = Vec::new();
    let mut warnings = Vec::new();
    let mut rows = Vec::with_capacity(policies.len());
    for summary in policies {
        let missing: Vec<Tag> = metrics
            .iter()
            .filter(|metric| !summary.metrics.contains_key(*metric))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warnings.push(AnalysisWarning::emit(
                WarningCode::SchemaMismatch,
                format!(
                    "policy '{}' has no value for {}",
                    summary.policy,
                    missing.join(", ")
                ),
            ));
            mismatches.push(SchemaMismatch {
                policy: summary.policy.clone(),
                missing,
            });
        }

        let cells = metrics
            .iter()
            .map(|metric| {
                let cell = match summary.metrics.get(metric) {
                    Some(found) => ComparisonCell::Available(*found),
                    None => ComparisonCell::Unavailable,
                };
                (metric.clone(), cell)
            })
            .collect();

        rows.push(ComparisonRow {
            policy: summary.policy,
            origin: summary.origin,
            cells,
            derived: summary.derived,
        });
    }

    Ok(ComparisonTable {
        schema_version: COMPARISON_SCHEMA_VERSION.to_owned(),
        metrics,
        rows,
        mismatches,
        warnings,
    })
}
