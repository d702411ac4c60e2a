use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stepwise_core::{Step, Tag, TagCategory, TrailingSemantic};
use thiserror::Error;

pub const STEPWISE_DIR_NAME: &str = ".stepwise";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_FINAL_FRACTION: f64 = 0.2;
pub const DEFAULT_COLLISION_TAG: &str = "GroundCollision";
pub const DEFAULT_SUCCESS_TAG: &str = "TargetsFound";
pub const DEFAULT_SUCCESS_MAX: f64 = 5.0;
/// Window labels every run report defines; a phase with one of these names
/// cannot be looked up by label.
pub const RESERVED_PHASE_NAMES: &[&str] = &["overall", "final", "last_rows"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepwiseConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub windows: WindowsConfig,
    #[serde(default)]
    pub derived: DerivedConfig,
    /// Static comparison policies: policy name -> metric name -> constants.
    #[serde(default)]
    pub baselines: BTreeMap<String, BTreeMap<Tag, BaselineMetric>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub category: TagCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl MetricsConfig {
    /// Explicit tag list when configured, otherwise the category defaults.
    pub fn requested_tags(&self) -> Vec<Tag> {
        match &self.tags {
            Some(tags) => tags.clone(),
            None => self
                .category
                .default_tags()
                .iter()
                .map(|tag| (*tag).to_owned())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowsConfig {
    #[serde(default = "default_final_fraction")]
    pub final_fraction: f64,
    #[serde(default)]
    pub final_semantic: TrailingSemantic,
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseConfig>,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            final_fraction: default_final_fraction(),
            final_semantic: TrailingSemantic::default(),
            phases: default_phases(),
        }
    }
}

/// Absolute step range `[low, high]`; `high = None` is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    #[serde(default)]
    pub low: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedConfig {
    #[serde(
        default = "default_collision_tag",
        skip_serializing_if = "Option::is_none"
    )]
    pub collision_tag: Option<Tag>,
    #[serde(
        default = "default_success_tag",
        skip_serializing_if = "Option::is_none"
    )]
    pub success_tag: Option<Tag>,
    #[serde(default = "default_success_max")]
    pub success_max: f64,
}

impl Default for DerivedConfig {
    fn default() -> Self {
        Self {
            collision_tag: default_collision_tag(),
            success_tag: default_success_tag(),
            success_max: default_success_max(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineMetric {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn stepwise_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(STEPWISE_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    stepwise_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<StepwiseConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(StepwiseConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: StepwiseConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<StepwiseConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(stepwise_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = StepwiseConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &StepwiseConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let fraction = config.windows.final_fraction;
    if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0) {
        warnings.push(ConfigWarning {
            code: "invalid_final_fraction",
            message: format!("windows.final_fraction must lie in (0, 1], got {fraction}"),
        });
    }

    if config.metrics.tags.as_ref().is_some_and(Vec::is_empty) {
        warnings.push(ConfigWarning {
            code: "empty_tag_override",
            message: "metrics.tags is set but empty; no metrics will be extracted".to_owned(),
        });
    }

    let success_max = config.derived.success_max;
    if !(success_max.is_finite() && success_max > 0.0) {
        warnings.push(ConfigWarning {
            code: "invalid_success_max",
            message: format!("derived.success_max must be positive, got {success_max}"),
        });
    }

    warnings.extend(phase_warnings(&config.windows.phases));

    for (policy, metrics) in &config.baselines {
        for (metric, constants) in metrics {
            if !constants.mean.is_finite() || !constants.std.is_finite() || constants.std < 0.0 {
                warnings.push(ConfigWarning {
                    code: "invalid_baseline",
                    message: format!(
                        "baseline {policy}.{metric} needs a finite mean and a non-negative std"
                    ),
                });
            }
        }
    }

    warnings
}

fn phase_warnings(phases: &[PhaseConfig]) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    for phase in phases {
        if !seen.insert(phase.name.as_str()) {
            warnings.push(ConfigWarning {
                code: "duplicate_phase_name",
                message: format!("phase '{}' is defined more than once", phase.name),
            });
        }
        if RESERVED_PHASE_NAMES.contains(&phase.name.as_str()) {
            warnings.push(ConfigWarning {
                code: "reserved_phase_name",
                message: format!("phase '{}' uses a reserved window name", phase.name),
            });
        }
        if phase.high.is_some_and(|high| high < phase.low) {
            warnings.push(ConfigWarning {
                code: "inverted_phase",
                message: format!("phase '{}' has high below low", phase.name),
            });
        }
    }

    let mut ordered: Vec<&PhaseConfig> = phases.iter().collect();
    ordered.sort_by_key(|phase| phase.low);
    for pair in ordered.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        let overlaps = match earlier.high {
            Some(high) => high >= later.low,
            None => true,
        };
        if overlaps {
            warnings.push(ConfigWarning {
                code: "overlapping_phases",
                message: format!(
                    "phases '{}' and '{}' overlap; phase ranges should be disjoint",
                    earlier.name, later.name
                ),
            });
        }
    }

    warnings
}

fn default_final_fraction() -> f64 {
    DEFAULT_FINAL_FRACTION
}

fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig {
            name: "early".to_owned(),
            low: 0,
            high: Some(1_000_000),
        },
        PhaseConfig {
            name: "mid".to_owned(),
            low: 1_000_001,
            high: Some(2_500_000),
        },
        PhaseConfig {
            name: "late".to_owned(),
            low: 2_500_001,
            high: None,
        },
    ]
}

fn default_collision_tag() -> Option<Tag> {
    Some(DEFAULT_COLLISION_TAG.to_owned())
}

fn default_success_tag() -> Option<Tag> {
    Some(DEFAULT_SUCCESS_TAG.to_owned())
}

fn default_success_max() -> f64 {
    DEFAULT_SUCCESS_MAX
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_config(mut config: StepwiseConfig) -> StepwiseConfig {
    config.metrics.tags = config.metrics.tags.take().map(|tags| {
        let mut seen = HashSet::new();
        tags.into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
            .collect()
    });
    config.derived.collision_tag = normalize_optional(config.derived.collision_tag.take());
    config.derived.success_tag = normalize_optional(config.derived.success_tag.take());

    for phase in &mut config.windows.phases {
        phase.name = phase.name.trim().to_owned();
    }

    config
}
