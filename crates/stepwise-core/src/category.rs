use serde::{Deserialize, Serialize};

const PERFORMANCE_TAGS: &[&str] = &[
    "Reward",
    "Environment/Cumulative Reward",
    "Environment/Episode Length",
    "EpisodeLength",
    "TargetsFound",
    "PathEfficiency",
    "AngleStability",
    "GroundCollision",
];

const TRAINING_TAGS: &[&str] = &[
    "Losses/Policy Loss",
    "Losses/Value Loss",
    "Losses/Pretraining Loss",
];

const POLICY_TAGS: &[&str] = &[
    "Policy/Entropy",
    "Policy/Extrinsic Value Estimate",
    "Policy/Extrinsic Reward",
    "Policy/Learning Rate",
    "Policy/Epsilon",
    "Policy/Beta",
];

/// Groups of scalar tags emitted by a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    #[default]
    Performance,
    Training,
    Policy,
}

impl TagCategory {
    pub const ALL: [TagCategory; 3] = [Self::Performance, Self::Training, Self::Policy];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Training => "training",
            Self::Policy => "policy",
        }
    }

    pub fn default_tags(self) -> &'static [&'static str] {
        match self {
            Self::Performance => PERFORMANCE_TAGS,
            Self::Training => TRAINING_TAGS,
            Self::Policy => POLICY_TAGS,
        }
    }

    pub fn of_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.default_tags().contains(&tag))
    }
}

impl std::str::FromStr for TagCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "performance" => Ok(Self::Performance),
            "training" => Ok(Self::Training),
            "policy" => Ok(Self::Policy),
            other => Err(format!(
                "invalid tag category '{other}', expected one of: performance, training, policy"
            )),
        }
    }
}
