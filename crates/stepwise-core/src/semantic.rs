use serde::{Deserialize, Serialize};

/// How a trailing fraction of a run is measured.
///
/// `ByStepValue` keeps rows whose step is at or above `max(step) * (1 - fraction)`.
/// `ByRowPosition` keeps the last `ceil(rows * fraction)` rows. The two differ
/// whenever the sampling density changes over the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSemantic {
    ByStepValue,
    #[default]
    ByRowPosition,
}

impl TrailingSemantic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByStepValue => "by_step_value",
            Self::ByRowPosition => "by_row_position",
        }
    }
}

impl std::str::FromStr for TrailingSemantic {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "by_step_value" | "step" => Ok(Self::ByStepValue),
            "by_row_position" | "row" => Ok(Self::ByRowPosition),
            other => Err(format!(
                "invalid trailing semantic '{other}', expected one of: by_step_value, by_row_position"
            )),
        }
    }
}
