use serde::{Deserialize, Serialize};
use stepwise_config::ConfigError;
use stepwise_source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    TagNotFound,
    EmptyWindow,
    SchemaMismatch,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TagNotFound => "tag_not_found",
            Self::EmptyWindow => "empty_window",
            Self::SchemaMismatch => "schema_mismatch",
        }
    }
}

/// Non-fatal condition recorded alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub code: WarningCode,
    pub message: String,
}

impl AnalysisWarning {
    pub(crate) fn emit(code: WarningCode, message: String) -> Self {
        tracing::warn!(code = code.as_str(), "{message}");
        Self { code, message }
    }
}
