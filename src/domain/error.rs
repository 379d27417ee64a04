//! Domain error types.
//!
//! Only conditions that must abort a run are errors. Insufficient warm-up
//! history and ruin are absorbed into [`crate::domain::ledger::Stats`].

use chrono::{DateTime, Utc};

/// Top-level error type for emacross.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy '{name}' (known: {known})")]
    UnknownStrategy { name: String, known: String },

    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    #[error("timestamps not strictly increasing at bar {index}: {current} follows {previous}")]
    NonMonotonic {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("price series is empty")]
    EmptySeries,

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) | EngineError::Report { .. } => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::UnknownStrategy { .. } => 4,
            EngineError::MalformedInput { .. }
            | EngineError::NonMonotonic { .. }
            | EngineError::EmptySeries => 5,
        };
        std::process::ExitCode::from(code)
    }
}
