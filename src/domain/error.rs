//! Domain error types.

/// Top-level error type for indextrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

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

    #[error("invalid algorithm setup: {reason}")]
    InvalidSetup { reason: String },

    #[error("invalid indicator: {reason}")]
    InvalidIndicator { reason: String },

    #[error("no data for {ticker} at {resolution} resolution")]
    NoData { ticker: String, resolution: String },

    #[error("algorithm assertion failed: {reason}")]
    AlgorithmAssertion { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Data { .. } => 3,
            TraderError::InvalidSetup { .. } | TraderError::InvalidIndicator { .. } => 4,
            TraderError::NoData { .. } => 5,
            TraderError::AlgorithmAssertion { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
