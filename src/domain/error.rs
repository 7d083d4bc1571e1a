//! Domain error types.

/// Coarse classification of a [`BacktestError`], for callers that branch on
/// the failure category rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataUnavailable,
    InsufficientData,
    StrategyEvaluation,
    Configuration,
    Sink,
    Io,
}

/// Top-level error type for barlab.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("strategy {strategy} failed to evaluate: {reason}")]
    StrategyEvaluation { strategy: String, reason: String },

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

    #[error("walk-forward period {period} failed: {source}")]
    WalkForwardPeriod {
        period: usize,
        #[source]
        source: Box<BacktestError>,
    },

    #[error("result sink error: {reason}")]
    Sink { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BacktestError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            BacktestError::InsufficientData { .. } => ErrorKind::InsufficientData,
            BacktestError::StrategyEvaluation { .. } => ErrorKind::StrategyEvaluation,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => ErrorKind::Configuration,
            BacktestError::WalkForwardPeriod { source, .. } => source.kind(),
            BacktestError::Sink { .. } => ErrorKind::Sink,
            BacktestError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Sink => 3,
            ErrorKind::StrategyEvaluation => 4,
            ErrorKind::DataUnavailable | ErrorKind::InsufficientData => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_variants_share_kind() {
        let missing = BacktestError::ConfigMissing {
            section: "strategy".into(),
            key: "kind".into(),
        };
        let invalid = BacktestError::invalid("strategy", "short_period", "must be positive");
        assert_eq!(missing.kind(), ErrorKind::Configuration);
        assert_eq!(invalid.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn wrapped_period_error_reports_source_kind() {
        let err = BacktestError::WalkForwardPeriod {
            period: 3,
            source: Box::new(BacktestError::InsufficientData {
                bars: 40,
                minimum: 150,
            }),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert_eq!(
            err.to_string(),
            "walk-forward period 3 failed: insufficient data: have 40 bars, need 150"
        );
    }

    #[test]
    fn display_includes_context() {
        let err = BacktestError::DataUnavailable {
            symbol: "BTCUSDT".into(),
            reason: "file not found".into(),
        };
        assert_eq!(err.to_string(), "data unavailable for BTCUSDT: file not found");
    }
}
