//! Domain error types.
//!
//! Configuration and missing-input failures are hard errors raised while
//! building indicator series. Data insufficiency is never an error: the
//! evaluators resolve it to `false`.

/// Top-level error type for ruletrader.
#[derive(Debug, thiserror::Error)]
pub enum RuleTraderError {
    #[error("{indicator} indicator requires a {parameter} parameter")]
    MissingParameter {
        indicator: String,
        parameter: String,
    },

    #[error("{indicator} indicator requires {input}")]
    MissingInput { indicator: String, input: String },

    #[error("strategy parse error in {source_name}: {reason}")]
    StrategyParse { source_name: String, reason: String },

    #[error("invalid strategy: {}", reasons.join("; "))]
    StrategyInvalid { reasons: Vec<String> },

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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol} on {timeframe}")]
    NoData { symbol: String, timeframe: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuleTraderError {
    pub(crate) fn missing_parameter(indicator: &str, parameter: &str) -> Self {
        RuleTraderError::MissingParameter {
            indicator: indicator.to_string(),
            parameter: parameter.to_string(),
        }
    }

    pub(crate) fn missing_input(indicator: &str, input: &str) -> Self {
        RuleTraderError::MissingInput {
            indicator: indicator.to_string(),
            input: input.to_string(),
        }
    }
}

impl From<&RuleTraderError> for std::process::ExitCode {
    fn from(err: &RuleTraderError) -> Self {
        let code: u8 = match err {
            RuleTraderError::Io(_) => 1,
            RuleTraderError::ConfigParse { .. }
            | RuleTraderError::ConfigMissing { .. }
            | RuleTraderError::ConfigInvalid { .. } => 2,
            RuleTraderError::Data { .. } | RuleTraderError::NoData { .. } => 3,
            RuleTraderError::StrategyParse { .. } | RuleTraderError::StrategyInvalid { .. } => 4,
            RuleTraderError::MissingParameter { .. } | RuleTraderError::MissingInput { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
