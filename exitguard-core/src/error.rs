//! Error taxonomy.
//!
//! Only [`ConfigError`] is ever returned to a caller as `Err` from the
//! position hot path (at initialize). The other three are produced, logged
//! and swallowed: the affected component abstains or the mutation is refused.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{MarketRegime, StrategyType};

/// Missing or invalid strategy, regime or rule configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no configuration for strategy '{0}'")]
    MissingStrategy(StrategyType),

    #[error("strategy '{strategy}' has no configuration for regime '{regime}'")]
    MissingRegime {
        strategy: StrategyType,
        regime: MarketRegime,
    },

    #[error("strategy '{strategy}' / regime '{regime}': missing field '{field}'")]
    MissingField {
        strategy: StrategyType,
        regime: MarketRegime,
        field: &'static str,
    },

    #[error("strategy '{strategy}' / regime '{regime}': invalid '{field}': {reason}")]
    InvalidField {
        strategy: StrategyType,
        regime: MarketRegime,
        field: &'static str,
        reason: String,
    },

    #[error("invalid {rule} rule: {reason}")]
    InvalidRule { rule: &'static str, reason: String },

    #[error("invalid volatility adjuster: {0}")]
    InvalidVolatility(String),

    #[error("invalid history config: {0}")]
    InvalidHistory(String),

    #[error("invalid position '{field}': {value}")]
    InvalidPosition { field: &'static str, value: f64 },
}

/// A strategy or rule needed market data that was not supplied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("no ATR reading available")]
    MissingAtr,
    #[error("no RSI reading available")]
    MissingRsi,
    #[error("no volatility reading available")]
    MissingVolatility,
    #[error("need {needed} candles, have {available}")]
    NotEnoughCandles { needed: usize, available: usize },
    #[error("unusable price: {0}")]
    InvalidPrice(f64),
}

/// Closed-position history could not be persisted.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("history I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A transition that would break a position invariant. Never applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("stop would loosen from {previous} to {proposed}")]
    StopRegressed { previous: f64, proposed: f64 },

    #[error("trailing activation would revert")]
    ActivationReverted,

    #[error("price extremes would regress (high {prev_high} -> {next_high}, low {prev_low} -> {next_low})")]
    ExtremesRegressed {
        prev_high: f64,
        next_high: f64,
        prev_low: f64,
        next_low: f64,
    },

    #[error("remaining position would grow from {previous} to {proposed}")]
    RemainingIncreased { previous: f64, proposed: f64 },

    #[error("remaining position {0} outside [0, 1]")]
    RemainingOutOfRange(f64),

    #[error("partial-exit level at {threshold}% would fire twice")]
    LevelRefired { threshold: f64 },

    #[error("closed position would be mutated")]
    MutatedAfterClose,
}
