//! Profit rules: discretionary close predicates evaluated after the trailing
//! stop has had its say.
//!
//! Rules are read-only over the position and a market snapshot. A rule that
//! needs data the snapshot does not carry returns a [`DataError`]; the
//! evaluator logs it and treats the rule as "no close".
//!
//! ## Concrete implementations
//!
//! - [`TimeBasedRule`] — close after a maximum hold time
//! - [`TargetProfitRule`] — close at a fixed profit target
//! - [`IndicatorRule`] — close on RSI overbought (long) / oversold (short)
//! - [`PriceReversalRule`] — close after N consecutive adverse candles
//! - [`DynamicVolatilityRule`] — profit target chosen by volatility bucket

pub mod dynamic_volatility;
pub mod evaluator;
pub mod indicator;
pub mod reversal;
pub mod target_profit;
pub mod time_based;

pub use dynamic_volatility::DynamicVolatilityRule;
pub use evaluator::{ProfitRuleEvaluator, RuleMatch};
pub use indicator::IndicatorRule;
pub use reversal::PriceReversalRule;
pub use target_profit::TargetProfitRule;
pub use time_based::TimeBasedRule;

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, MarketSnapshot, Position};
use crate::error::DataError;

/// A side-effect-free close predicate.
pub trait ProfitRule {
    fn name(&self) -> &'static str;

    /// `Ok(Some(reason))` to close, `Ok(None)` to hold, `Err` when the rule
    /// cannot decide for lack of data.
    fn should_close(
        &self,
        position: &Position,
        price: f64,
        now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError>;
}

/// Closed set of rule variants, stamped into a position at open.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfitRuleKind {
    TimeBased(TimeBasedRule),
    TargetProfit(TargetProfitRule),
    Indicator(IndicatorRule),
    PriceReversal(PriceReversalRule),
    DynamicVolatility(DynamicVolatilityRule),
}

impl ProfitRule for ProfitRuleKind {
    fn name(&self) -> &'static str {
        match self {
            Self::TimeBased(r) => r.name(),
            Self::TargetProfit(r) => r.name(),
            Self::Indicator(r) => r.name(),
            Self::PriceReversal(r) => r.name(),
            Self::DynamicVolatility(r) => r.name(),
        }
    }

    fn should_close(
        &self,
        position: &Position,
        price: f64,
        now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError> {
        match self {
            Self::TimeBased(r) => r.should_close(position, price, now, market),
            Self::TargetProfit(r) => r.should_close(position, price, now, market),
            Self::Indicator(r) => r.should_close(position, price, now, market),
            Self::PriceReversal(r) => r.should_close(position, price, now, market),
            Self::DynamicVolatility(r) => r.should_close(position, price, now, market),
        }
    }
}
