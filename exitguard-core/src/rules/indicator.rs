//! RSI exit: longs close when overbought, shorts when oversold.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, MarketSnapshot, Position, Side};
use crate::error::DataError;

use super::ProfitRule;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRule {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

impl IndicatorRule {
    pub fn new(rsi_overbought: f64, rsi_oversold: f64) -> Self {
        Self {
            rsi_overbought,
            rsi_oversold,
        }
    }
}

impl ProfitRule for IndicatorRule {
    fn name(&self) -> &'static str {
        "indicator"
    }

    fn should_close(
        &self,
        position: &Position,
        _price: f64,
        _now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError> {
        let rsi = market
            .rsi
            .filter(|r| r.is_finite())
            .ok_or(DataError::MissingRsi)?;
        let signal = match position.side {
            Side::Long => rsi > self.rsi_overbought,
            Side::Short => rsi < self.rsi_oversold,
        };
        Ok(signal.then_some(ExitReason::IndicatorSignal))
    }
}
