//! Price reversal: the last N candles all moved against the position.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, MarketSnapshot, Position, Side};
use crate::error::DataError;

use super::ProfitRule;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceReversalRule {
    pub candle_count: usize,
}

impl PriceReversalRule {
    pub fn new(candle_count: usize) -> Self {
        Self { candle_count }
    }
}

impl ProfitRule for PriceReversalRule {
    fn name(&self) -> &'static str {
        "price_reversal"
    }

    fn should_close(
        &self,
        position: &Position,
        _price: f64,
        _now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError> {
        let candles = &market.recent_candles;
        if self.candle_count == 0 || candles.len() < self.candle_count {
            return Err(DataError::NotEnoughCandles {
                needed: self.candle_count,
                available: candles.len(),
            });
        }
        let tail = &candles[candles.len() - self.candle_count..];
        let reversed = match position.side {
            Side::Long => tail.iter().all(|c| c.is_bearish()),
            Side::Short => tail.iter().all(|c| c.is_bullish()),
        };
        Ok(reversed.then_some(ExitReason::PriceReversal))
    }
}
