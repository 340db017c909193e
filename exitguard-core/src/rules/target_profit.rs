//! Fixed profit target.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, MarketSnapshot, Position};
use crate::error::DataError;
use crate::trailing::PROFIT_EPSILON;

use super::ProfitRule;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetProfitRule {
    /// Percent.
    pub profit_target: f64,
}

impl TargetProfitRule {
    pub fn new(profit_target: f64) -> Self {
        Self { profit_target }
    }
}

impl ProfitRule for TargetProfitRule {
    fn name(&self) -> &'static str {
        "target_profit"
    }

    fn should_close(
        &self,
        position: &Position,
        price: f64,
        _now: DateTime<Utc>,
        _market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError> {
        let profit = position.profit_pct_at(price);
        Ok((profit + PROFIT_EPSILON >= self.profit_target).then_some(ExitReason::TargetProfit))
    }
}
