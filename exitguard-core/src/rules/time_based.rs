//! Time-based exit: close once the position has been held long enough,
//! regardless of price.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, MarketSnapshot, Position};
use crate::error::DataError;

use super::ProfitRule;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBasedRule {
    /// Maximum hold time in hours.
    pub max_hold_hours: f64,
}

impl TimeBasedRule {
    pub fn new(max_hold_hours: f64) -> Self {
        Self { max_hold_hours }
    }
}

impl ProfitRule for TimeBasedRule {
    fn name(&self) -> &'static str {
        "time_based"
    }

    fn should_close(
        &self,
        position: &Position,
        _price: f64,
        now: DateTime<Utc>,
        _market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError> {
        if position.hold_hours(now) >= self.max_hold_hours {
            Ok(Some(ExitReason::TimeLimit))
        } else {
            Ok(None)
        }
    }
}
