//! Volatility-bucketed profit target.
//!
//! Calm markets take profit early, volatile ones let it run:
//! low (≤ low boundary), medium (≤ medium boundary), high (above).

use chrono::{DateTime, Utc};

use crate::config::DynamicVolatilityConfig;
use crate::domain::{ExitReason, MarketSnapshot, Position};
use crate::error::DataError;
use crate::trailing::PROFIT_EPSILON;

use super::ProfitRule;

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicVolatilityRule {
    pub low_vol_threshold: f64,
    pub medium_vol_threshold: f64,
    pub low_vol_target: f64,
    pub medium_vol_target: f64,
    pub high_vol_target: f64,
}

impl DynamicVolatilityRule {
    pub fn from_config(cfg: &DynamicVolatilityConfig) -> Self {
        Self {
            low_vol_threshold: cfg.low_vol_threshold,
            medium_vol_threshold: cfg.medium_vol_threshold,
            low_vol_target: cfg.low_vol_target,
            medium_vol_target: cfg.medium_vol_target,
            high_vol_target: cfg.high_vol_target,
        }
    }

    /// Profit target for a volatility reading.
    pub fn target_for(&self, volatility: f64) -> f64 {
        if volatility <= self.low_vol_threshold {
            self.low_vol_target
        } else if volatility <= self.medium_vol_threshold {
            self.medium_vol_target
        } else {
            self.high_vol_target
        }
    }
}

impl ProfitRule for DynamicVolatilityRule {
    fn name(&self) -> &'static str {
        "dynamic_volatility"
    }

    fn should_close(
        &self,
        position: &Position,
        price: f64,
        _now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> Result<Option<ExitReason>, DataError> {
        let volatility = market
            .volatility
            .filter(|v| v.is_finite())
            .ok_or(DataError::MissingVolatility)?;
        let target = self.target_for(volatility);
        let profit = position.profit_pct_at(price);
        Ok((profit + PROFIT_EPSILON >= target).then_some(ExitReason::VolatilityTarget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::rules::test_support::{position, t0};

    fn rule() -> DynamicVolatilityRule {
        DynamicVolatilityRule::from_config(&DynamicVolatilityConfig::default())
    }

    #[test]
    fn buckets_pick_targets() {
        let r = rule();
        assert_eq!(r.target_for(0.005), 1.5);
        assert_eq!(r.target_for(0.01), 1.5);
        assert_eq!(r.target_for(0.02), 3.0);
        assert_eq!(r.target_for(0.03), 3.0);
        assert_eq!(r.target_for(0.08), 5.0);
    }

    #[test]
    fn calm_market_closes_early() {
        let pos = position(Side::Long);
        let calm = MarketSnapshot::empty().with_volatility(0.005);
        let wild = MarketSnapshot::empty().with_volatility(0.08);
        assert_eq!(
            rule().should_close(&pos, 102.0, t0(), &calm),
            Ok(Some(ExitReason::VolatilityTarget))
        );
        assert_eq!(rule().should_close(&pos, 102.0, t0(), &wild), Ok(None));
    }

    #[test]
    fn missing_volatility_abstains() {
        let pos = position(Side::Long);
        assert_eq!(
            rule().should_close(&pos, 120.0, t0(), &MarketSnapshot::empty()),
            Err(DataError::MissingVolatility)
        );
    }
}
