//! Volatility → callback multiplier.
//!
//! Piecewise linear: flat `low_multiplier` at or below `low_threshold`, flat
//! `high_multiplier` at or above `high_threshold`, linear in between.

use crate::config::VolatilityConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityAdjuster {
    config: VolatilityConfig,
}

impl VolatilityAdjuster {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    /// Adjuster that always returns 1.0.
    pub fn disabled() -> Self {
        Self::new(VolatilityConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn multiplier(&self, volatility: f64) -> f64 {
        let c = &self.config;
        if !c.enabled || !volatility.is_finite() {
            return 1.0;
        }
        if volatility <= c.low_threshold {
            return c.low_multiplier;
        }
        if volatility >= c.high_threshold {
            return c.high_multiplier;
        }
        let t = (volatility - c.low_threshold) / (c.high_threshold - c.low_threshold);
        c.low_multiplier + t * (c.high_multiplier - c.low_multiplier)
    }

    /// Multiplier for an optional reading; no reading means neutral.
    pub fn multiplier_for(&self, volatility: Option<f64>) -> f64 {
        volatility.map_or(1.0, |v| self.multiplier(v))
    }
}
