//! Percentage trailing stop: trail a fixed (or profit-scaled) percentage
//! behind the current price once profit reaches the activation level.
//!
//! For longs: stop = price * (1 - callback/100).
//! For shorts: stop = price * (1 + callback/100).
//!
//! With `use_dynamic_callback` the callback widens linearly from
//! `min_callback` to `max_callback` as profit grows to 10%, then is scaled by
//! the volatility multiplier.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

use super::{StopProposal, TickContext, TrailingStopStrategy, PROFIT_EPSILON};

/// Profit (percent) at which the dynamic callback reaches `max_callback`.
const DYNAMIC_CALLBACK_FULL_PROFIT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageParams {
    pub activation_percent: f64,
    pub callback_percent: f64,
    pub min_callback: f64,
    pub max_callback: f64,
    pub use_dynamic_callback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageTrailing {
    pub params: PercentageParams,
}

impl PercentageTrailing {
    pub fn new(params: PercentageParams) -> Self {
        Self { params }
    }

    /// Callback distance in percent for the given profit and volatility multiplier.
    pub fn callback(&self, profit_pct: f64, volatility_multiplier: f64) -> f64 {
        let p = &self.params;
        if !p.use_dynamic_callback {
            return p.callback_percent;
        }
        let progress = (profit_pct / DYNAMIC_CALLBACK_FULL_PROFIT).clamp(0.0, 1.0);
        let base = (p.min_callback + progress * (p.max_callback - p.min_callback))
            .clamp(p.min_callback, p.max_callback);
        base * volatility_multiplier
    }
}

impl TrailingStopStrategy for PercentageTrailing {
    fn name(&self) -> &'static str {
        "percentage"
    }

    fn initial_stop(&self, side: Side, entry_price: f64, _atr: Option<f64>) -> f64 {
        side.stop_by_pct(entry_price, self.params.callback_percent)
    }

    fn propose(&self, ctx: &TickContext) -> (Self, StopProposal) {
        let activating = ctx.profit_pct + PROFIT_EPSILON >= self.params.activation_percent;
        if !ctx.activated && !activating {
            return (self.clone(), StopProposal::Inactive);
        }
        let callback = self.callback(ctx.profit_pct, ctx.volatility_multiplier);
        let stop = ctx.side.stop_by_pct(ctx.price, callback);
        (self.clone(), StopProposal::Stop(stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(activation: f64, callback: f64) -> PercentageTrailing {
        PercentageTrailing::new(PercentageParams {
            activation_percent: activation,
            callback_percent: callback,
            min_callback: callback,
            max_callback: callback,
            use_dynamic_callback: false,
        })
    }

    fn ctx(side: Side, price: f64, profit_pct: f64, activated: bool) -> TickContext {
        TickContext {
            side,
            price,
            profit_pct,
            atr: None,
            volatility_multiplier: 1.0,
            activated,
        }
    }

    #[test]
    fn initial_stop_uses_callback() {
        let s = fixed(1.0, 0.5);
        assert!((s.initial_stop(Side::Long, 50_000.0, None) - 49_750.0).abs() < 1e-9);
        assert!((s.initial_stop(Side::Short, 2_000.0, None) - 2_010.0).abs() < 1e-9);
    }

    #[test]
    fn below_activation_is_inactive() {
        let s = fixed(1.0, 0.5);
        let (_, p) = s.propose(&ctx(Side::Long, 50_100.0, 0.2, false));
        assert_eq!(p, StopProposal::Inactive);
    }

    #[test]
    fn activation_proposes_stop_behind_price() {
        let s = fixed(1.0, 0.5);
        let (_, p) = s.propose(&ctx(Side::Long, 50_600.0, 1.2, false));
        match p {
            StopProposal::Stop(stop) => assert!((stop - 50_347.0).abs() < 1e-6),
            other => panic!("expected stop, got {other:?}"),
        }
    }

    #[test]
    fn active_keeps_trailing_below_activation() {
        let s = fixed(1.0, 0.5);
        let (_, p) = s.propose(&ctx(Side::Long, 50_200.0, 0.4, true));
        assert!(matches!(p, StopProposal::Stop(_)));
    }

    #[test]
    fn dynamic_callback_scales_with_profit_and_volatility() {
        let s = PercentageTrailing::new(PercentageParams {
            activation_percent: 1.0,
            callback_percent: 0.5,
            min_callback: 0.3,
            max_callback: 1.0,
            use_dynamic_callback: true,
        });
        assert!((s.callback(0.0, 1.0) - 0.3).abs() < 1e-12);
        assert!((s.callback(5.0, 1.0) - 0.65).abs() < 1e-12);
        assert!((s.callback(25.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((s.callback(25.0, 1.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn static_callback_ignores_volatility() {
        let s = fixed(1.0, 0.5);
        assert_eq!(s.callback(8.0, 1.5), 0.5);
    }
}
