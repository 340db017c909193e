//! ATR trailing stop: trail `atr * atr_multiplier` behind the current price
//! once profit reaches `min_profit_activation`.
//!
//! The ATR is supplied by the caller. The last usable reading is remembered so
//! a tick without one still trails; with no reading ever seen the strategy
//! abstains.

use serde::{Deserialize, Serialize};

use crate::domain::Side;
use crate::error::DataError;

use super::{StopProposal, TickContext, TrailingStopStrategy, PROFIT_EPSILON};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrParams {
    pub atr_multiplier: f64,
    pub min_profit_activation: f64,
    /// Initial stop distance in percent when no ATR is known at entry.
    pub initial_stop_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrTrailing {
    pub params: AtrParams,
    pub last_atr: Option<f64>,
}

impl AtrTrailing {
    pub fn new(params: AtrParams, atr: Option<f64>) -> Self {
        Self {
            params,
            last_atr: atr.filter(|a| a.is_finite() && *a > 0.0),
        }
    }

    pub fn distance(&self, atr: f64) -> f64 {
        atr * self.params.atr_multiplier
    }
}

impl TrailingStopStrategy for AtrTrailing {
    fn name(&self) -> &'static str {
        "atr_based"
    }

    fn initial_stop(&self, side: Side, entry_price: f64, atr: Option<f64>) -> f64 {
        match atr.or(self.last_atr).filter(|a| a.is_finite() && *a > 0.0) {
            Some(a) => side.stop_by_distance(entry_price, self.distance(a)),
            None => side.stop_by_pct(entry_price, self.params.initial_stop_percent),
        }
    }

    fn propose(&self, ctx: &TickContext) -> (Self, StopProposal) {
        let atr = ctx.atr.or(self.last_atr);
        let next = Self {
            params: self.params.clone(),
            last_atr: atr,
        };
        let activating = ctx.profit_pct + PROFIT_EPSILON >= self.params.min_profit_activation;
        if !ctx.activated && !activating {
            return (next, StopProposal::Inactive);
        }
        match atr {
            Some(a) => {
                let stop = ctx.side.stop_by_distance(ctx.price, next.distance(a));
                (next, StopProposal::Stop(stop))
            }
            None => (next, StopProposal::Abstain(DataError::MissingAtr)),
        }
    }
}
