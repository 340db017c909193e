//! Step trailing stop: the callback distance is chosen by the highest profit
//! step reached so far.
//!
//! `profit_steps[i]` and `callback_steps[i]` are parallel and ascending.
//! Reaching step 0 activates trailing. The step index never goes back down,
//! so a pullback keeps the wider callback of the best step reached.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

use super::{StopProposal, TickContext, TrailingStopStrategy, PROFIT_EPSILON};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    pub profit_steps: Vec<f64>,
    pub callback_steps: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrailing {
    pub params: StepParams,
    /// Highest step reached, `None` before step 0.
    pub current_step: Option<usize>,
}

impl StepTrailing {
    pub fn new(params: StepParams) -> Self {
        Self {
            params,
            current_step: None,
        }
    }

    /// Highest step index whose threshold `profit_pct` meets.
    fn step_for(&self, profit_pct: f64) -> Option<usize> {
        self.params
            .profit_steps
            .iter()
            .rposition(|&threshold| profit_pct + PROFIT_EPSILON >= threshold)
    }
}

impl TrailingStopStrategy for StepTrailing {
    fn name(&self) -> &'static str {
        "step"
    }

    fn initial_stop(&self, side: Side, entry_price: f64, _atr: Option<f64>) -> f64 {
        let first = self.params.callback_steps.first().copied().unwrap_or(0.0);
        side.stop_by_pct(entry_price, first)
    }

    fn propose(&self, ctx: &TickContext) -> (Self, StopProposal) {
        let reached = self.step_for(ctx.profit_pct);
        let step = match (self.current_step, reached) {
            (Some(prev), Some(now)) => Some(prev.max(now)),
            (prev, now) => prev.or(now),
        };
        let next = Self {
            params: self.params.clone(),
            current_step: step,
        };
        let Some(step) = step else {
            return (next, StopProposal::Inactive);
        };
        match self.params.callback_steps.get(step) {
            Some(&callback) => {
                let stop = ctx.side.stop_by_pct(ctx.price, callback);
                (next, StopProposal::Stop(stop))
            }
            None => (next, StopProposal::Inactive),
        }
    }
}
