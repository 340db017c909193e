//! Trailing-stop engine: one tick of stop maintenance plus the partial-exit
//! pass, in that order.
//!
//! The engine is the single source of "has the hard floor been breached" and
//! "should part of the position be liquidated now". It owns no position
//! state; it maps (trailing, ledger, tick) to the next (trailing, ledger).

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ResolvedStrategy;
use crate::domain::{Side, Tick};
use crate::partial_exit::{PartialExit, PartialExitLedger};
use crate::volatility::VolatilityAdjuster;

use super::{TrailingState, TrailingStrategy};

/// Outcome of one engine tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStep {
    pub trailing: TrailingState,
    pub ledger: PartialExitLedger,
    pub fired: Vec<PartialExit>,
    pub breakeven_moved: bool,
    pub full_exit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStopEngine {
    adjuster: VolatilityAdjuster,
}

impl TrailingStopEngine {
    pub fn new(adjuster: VolatilityAdjuster) -> Self {
        Self { adjuster }
    }

    /// Initial trailing state and ledger for a newly opened position.
    pub fn initialize(
        &self,
        side: Side,
        entry_price: f64,
        resolved: &ResolvedStrategy,
        atr: Option<f64>,
    ) -> (TrailingState, PartialExitLedger) {
        let strategy = TrailingStrategy::from_params(&resolved.params, atr);
        let trailing = TrailingState::new(side, entry_price, strategy, atr);
        let ledger = PartialExitLedger::new(resolved.partial_exits.clone());
        (trailing, ledger)
    }

    /// Strategy update, then the ledger pass at the updated profit.
    pub fn advance(
        &self,
        trailing: &TrailingState,
        ledger: &PartialExitLedger,
        tick: &Tick,
        now: DateTime<Utc>,
    ) -> EngineStep {
        let multiplier = self.adjuster.multiplier_for(tick.volatility);
        let mut trailing = trailing.update(tick, multiplier);

        let pass = ledger.apply(trailing.profit_pct(), tick.price, now);
        let mut breakeven_moved = false;
        if pass.move_to_breakeven {
            let before = trailing.stop_price();
            trailing = trailing.move_to_breakeven();
            breakeven_moved = true;
            debug!(from = before, to = trailing.stop_price(), "stop moved to breakeven");
        }

        EngineStep {
            trailing,
            ledger: pass.ledger,
            fired: pass.fired,
            breakeven_moved,
            full_exit: pass.full_exit,
        }
    }

    pub fn stop_breached(&self, trailing: &TrailingState, price: f64) -> bool {
        trailing.check_stop_condition(price)
    }
}
