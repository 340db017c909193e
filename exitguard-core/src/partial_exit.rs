//! Partial-exit ledger: liquidates configured fractions of a position as
//! profit thresholds are reached.
//!
//! Levels are fixed at position open and fire at most once each, in list
//! order. The first level ever fired asks the caller to move the stop to
//! breakeven; the ledger itself never touches the stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trailing::PROFIT_EPSILON;

/// A level that would leave less than this open consumes the remainder.
pub const DUST_THRESHOLD: f64 = 0.01;

/// One configured partial-exit level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialExitLevel {
    /// Profit percent at which the level fires.
    pub threshold: f64,
    /// Fraction of the original position to liquidate.
    pub fraction: f64,
}

impl PartialExitLevel {
    pub fn new(threshold: f64, fraction: f64) -> Self {
        Self {
            threshold,
            fraction,
        }
    }
}

/// Snapshot of one executed partial exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialExit {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub threshold: f64,
    /// Fraction of the original position actually liquidated.
    pub fraction: f64,
    pub profit_pct: f64,
    /// Index of the level that fired.
    #[serde(default)]
    pub level: usize,
}

/// One leg of a (possibly multi-part) exit, used for blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub fraction: f64,
    pub price: f64,
    pub profit_pct: f64,
}

/// Result of one ledger pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPass {
    pub ledger: PartialExitLedger,
    pub fired: Vec<PartialExit>,
    /// Set only when the first level ever fires.
    pub move_to_breakeven: bool,
    /// Nothing left open after this pass.
    pub full_exit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialExitLedger {
    levels: Vec<PartialExitLevel>,
    executed: Vec<bool>,
    remaining: f64,
    exits: Vec<PartialExit>,
}

impl PartialExitLedger {
    pub fn new(levels: Vec<PartialExitLevel>) -> Self {
        let executed = vec![false; levels.len()];
        Self {
            levels,
            executed,
            remaining: 1.0,
            exits: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Fire every pending level whose threshold `profit_pct` meets.
    pub fn apply(&self, profit_pct: f64, price: f64, now: DateTime<Utc>) -> LedgerPass {
        let mut next = self.clone();
        let mut fired = Vec::new();

        for (i, level) in self.levels.iter().enumerate() {
            if next.executed[i] || next.remaining <= 0.0 {
                continue;
            }
            if profit_pct + PROFIT_EPSILON < level.threshold {
                continue;
            }

            let mut fraction = level.fraction.min(next.remaining);
            if next.remaining - fraction < DUST_THRESHOLD {
                fraction = next.remaining;
            }
            next.remaining = if fraction >= next.remaining {
                0.0
            } else {
                next.remaining - fraction
            };
            next.executed[i] = true;

            let exit = PartialExit {
                time: now,
                price,
                threshold: level.threshold,
                fraction,
                profit_pct,
                level: i,
            };
            next.exits.push(exit.clone());
            fired.push(exit);
        }

        let move_to_breakeven = self.exits.is_empty() && !fired.is_empty();
        let full_exit = !fired.is_empty() && next.remaining == 0.0;
        LedgerPass {
            ledger: next,
            fired,
            move_to_breakeven,
            full_exit,
        }
    }

    /// Fraction-weighted exit price and profit over every executed partial
    /// plus an optional final leg.
    pub fn blend(&self, final_leg: Option<Leg>) -> Option<Leg> {
        let legs = self
            .exits
            .iter()
            .map(|e| Leg {
                fraction: e.fraction,
                price: e.price,
                profit_pct: e.profit_pct,
            })
            .chain(final_leg.filter(|l| l.fraction > 0.0));

        let (total, price, profit) = legs.fold((0.0, 0.0, 0.0), |(t, p, r), leg| {
            (
                t + leg.fraction,
                p + leg.fraction * leg.price,
                r + leg.fraction * leg.profit_pct,
            )
        });
        if total <= 0.0 {
            return None;
        }
        Some(Leg {
            fraction: total,
            price: price / total,
            profit_pct: profit / total,
        })
    }

    /// The ledger after the remaining fraction has been closed.
    pub fn liquidated(&self) -> Self {
        Self {
            remaining: 0.0,
            ..self.clone()
        }
    }

    pub fn levels(&self) -> &[PartialExitLevel] {
        &self.levels
    }

    pub fn exits(&self) -> &[PartialExit] {
        &self.exits
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn is_executed(&self, level: usize) -> bool {
        self.executed.get(level).copied().unwrap_or(false)
    }

    /// Sum of fractions already liquidated by partial exits.
    pub fn executed_fraction(&self) -> f64 {
        self.exits.iter().map(|e| e.fraction).sum()
    }

    /// Same ledger with `exit` recorded and `remaining` set, unchecked.
    #[cfg(test)]
    pub(crate) fn with_raw_exit(&self, exit: PartialExit, remaining: f64) -> Self {
        let mut next = self.clone();
        if let Some(flag) = next.executed.get_mut(exit.level) {
            *flag = true;
        }
        next.exits.push(exit);
        next.remaining = remaining;
        next
    }
}
