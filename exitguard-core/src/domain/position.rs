//! Position: the central entity threaded through the lifecycle.
//!
//! Identity fields are public and fixed at open. Mutable state (trailing
//! stop, partial-exit ledger, status, exit record) is only changed by the
//! lifecycle manager, which always builds a new `Position` and checks the
//! transition with [`Position::check_transition`] before handing it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::PositionId;
use super::labels::{MarketRegime, StrategyType};
use super::side::{PositionStatus, Side};
use crate::error::InvariantViolation;
use crate::partial_exit::{PartialExit, PartialExitLedger, PartialExitLevel};
use crate::rules::ProfitRuleEvaluator;
use crate::trailing::{Ratchet, TrailingState};

const REMAINING_EPSILON: f64 = 1e-12;

/// Why a position was (fully) closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    PartialExitComplete,
    TimeLimit,
    TargetProfit,
    IndicatorSignal,
    PriceReversal,
    VolatilityTarget,
    Manual,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::PartialExitComplete => "partial_exit_complete",
            ExitReason::TimeLimit => "time_limit",
            ExitReason::TargetProfit => "target_profit",
            ExitReason::IndicatorSignal => "indicator_signal",
            ExitReason::PriceReversal => "price_reversal",
            ExitReason::VolatilityTarget => "volatility_target",
            ExitReason::Manual => "manual",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen outcome of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    /// Fraction-weighted over every exit leg.
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
    /// Fraction-weighted over every exit leg.
    pub profit_pct: f64,
    pub max_profit_pct: f64,
    /// `profit_pct / max_profit_pct * 100`, or 0 when `max_profit_pct <= 0`.
    pub efficiency: f64,
}

impl ExitRecord {
    pub fn efficiency(profit_pct: f64, max_profit_pct: f64) -> f64 {
        if max_profit_pct <= 0.0 {
            0.0
        } else {
            profit_pct / max_profit_pct * 100.0
        }
    }
}

/// Everything needed to open a position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSpec {
    /// Caller-assigned id; derived deterministically when absent.
    pub id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub strategy_type: StrategyType,
    pub market_regime: MarketRegime,
    /// ATR at entry, used by the ATR strategy's initial stop.
    pub atr: Option<f64>,
}

impl PositionSpec {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        entry_price: f64,
        quantity: f64,
        entry_time: DateTime<Utc>,
        strategy_type: StrategyType,
        market_regime: MarketRegime,
    ) -> Self {
        Self {
            id: None,
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            entry_time,
            strategy_type,
            market_regime,
            atr: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_atr(mut self, atr: Option<f64>) -> Self {
        self.atr = atr;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub strategy_type: StrategyType,
    pub market_regime: MarketRegime,
    pub(crate) current_price: f64,
    pub(crate) status: PositionStatus,
    pub(crate) trailing: TrailingState,
    pub(crate) ledger: PartialExitLedger,
    pub(crate) rules: ProfitRuleEvaluator,
    pub(crate) exit: Option<ExitRecord>,
}

impl Position {
    pub fn status(&self) -> PositionStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn stop_price(&self) -> f64 {
        self.trailing.stop_price()
    }

    pub fn trailing_activated(&self) -> bool {
        self.trailing.trailing_activated()
    }

    pub fn highest_price(&self) -> f64 {
        self.trailing.highest_price()
    }

    pub fn lowest_price(&self) -> f64 {
        self.trailing.lowest_price()
    }

    /// Unrealized profit at the last accepted tick.
    pub fn profit_pct(&self) -> f64 {
        match &self.exit {
            Some(exit) => exit.profit_pct,
            None => self.trailing.profit_pct(),
        }
    }

    pub fn max_profit_pct(&self) -> f64 {
        match &self.exit {
            Some(exit) => exit.max_profit_pct,
            None => self.trailing.max_profit_pct(),
        }
    }

    /// Profit percent this position would show at `price`.
    pub fn profit_pct_at(&self, price: f64) -> f64 {
        self.side.profit_pct(self.entry_price, price)
    }

    /// Hours held as of `now`.
    pub fn hold_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.entry_time).num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn remaining_position(&self) -> f64 {
        self.ledger.remaining()
    }

    pub fn partial_exits(&self) -> &[PartialExit] {
        self.ledger.exits()
    }

    pub fn partial_exit_levels(&self) -> &[PartialExitLevel] {
        self.ledger.levels()
    }

    pub fn exit(&self) -> Option<&ExitRecord> {
        self.exit.as_ref()
    }

    pub fn trailing(&self) -> &TrailingState {
        &self.trailing
    }

    pub fn ledger(&self) -> &PartialExitLedger {
        &self.ledger
    }

    pub fn rules(&self) -> &ProfitRuleEvaluator {
        &self.rules
    }

    /// Check that moving from `self` to `next` keeps every position invariant.
    pub fn check_transition(&self, next: &Position) -> Result<(), InvariantViolation> {
        if self.is_closed() && next != self {
            return Err(InvariantViolation::MutatedAfterClose);
        }

        let (prev_high, next_high) = (self.highest_price(), next.highest_price());
        let (prev_low, next_low) = (self.lowest_price(), next.lowest_price());
        if next_high < prev_high || next_low > prev_low {
            return Err(InvariantViolation::ExtremesRegressed {
                prev_high,
                next_high,
                prev_low,
                next_low,
            });
        }

        if self.trailing_activated() && !next.trailing_activated() {
            return Err(InvariantViolation::ActivationReverted);
        }
        if self.trailing_activated()
            && Ratchet::new(self.side).would_loosen(self.stop_price(), next.stop_price())
        {
            return Err(InvariantViolation::StopRegressed {
                previous: self.stop_price(),
                proposed: next.stop_price(),
            });
        }

        let (prev_rem, next_rem) = (self.remaining_position(), next.remaining_position());
        if !(0.0..=1.0).contains(&next_rem) {
            return Err(InvariantViolation::RemainingOutOfRange(next_rem));
        }
        if next_rem > prev_rem + REMAINING_EPSILON {
            return Err(InvariantViolation::RemainingIncreased {
                previous: prev_rem,
                proposed: next_rem,
            });
        }

        let already = self.ledger.exits().len();
        for exit in next.ledger.exits().iter().skip(already) {
            if self.ledger.is_executed(exit.level) {
                return Err(InvariantViolation::LevelRefired {
                    threshold: exit.threshold,
                });
            }
        }
        let mut seen = vec![false; next.ledger.levels().len()];
        for exit in next.ledger.exits() {
            match seen.get_mut(exit.level) {
                Some(flag) if !*flag => *flag = true,
                _ => {
                    return Err(InvariantViolation::LevelRefired {
                        threshold: exit.threshold,
                    })
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Tests:
    //! 1. Ticks produced by the lifecycle pass the transition check
    //! 2. Each kind of illegal transition is named by its violation
    //! 3. A closed position only accepts itself

    use super::*;
    use crate::config::ExitConfig;
    use crate::lifecycle::PositionLifecycleManager;
    use chrono::TimeZone;

    // ── Helpers ──────────────────────────────────────────────────────────

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn manager() -> PositionLifecycleManager {
        PositionLifecycleManager::new(ExitConfig::builtin()).unwrap()
    }

    /// Opened at 100, activated at 102, first partial at 104.
    fn path(m: &PositionLifecycleManager) -> (Position, Position, Position) {
        let spec = PositionSpec::new(
            "BTCUSDT",
            Side::Long,
            100.0,
            1.0,
            t0(),
            StrategyType::Percentage,
            MarketRegime::Trending,
        );
        let opened = m.initialize_position(spec).unwrap();
        let active = m.update_position(opened.clone(), 102.0, None, t0()).position;
        let partial = m.update_position(active.clone(), 104.0, None, t0()).position;
        assert!(!opened.trailing_activated());
        assert!(active.trailing_activated());
        assert_eq!(partial.partial_exits().len(), 1);
        (opened, active, partial)
    }

    // ── Tests ────────────────────────────────────────────────────────────

    #[test]
    fn lifecycle_ticks_are_legal_transitions() {
        let m = manager();
        let (opened, active, partial) = path(&m);
        assert_eq!(opened.check_transition(&active), Ok(()));
        assert_eq!(active.check_transition(&partial), Ok(()));
        assert_eq!(partial.check_transition(&partial), Ok(()));
    }

    #[test]
    fn loosened_stop_is_refused() {
        let (_, active, _) = path(&manager());
        let stop = active.stop_price();
        let next = Position {
            trailing: active.trailing.with_raw_stop(stop - 1.0, true),
            ..active.clone()
        };
        match active.check_transition(&next) {
            Err(InvariantViolation::StopRegressed { previous, proposed }) => {
                assert_eq!(previous, stop);
                assert_eq!(proposed, stop - 1.0);
            }
            other => panic!("expected StopRegressed, got {other:?}"),
        }
    }

    #[test]
    fn reverted_activation_is_refused() {
        let (_, active, _) = path(&manager());
        let next = Position {
            trailing: active.trailing.with_raw_stop(active.stop_price(), false),
            ..active.clone()
        };
        assert_eq!(
            active.check_transition(&next),
            Err(InvariantViolation::ActivationReverted)
        );
    }

    #[test]
    fn regressed_extremes_are_refused() {
        let (_, active, partial) = path(&manager());
        let next = Position {
            trailing: active.trailing.clone(),
            ..partial.clone()
        };
        match partial.check_transition(&next) {
            Err(InvariantViolation::ExtremesRegressed {
                prev_high,
                next_high,
                ..
            }) => {
                assert_eq!(prev_high, 104.0);
                assert_eq!(next_high, 102.0);
            }
            other => panic!("expected ExtremesRegressed, got {other:?}"),
        }
    }

    #[test]
    fn grown_remaining_is_refused() {
        let (_, active, partial) = path(&manager());
        let next = Position {
            ledger: active.ledger.clone(),
            ..partial.clone()
        };
        match partial.check_transition(&next) {
            Err(InvariantViolation::RemainingIncreased { previous, proposed }) => {
                assert!((previous - 0.7).abs() < 1e-9);
                assert_eq!(proposed, 1.0);
            }
            other => panic!("expected RemainingIncreased, got {other:?}"),
        }
    }

    #[test]
    fn remaining_outside_unit_range_is_refused() {
        let (_, _, partial) = path(&manager());
        let exit = partial.partial_exits()[0].clone();
        let next = Position {
            ledger: PartialExitLedger::new(partial.partial_exit_levels().to_vec())
                .with_raw_exit(exit, -0.25),
            ..partial.clone()
        };
        assert_eq!(
            partial.check_transition(&next),
            Err(InvariantViolation::RemainingOutOfRange(-0.25))
        );
    }

    #[test]
    fn refired_level_is_refused() {
        let (_, _, partial) = path(&manager());
        let first = partial.partial_exits()[0].clone();
        let next = Position {
            ledger: partial.ledger.with_raw_exit(first, 0.4),
            ..partial.clone()
        };
        assert_eq!(
            partial.check_transition(&next),
            Err(InvariantViolation::LevelRefired { threshold: 3.0 })
        );
    }

    #[test]
    fn closed_position_only_accepts_itself() {
        let m = manager();
        let (_, _, partial) = path(&m);
        let closed = m.close_position(partial, 104.0, ExitReason::Manual, t0());
        assert!(closed.is_closed());
        assert_eq!(closed.check_transition(&closed), Ok(()));

        let next = Position {
            current_price: 105.0,
            ..closed.clone()
        };
        assert_eq!(
            closed.check_transition(&next),
            Err(InvariantViolation::MutatedAfterClose)
        );
    }
}
