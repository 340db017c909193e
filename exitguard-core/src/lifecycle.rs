//! Position lifecycle: initialize → update → check exit → close.
//!
//! The manager holds only configuration and the history log. Positions are
//! passed in by value and a new value is handed back for every transition, so
//! the caller owns each position exclusively between ticks.
//!
//! Precedence: the trailing stop is checked before any profit rule. Nothing
//! on the per-tick path returns an error; bad input or missing data degrades
//! to "hold" with a warning.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn};

use crate::config::ExitConfig;
use crate::domain::{
    is_valid_price, ExitReason, ExitRecord, MarketSnapshot, Position, PositionId, PositionSpec,
    PositionStatus, Tick,
};
use crate::error::{ConfigError, DataError};
use crate::history::{ClosedPositionRecord, HistoryLog, JsonHistoryStore};
use crate::partial_exit::{Leg, PartialExit};
use crate::rules::ProfitRuleEvaluator;
use crate::trailing::TrailingStopEngine;
use crate::volatility::VolatilityAdjuster;

/// Exit decision for the caller's trading loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitDecision {
    pub should_close: bool,
    pub reason: Option<ExitReason>,
}

impl ExitDecision {
    pub fn hold() -> Self {
        Self {
            should_close: false,
            reason: None,
        }
    }

    pub fn close(reason: ExitReason) -> Self {
        Self {
            should_close: true,
            reason: Some(reason),
        }
    }
}

/// Result of one update.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub position: Position,
    /// Partial exits executed on this tick, in level order.
    pub fired: Vec<PartialExit>,
    pub breakeven_moved: bool,
    /// The position was fully liquidated by partial exits on this tick.
    pub closed: bool,
}

impl TickOutcome {
    fn unchanged(position: Position) -> Self {
        Self {
            position,
            fired: Vec::new(),
            breakeven_moved: false,
            closed: false,
        }
    }
}

#[derive(Debug)]
pub struct PositionLifecycleManager {
    config: ExitConfig,
    engine: TrailingStopEngine,
    history: HistoryLog,
}

impl PositionLifecycleManager {
    /// Validate `config` and build a manager. History goes to
    /// `config.history.path` when set, otherwise memory only.
    pub fn new(config: ExitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let max = config.history.max_history_entries;
        let history = match &config.history.path {
            Some(path) => HistoryLog::with_store(JsonHistoryStore::new(path), max),
            None => HistoryLog::in_memory(max),
        };
        Ok(Self::with_history(config, history))
    }

    /// Use a caller-supplied history log. `config` is assumed validated.
    pub fn with_history(config: ExitConfig, history: HistoryLog) -> Self {
        let engine = TrailingStopEngine::new(VolatilityAdjuster::new(config.volatility.clone()));
        Self {
            config,
            engine,
            history,
        }
    }

    pub fn config(&self) -> &ExitConfig {
        &self.config
    }

    /// Closed-position records, oldest first.
    pub fn history(&self) -> Vec<ClosedPositionRecord> {
        self.history.records()
    }

    pub fn history_log(&self) -> &HistoryLog {
        &self.history
    }

    /// Open a position: resolve strategy parameters, compute the initial
    /// (inactive) stop, snapshot partial-exit levels and stamp rule parameters.
    pub fn initialize_position(&self, spec: PositionSpec) -> Result<Position, ConfigError> {
        if !is_valid_price(spec.entry_price) {
            return Err(ConfigError::InvalidPosition {
                field: "entry_price",
                value: spec.entry_price,
            });
        }
        if !(spec.quantity.is_finite() && spec.quantity > 0.0) {
            return Err(ConfigError::InvalidPosition {
                field: "quantity",
                value: spec.quantity,
            });
        }

        let resolved = self.config.resolve(spec.strategy_type, spec.market_regime)?;
        let atr = spec.atr.filter(|a| a.is_finite() && *a > 0.0);
        let (trailing, ledger) = self
            .engine
            .initialize(spec.side, spec.entry_price, &resolved, atr);
        let rules = ProfitRuleEvaluator::from_config(&self.config.rules, spec.market_regime);

        let id = match spec.id {
            Some(id) => PositionId::new(id),
            None => PositionId::derive(
                &spec.symbol,
                spec.side,
                spec.entry_price,
                spec.entry_time,
                spec.strategy_type,
                spec.market_regime,
            ),
        };

        let position = Position {
            id,
            symbol: spec.symbol,
            side: spec.side,
            entry_price: spec.entry_price,
            quantity: spec.quantity,
            entry_time: spec.entry_time,
            strategy_type: spec.strategy_type,
            market_regime: spec.market_regime,
            current_price: spec.entry_price,
            status: PositionStatus::Active,
            trailing,
            ledger,
            rules,
            exit: None,
        };

        info!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = %position.side,
            strategy = %position.strategy_type,
            regime = %position.market_regime,
            entry = position.entry_price,
            stop = position.stop_price(),
            "position opened"
        );
        Ok(position)
    }

    /// One price tick with an optional ATR reading.
    pub fn update_position(
        &self,
        position: Position,
        price: f64,
        atr: Option<f64>,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        self.update_position_with(position, &Tick::new(price).with_atr(atr), now)
    }

    /// One tick: trailing update, then the partial-exit pass. Closes the
    /// position when partial exits have consumed all of it.
    pub fn update_position_with(
        &self,
        position: Position,
        tick: &Tick,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let span = info_span!("update", position_id = %position.id, symbol = %position.symbol);
        let _guard = span.enter();

        if position.is_closed() {
            debug!("update on closed position ignored");
            return TickOutcome::unchanged(position);
        }
        if !is_valid_price(tick.price) {
            let err = DataError::InvalidPrice(tick.price);
            warn!(price = tick.price, error = %err, "tick rejected");
            return TickOutcome::unchanged(position);
        }

        let step = self
            .engine
            .advance(&position.trailing, &position.ledger, tick, now);
        let next = Position {
            current_price: tick.price,
            trailing: step.trailing,
            ledger: step.ledger,
            ..position.clone()
        };

        if let Err(violation) = position.check_transition(&next) {
            error!(price = tick.price, error = %violation, "refused position transition");
            return TickOutcome::unchanged(position);
        }

        for exit in &step.fired {
            info!(
                threshold = exit.threshold,
                fraction = exit.fraction,
                price = exit.price,
                remaining = next.remaining_position(),
                "partial exit"
            );
        }

        if step.full_exit {
            let closed =
                self.close_position(next, tick.price, ExitReason::PartialExitComplete, now);
            return TickOutcome {
                position: closed,
                fired: step.fired,
                breakeven_moved: step.breakeven_moved,
                closed: true,
            };
        }

        TickOutcome {
            position: next,
            fired: step.fired,
            breakeven_moved: step.breakeven_moved,
            closed: false,
        }
    }

    /// Trailing stop first; profit rules only if the stop holds.
    pub fn check_exit_conditions(
        &self,
        position: &Position,
        price: f64,
        now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> ExitDecision {
        if position.is_closed() {
            return ExitDecision::hold();
        }
        if !is_valid_price(price) {
            warn!(position_id = %position.id, price, "exit check with unusable price");
            return ExitDecision::hold();
        }
        if self.engine.stop_breached(&position.trailing, price) {
            return ExitDecision::close(ExitReason::StopLoss);
        }
        match position.rules.evaluate(position, price, now, market) {
            Some(m) => {
                debug!(
                    position_id = %position.id,
                    rule = m.rule,
                    reason = %m.reason,
                    "profit rule fired"
                );
                ExitDecision::close(m.reason)
            }
            None => ExitDecision::hold(),
        }
    }

    /// Close the remaining fraction at `exit_price`. Idempotent: a closed
    /// position comes back unchanged.
    pub fn close_position(
        &self,
        position: Position,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Position {
        if position.is_closed() {
            debug!(position_id = %position.id, "close on closed position ignored");
            return position;
        }
        if !is_valid_price(exit_price) {
            warn!(
                position_id = %position.id,
                price = exit_price,
                "close with unusable price refused"
            );
            return position;
        }

        let final_profit = position.profit_pct_at(exit_price);
        let remaining = position.remaining_position();
        let final_leg = (remaining > 0.0).then_some(Leg {
            fraction: remaining,
            price: exit_price,
            profit_pct: final_profit,
        });
        let blended = position.ledger.blend(final_leg).unwrap_or(Leg {
            fraction: 1.0,
            price: exit_price,
            profit_pct: final_profit,
        });

        let max_profit_pct = position.trailing.max_profit_pct().max(final_profit);
        let exit = ExitRecord {
            exit_price: blended.price,
            exit_time: now,
            exit_reason: reason,
            profit_pct: blended.profit_pct,
            max_profit_pct,
            efficiency: ExitRecord::efficiency(blended.profit_pct, max_profit_pct),
        };

        let closed = Position {
            status: PositionStatus::Closed,
            current_price: exit_price,
            ledger: position.ledger.liquidated(),
            exit: Some(exit),
            ..position
        };

        info!(
            position_id = %closed.id,
            symbol = %closed.symbol,
            reason = %reason,
            exit_price = blended.price,
            profit_pct = blended.profit_pct,
            max_profit_pct,
            efficiency = closed.exit().map_or(0.0, |e| e.efficiency),
            "position closed"
        );

        if let Some(record) = ClosedPositionRecord::from_position(&closed) {
            if let Err(err) = self.history.append(record) {
                warn!(position_id = %closed.id, error = %err, "history not persisted");
            }
        }
        closed
    }
}
