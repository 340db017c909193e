//! Replay recorded bars through the lifecycle manager.
//!
//! One position per symbol, opened at the first usable close. Each later bar
//! runs update → exit check → close. Stops are checked against bar closes
//! only; intrabar highs and lows are not simulated. A position still open
//! after the last bar is closed manually at that bar's close.
//!
//! Symbols are independent: each gets exactly one rayon worker, and all
//! workers share the manager (and its history log).

use chrono::{DateTime, Utc};
use exitguard_core::domain::{
    is_valid_price, ExitReason, MarketRegime, PositionSpec, Side, StrategyType, Tick,
};
use exitguard_core::{ClosedPositionRecord, ConfigError, PositionLifecycleManager};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::bars::{BarRecord, BarsBySymbol};
use crate::market::{BarCursor, MarketDataSource, DEFAULT_ATR_PERIOD};

const ATR_TIMEFRAME: &str = "bar";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot open position for {symbol}: {source}")]
    Config {
        symbol: String,
        #[source]
        source: ConfigError,
    },

    #[error("no usable bars for {0}")]
    NoBars(String),

    #[error("config fingerprint: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// What to open on every symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub strategy_type: StrategyType,
    pub market_regime: MarketRegime,
    pub side: Side,
    pub quantity: f64,
    pub atr_period: usize,
    /// Candles handed to the reversal rule.
    pub candle_window: usize,
}

impl ReplayConfig {
    pub fn new(strategy_type: StrategyType, market_regime: MarketRegime, side: Side) -> Self {
        Self {
            strategy_type,
            market_regime,
            side,
            quantity: 1.0,
            atr_period: DEFAULT_ATR_PERIOD,
            candle_window: 10,
        }
    }
}

/// Notable moments in one symbol's replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Opened {
        time: DateTime<Utc>,
        price: f64,
        stop: f64,
    },
    Activated {
        time: DateTime<Utc>,
        price: f64,
        stop: f64,
    },
    PartialExit {
        time: DateTime<Utc>,
        price: f64,
        threshold: f64,
        fraction: f64,
        remaining: f64,
    },
    BreakevenMoved {
        time: DateTime<Utc>,
        stop: f64,
    },
    Closed {
        time: DateTime<Utc>,
        price: f64,
        reason: ExitReason,
        profit_pct: f64,
        efficiency: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReplay {
    pub symbol: String,
    /// Bars consumed, including the entry bar.
    pub bars: usize,
    pub events: Vec<ReplayEvent>,
    pub record: Option<ClosedPositionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub config_fingerprint: String,
    pub replay: ReplayConfig,
    pub symbols: Vec<SymbolReplay>,
}

impl ReplayReport {
    pub fn records(&self) -> impl Iterator<Item = &ClosedPositionRecord> {
        self.symbols.iter().filter_map(|s| s.record.as_ref())
    }
}

/// Replay one symbol's bars, oldest first.
pub fn replay_symbol(
    manager: &PositionLifecycleManager,
    symbol: &str,
    bars: &[BarRecord],
    cfg: &ReplayConfig,
) -> Result<SymbolReplay, ReplayError> {
    let span = info_span!("replay", symbol);
    let _guard = span.enter();

    let start = bars
        .iter()
        .position(|b| is_valid_price(b.close))
        .ok_or_else(|| ReplayError::NoBars(symbol.to_string()))?;

    let mut cursor = BarCursor::new(symbol, bars, cfg.atr_period, cfg.candle_window);
    cursor.seek(start);
    let entry = &bars[start];

    let spec = PositionSpec::new(
        symbol,
        cfg.side,
        entry.close,
        cfg.quantity,
        entry.timestamp,
        cfg.strategy_type,
        cfg.market_regime,
    )
    .with_atr(cursor.atr(symbol, ATR_TIMEFRAME, cfg.atr_period));

    let mut position = manager
        .initialize_position(spec)
        .map_err(|source| ReplayError::Config {
            symbol: symbol.to_string(),
            source,
        })?;

    let mut events = vec![ReplayEvent::Opened {
        time: entry.timestamp,
        price: entry.close,
        stop: position.stop_price(),
    }];
    let mut consumed = 1;

    for (i, bar) in bars.iter().enumerate().skip(start + 1) {
        cursor.seek(i);
        consumed += 1;

        let snapshot = cursor.snapshot(symbol);
        let tick = Tick::new(bar.close)
            .with_atr(cursor.atr(symbol, ATR_TIMEFRAME, cfg.atr_period))
            .with_volatility(snapshot.volatility);

        let was_active = position.trailing_activated();
        let outcome = manager.update_position_with(position, &tick, bar.timestamp);
        position = outcome.position;

        if !was_active && position.trailing_activated() {
            events.push(ReplayEvent::Activated {
                time: bar.timestamp,
                price: bar.close,
                stop: position.stop_price(),
            });
        }
        for exit in &outcome.fired {
            events.push(ReplayEvent::PartialExit {
                time: exit.time,
                price: exit.price,
                threshold: exit.threshold,
                fraction: exit.fraction,
                remaining: position.remaining_position(),
            });
        }
        if outcome.breakeven_moved {
            events.push(ReplayEvent::BreakevenMoved {
                time: bar.timestamp,
                stop: position.stop_price(),
            });
        }
        if position.is_closed() {
            break;
        }

        let decision =
            manager.check_exit_conditions(&position, bar.close, bar.timestamp, &snapshot);
        if let Some(reason) = decision.reason.filter(|_| decision.should_close) {
            position = manager.close_position(position, bar.close, reason, bar.timestamp);
            break;
        }
    }

    if !position.is_closed() {
        // Last usable close; the tail may hold unusable prices.
        if let Some(last) = bars[start..].iter().rev().find(|b| is_valid_price(b.close)) {
            debug!(price = last.close, "closing at end of data");
            position =
                manager.close_position(position, last.close, ExitReason::Manual, last.timestamp);
        }
    }

    if let Some(exit) = position.exit() {
        events.push(ReplayEvent::Closed {
            time: exit.exit_time,
            price: exit.exit_price,
            reason: exit.exit_reason,
            profit_pct: exit.profit_pct,
            efficiency: exit.efficiency,
        });
    }

    Ok(SymbolReplay {
        symbol: symbol.to_string(),
        bars: consumed,
        events,
        record: ClosedPositionRecord::from_position(&position),
    })
}

/// Replay every symbol in parallel. Results are in symbol order.
pub fn replay_all(
    manager: &PositionLifecycleManager,
    bars: &BarsBySymbol,
    cfg: &ReplayConfig,
) -> Result<ReplayReport, ReplayError> {
    let config_fingerprint = manager.config().fingerprint()?;
    let series: Vec<(&String, &Vec<BarRecord>)> = bars.iter().collect();

    let symbols = series
        .par_iter()
        .map(|(symbol, series)| replay_symbol(manager, symbol, series, cfg))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        symbols = symbols.len(),
        fingerprint = %config_fingerprint,
        "replay finished"
    );

    Ok(ReplayReport {
        config_fingerprint,
        replay: cfg.clone(),
        symbols,
    })
}
