//! ExitGuard Core — position risk-exit engine.
//!
//! This crate contains:
//! - Domain types (positions, ticks, market snapshots, labels)
//! - Trailing-stop state machine with percentage, step and ATR strategies
//! - Stop ratchet (stops tighten, never loosen)
//! - Partial-exit ledger with breakeven hand-off
//! - Profit rules and their ordered evaluator
//! - Lifecycle manager composing stop and rules, plus closed-position history
//! - Typed configuration and error taxonomy

pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod partial_exit;
pub mod rules;
pub mod trailing;
pub mod volatility;

pub use config::ExitConfig;
pub use domain::{ExitReason, MarketSnapshot, Position, PositionSpec, Side, Tick};
pub use error::{ConfigError, DataError, InvariantViolation, PersistenceError};
pub use history::{ClosedPositionRecord, HistoryLog, JsonHistoryStore};
pub use lifecycle::{ExitDecision, PositionLifecycleManager, TickOutcome};
