//! ExitGuard Runner — everything around the engine that touches files or
//! market data.
//!
//! - Config loading (TOML/JSON, validated up front)
//! - Recorded bars as CSV, with indicator fallbacks
//! - The `MarketDataSource` seam and its bar-backed implementation
//! - Parallel per-symbol replay through the lifecycle manager
//! - History summaries and synthetic bar generation

pub mod bars;
pub mod config_loader;
pub mod indicators;
pub mod market;
pub mod replay;
pub mod summary;
pub mod synthetic;

pub use bars::{load_bars, save_bars, BarError, BarRecord, BarsBySymbol};
pub use config_loader::{load_config, LoadError};
pub use market::{BarCursor, MarketDataSource};
pub use replay::{replay_all, replay_symbol, ReplayConfig, ReplayError, ReplayEvent, ReplayReport};
pub use summary::{summarize, GroupBy, GroupSummary};
pub use synthetic::{generate, SyntheticConfig};
