//! Domain types for ExitGuard

pub mod ids;
pub mod labels;
pub mod market;
pub mod position;
pub mod side;

pub use ids::PositionId;
pub use labels::{MarketRegime, StrategyType};
pub use market::{is_valid_price, Candle, MarketSnapshot, Tick};
pub use position::{ExitReason, ExitRecord, Position, PositionSpec};
pub use side::{PositionStatus, Side};

/// Symbol type alias
pub type Symbol = String;
