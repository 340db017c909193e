use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::labels::{MarketRegime, StrategyType};
use super::side::Side;

/// Position identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId(pub String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deterministic id for callers that don't assign their own.
    ///
    /// BLAKE3 over a canonical JSON of the opening parameters, truncated to
    /// 16 hex chars. Same inputs always give the same id across builds.
    pub fn derive(
        symbol: &str,
        side: Side,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        strategy_type: StrategyType,
        market_regime: MarketRegime,
    ) -> Self {
        use serde_json::json;

        let canonical = json!({
            "entry_price": entry_price,
            "entry_time": entry_time.to_rfc3339(),
            "market_regime": market_regime.as_str(),
            "side": side.as_str(),
            "strategy_type": strategy_type.as_str(),
            "symbol": symbol,
        });
        let hash = blake3::hash(canonical.to_string().as_bytes());
        let hex = hash.to_hex();
        Self(hex[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
