//! Position side and the side-dependent price arithmetic used everywhere else.
//!
//! Every "∓" in the stop formulas lives here so that strategies, the ratchet
//! and the stop check cannot disagree about which direction is favorable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// Profits when price rises; stop sits below price.
    Long,
    /// Profits when price falls; stop sits above price.
    Short,
}

impl Side {
    /// +1 for longs, -1 for shorts.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Unrealized profit in percent of entry, sign-adjusted for the side.
    ///
    /// Computed as `diff * 100 / entry` so round numbers stay exact
    /// (e.g. 1980 vs 2000 short is exactly 1.0%).
    pub fn profit_pct(self, entry_price: f64, price: f64) -> f64 {
        self.sign() * (price - entry_price) * 100.0 / entry_price
    }

    /// Stop placed `pct` percent away from `price` on the protective side.
    pub fn stop_by_pct(self, price: f64, pct: f64) -> f64 {
        match self {
            Side::Long => price * (1.0 - pct / 100.0),
            Side::Short => price * (1.0 + pct / 100.0),
        }
    }

    /// Stop placed an absolute `distance` away from `price` on the protective side.
    pub fn stop_by_distance(self, price: f64, distance: f64) -> f64 {
        match self {
            Side::Long => price - distance,
            Side::Short => price + distance,
        }
    }

    /// True if `proposed` is strictly tighter (more protective) than `current`.
    pub fn is_tighter(self, proposed: f64, current: f64) -> bool {
        match self {
            Side::Long => proposed > current,
            Side::Short => proposed < current,
        }
    }

    /// True if `price` has crossed `stop` against the position.
    pub fn is_stop_breached(self, price: f64, stop: f64) -> bool {
        match self {
            Side::Long => price <= stop,
            Side::Short => price >= stop,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Lifecycle status. ACTIVE → CLOSED happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Active,
    Closed,
}
