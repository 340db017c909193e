//! Strategy and regime labels used as configuration keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which trailing-stop variant manages a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Percentage,
    Step,
    AtrBased,
}

impl StrategyType {
    pub const ALL: [StrategyType; 3] = [
        StrategyType::Percentage,
        StrategyType::Step,
        StrategyType::AtrBased,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyType::Percentage => "percentage",
            StrategyType::Step => "step",
            StrategyType::AtrBased => "atr_based",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "percentage" => Ok(StrategyType::Percentage),
            "step" => Ok(StrategyType::Step),
            "atr_based" | "atr" => Ok(StrategyType::AtrBased),
            other => Err(format!("unknown strategy type: {other}")),
        }
    }
}

/// Qualitative market regime label supplied by the external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    Neutral,
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 4] = [
        MarketRegime::Trending,
        MarketRegime::Ranging,
        MarketRegime::Volatile,
        MarketRegime::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarketRegime::Trending => "trending",
            MarketRegime::Ranging => "ranging",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Neutral => "neutral",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trending" => Ok(MarketRegime::Trending),
            "ranging" => Ok(MarketRegime::Ranging),
            "volatile" => Ok(MarketRegime::Volatile),
            "neutral" => Ok(MarketRegime::Neutral),
            other => Err(format!("unknown market regime: {other}")),
        }
    }
}
