//! Market inputs consumed by the engine: price ticks and indicator snapshots.
//!
//! The engine never computes indicators itself. ATR, RSI, volatility and the
//! candle history arrive from the caller, and any of them may be missing.

use serde::{Deserialize, Serialize};

/// A price is usable only if it is finite and strictly positive.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// One price update for a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub price: f64,
    /// Latest ATR reading in price units, if the caller has one.
    pub atr: Option<f64>,
    /// Latest volatility reading (fractional, e.g. 0.02), if any.
    pub volatility: Option<f64>,
}

impl Tick {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            atr: None,
            volatility: None,
        }
    }

    pub fn with_atr(mut self, atr: Option<f64>) -> Self {
        self.atr = atr;
        self
    }

    pub fn with_volatility(mut self, volatility: Option<f64>) -> Self {
        self.volatility = volatility;
        self
    }

    /// ATR reading if present and usable.
    pub fn usable_atr(&self) -> Option<f64> {
        self.atr.filter(|a| a.is_finite() && *a > 0.0)
    }
}

/// OHLC candle, used by the reversal rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Indicator snapshot for profit-rule evaluation. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub rsi: Option<f64>,
    pub volatility: Option<f64>,
    /// Oldest first; the reversal rule looks at the tail.
    #[serde(default)]
    pub recent_candles: Vec<Candle>,
}

impl MarketSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rsi(mut self, rsi: f64) -> Self {
        self.rsi = Some(rsi);
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.recent_candles = candles;
        self
    }
}
