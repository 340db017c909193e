//! Market-data seam between the engine and wherever prices come from.
//!
//! [`BarCursor`] serves one symbol's recorded bars one bar at a time. A bar
//! that carries its own ATR/RSI/volatility is used as is; otherwise the
//! Wilder/rolling fallbacks from [`crate::indicators`] fill the gap.

use exitguard_core::domain::MarketSnapshot;

use crate::bars::BarRecord;
use crate::indicators::{rolling_volatility, wilder_atr, wilder_rsi};

pub const DEFAULT_ATR_PERIOD: usize = 14;
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_VOLATILITY_WINDOW: usize = 20;

/// Price and indicator lookups the engine's caller needs.
pub trait MarketDataSource {
    fn current_price(&self, symbol: &str) -> Option<f64>;

    /// ATR in price units. `None` when no reading is available yet.
    fn atr(&self, symbol: &str, timeframe: &str, period: usize) -> Option<f64>;

    fn snapshot(&self, symbol: &str) -> MarketSnapshot;
}

/// Walks one symbol's bars in time order.
#[derive(Debug, Clone)]
pub struct BarCursor<'a> {
    symbol: &'a str,
    bars: &'a [BarRecord],
    index: usize,
    candle_window: usize,
    atr_period: usize,
    atr: Vec<Option<f64>>,
    rsi: Vec<Option<f64>>,
    volatility: Vec<Option<f64>>,
}

impl<'a> BarCursor<'a> {
    pub fn new(
        symbol: &'a str,
        bars: &'a [BarRecord],
        atr_period: usize,
        candle_window: usize,
    ) -> Self {
        Self {
            symbol,
            bars,
            index: 0,
            candle_window,
            atr_period,
            atr: wilder_atr(bars, atr_period),
            rsi: wilder_rsi(bars, DEFAULT_RSI_PERIOD),
            volatility: rolling_volatility(bars, DEFAULT_VOLATILITY_WINDOW),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Move to bar `index`, clamped to the last bar.
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.bars.len().saturating_sub(1));
    }

    pub fn bar(&self) -> Option<&'a BarRecord> {
        self.bars.get(self.index)
    }

    /// Volatility at the current bar, recorded first then computed.
    pub fn volatility(&self) -> Option<f64> {
        let bar = self.bar()?;
        bar.volatility
            .or_else(|| self.volatility.get(self.index).copied().flatten())
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

    fn rsi(&self) -> Option<f64> {
        let bar = self.bar()?;
        bar.rsi
            .or_else(|| self.rsi.get(self.index).copied().flatten())
            .filter(|v| v.is_finite())
    }

    fn computed_atr(&self, period: usize) -> Option<f64> {
        if period == self.atr_period {
            return self.atr.get(self.index).copied().flatten();
        }
        let end = (self.index + 1).min(self.bars.len());
        wilder_atr(&self.bars[..end], period).last().copied().flatten()
    }
}

impl MarketDataSource for BarCursor<'_> {
    fn current_price(&self, symbol: &str) -> Option<f64> {
        if symbol != self.symbol {
            return None;
        }
        self.bar().map(|b| b.close)
    }

    // A bar file holds a single timeframe; `timeframe` is not consulted.
    fn atr(&self, symbol: &str, _timeframe: &str, period: usize) -> Option<f64> {
        if symbol != self.symbol {
            return None;
        }
        let bar = self.bar()?;
        bar.atr
            .or_else(|| self.computed_atr(period))
            .filter(|a| a.is_finite() && *a > 0.0)
    }

    fn snapshot(&self, symbol: &str) -> MarketSnapshot {
        if symbol != self.symbol || self.bars.is_empty() {
            return MarketSnapshot::empty();
        }
        let start = (self.index + 1).saturating_sub(self.candle_window);
        let candles = self.bars[start..=self.index]
            .iter()
            .map(BarRecord::candle)
            .collect();

        let mut snap = MarketSnapshot::empty().with_candles(candles);
        if let Some(rsi) = self.rsi() {
            snap = snap.with_rsi(rsi);
        }
        if let Some(vol) = self.volatility() {
            snap = snap.with_volatility(vol);
        }
        snap
    }
}
