//! Deterministic random-walk bars for demos and tests.
//!
//! The RNG seed mixes the caller's seed with a BLAKE3 hash of the symbol, so
//! each symbol gets its own path and the same inputs always give the same
//! bars. ATR, RSI and volatility columns are filled once their lookback is
//! satisfied.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bars::BarRecord;
use crate::indicators::{rolling_volatility, wilder_atr, wilder_rsi};
use crate::market::{DEFAULT_ATR_PERIOD, DEFAULT_RSI_PERIOD, DEFAULT_VOLATILITY_WINDOW};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub symbol: String,
    pub bars: usize,
    pub seed: u64,
    pub start_price: f64,
    pub start_time: DateTime<Utc>,
    pub interval: Duration,
    /// Per-bar returns are drawn from `drift ± max_return`.
    pub drift: f64,
    pub max_return: f64,
}

impl SyntheticConfig {
    pub fn new(symbol: impl Into<String>, bars: usize, seed: u64) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
            seed,
            start_price: 100.0,
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            interval: Duration::hours(1),
            drift: 0.0,
            max_return: 0.03,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }
}

fn symbol_seed(symbol: &str, seed: u64) -> u64 {
    let hash = blake3::hash(symbol.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head) ^ seed
}

pub fn generate(cfg: &SyntheticConfig) -> Vec<BarRecord> {
    let mut rng = StdRng::seed_from_u64(symbol_seed(&cfg.symbol, cfg.seed));
    let spread = cfg.max_return.abs().max(f64::EPSILON);

    let mut bars = Vec::with_capacity(cfg.bars);
    let mut price = cfg.start_price;
    let mut time = cfg.start_time;

    for _ in 0..cfg.bars {
        let ret: f64 = cfg.drift + rng.gen_range(-spread..spread);
        let open = price;
        // Keep the walk strictly positive.
        let close = (price * (1.0 + ret)).max(open * 0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));

        bars.push(BarRecord {
            timestamp: time,
            symbol: cfg.symbol.clone(),
            open,
            high,
            low,
            close,
            atr: None,
            rsi: None,
            volatility: None,
        });

        price = close;
        time += cfg.interval;
    }

    let atr = wilder_atr(&bars, DEFAULT_ATR_PERIOD);
    let rsi = wilder_rsi(&bars, DEFAULT_RSI_PERIOD);
    let vol = rolling_volatility(&bars, DEFAULT_VOLATILITY_WINDOW);
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.atr = atr[i];
        bar.rsi = rsi[i];
        bar.volatility = vol[i];
    }
    bars
}
