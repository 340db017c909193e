//! Recorded bars as CSV.
//!
//! Columns: `timestamp,symbol,open,high,low,close,atr,rsi,volatility`.
//! The indicator columns may be empty; the engine treats an empty cell as
//! "no reading".

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use exitguard_core::domain::Candle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BarError {
    #[error("bars CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("bars CSV: {0}")]
    Stream(#[from] csv::Error),
}

/// One recorded bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub volatility: Option<f64>,
}

impl BarRecord {
    pub fn candle(&self) -> Candle {
        Candle::new(self.open, self.high, self.low, self.close)
    }
}

/// Bars grouped by symbol, each series sorted by timestamp.
pub type BarsBySymbol = BTreeMap<String, Vec<BarRecord>>;

pub fn read_bars<R: Read>(reader: R) -> Result<BarsBySymbol, BarError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = BarsBySymbol::new();
    for row in rdr.deserialize() {
        let bar: BarRecord = row?;
        out.entry(bar.symbol.clone()).or_default().push(bar);
    }
    for series in out.values_mut() {
        series.sort_by_key(|b| b.timestamp);
    }
    Ok(out)
}

pub fn load_bars(path: &Path) -> Result<BarsBySymbol, BarError> {
    let file = std::fs::File::open(path).map_err(|e| BarError::Csv {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    read_bars(file).map_err(|e| match e {
        BarError::Stream(source) => BarError::Csv {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

pub fn write_bars<W: Write>(writer: W, bars: &[BarRecord]) -> Result<(), BarError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn save_bars(path: &Path, bars: &[BarRecord]) -> Result<(), BarError> {
    let file = std::fs::File::create(path).map_err(|e| BarError::Csv {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    write_bars(file, bars)
}
