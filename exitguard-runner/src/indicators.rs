//! Indicator fallbacks for recorded or synthetic bars.
//!
//! The engine never computes indicators; these only fill the ATR, RSI and
//! volatility columns when a bar file does not carry them.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR and RSI use Wilder smoothing (alpha = 1/period). Values before the
//! lookback is satisfied are `None`.

use crate::bars::BarRecord;

/// True Range series. TR[0] = high - low.
pub fn true_range(bars: &[BarRecord]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| {
            let hl = b.high - b.low;
            match i.checked_sub(1).map(|j| bars[j].close) {
                Some(pc) => hl.max((b.high - pc).abs()).max((b.low - pc).abs()),
                None => hl,
            }
        })
        .collect()
}

/// Wilder ATR. The seed skips TR[0], which has no previous close.
pub fn wilder_atr(bars: &[BarRecord], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let mut out = vec![None; n];
    if period == 0 || n < period + 1 {
        return out;
    }
    let tr = true_range(bars);
    let seed_end = period + 1;
    let mut prev = tr[1..seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = Some(prev).filter(|v| v.is_finite());

    let alpha = 1.0 / period as f64;
    for i in seed_end..n {
        prev = alpha * tr[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev).filter(|v| v.is_finite());
    }
    out
}

/// Wilder RSI on closes. avg_loss == 0 → 100; avg_gain == 0 → 0.
pub fn wilder_rsi(bars: &[BarRecord], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let mut out = vec![None; n];
    if period == 0 || n < period + 1 {
        return out;
    }
    let changes: Vec<f64> = (1..n).map(|i| bars[i].close - bars[i - 1].close).collect();

    let (mut gain, mut loss) = changes[..period].iter().fold((0.0, 0.0), |(g, l), &ch| {
        if ch > 0.0 {
            (g + ch, l)
        } else {
            (g, l - ch)
        }
    });
    gain /= period as f64;
    loss /= period as f64;
    out[period] = Some(rsi_from(gain, loss));

    let p = period as f64;
    for (k, &ch) in changes.iter().enumerate().skip(period) {
        let (g, l) = if ch > 0.0 { (ch, 0.0) } else { (0.0, -ch) };
        gain = (gain * (p - 1.0) + g) / p;
        loss = (loss * (p - 1.0) + l) / p;
        out[k + 1] = Some(rsi_from(gain, loss));
    }
    out
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Rolling standard deviation of simple close-to-close returns.
pub fn rolling_volatility(bars: &[BarRecord], window: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let mut out = vec![None; n];
    if window < 2 || n < window + 1 {
        return out;
    }
    let returns: Vec<f64> = (1..n)
        .map(|i| bars[i].close / bars[i - 1].close - 1.0)
        .collect();
    for end in window..=returns.len() {
        let slice = &returns[end - window..end];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        out[end] = Some(var.sqrt()).filter(|v| v.is_finite());
    }
    out
}
