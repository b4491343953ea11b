//! Technical indicator bundle
//!
//! RSI-14, MACD (12/26 EMA), SMA20/50, 20-period Bollinger bands and ATR-14,
//! computed over a trailing slice of bars. Short histories degrade to the
//! bars available instead of producing NaN.

use serde::{Deserialize, Serialize};

use crate::rl::data::PriceBar;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;

/// Indicator snapshot at one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub rsi: f64,
    pub macd: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub atr: f64,
}

impl Default for Indicators {
    fn default() -> Self {
        Self {
            rsi: 50.0,
            macd: 0.0,
            sma20: 0.0,
            sma50: 0.0,
            bollinger_upper: 0.0,
            bollinger_lower: 0.0,
            atr: 0.0,
        }
    }
}

impl Indicators {
    /// Compute the bundle from bars in ascending order; the last bar is "now"
    pub fn compute(bars: &[PriceBar]) -> Self {
        let Some(last) = bars.last() else {
            return Self::default();
        };
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let (upper, lower) = bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_STD);

        Self {
            rsi: rsi(&closes, RSI_PERIOD),
            macd: macd(&closes, MACD_FAST, MACD_SLOW),
            sma20: sma(&closes, SMA_SHORT).unwrap_or(last.close),
            sma50: sma(&closes, SMA_LONG).unwrap_or(last.close),
            bollinger_upper: upper,
            bollinger_lower: lower,
            atr: atr(bars, ATR_PERIOD),
        }
    }

    /// Position of `price` inside the Bollinger band on a 0..100 scale.
    /// A zero-width band is neutral (50).
    pub fn bollinger_position(&self, price: f64) -> f64 {
        let width = self.bollinger_upper - self.bollinger_lower;
        if width.abs() < f64::EPSILON {
            return 50.0;
        }
        (price - self.bollinger_lower) / width * 100.0
    }
}

/// Mean of the last `period` values (or of all values when fewer exist)
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if values.is_empty() || period == 0 {
        return None;
    }
    let window = &values[values.len().saturating_sub(period)..];
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

/// Final value of an exponential moving average seeded with the first value
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    let (&first, rest) = values.split_first()?;
    let multiplier = 2.0 / (period as f64 + 1.0);
    Some(
        rest.iter()
            .fold(first, |prev, &value| (value - prev) * multiplier + prev),
    )
}

/// RSI from simple average gains and losses over the last `period` price changes.
/// Zero average loss yields 100.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() < 2 {
        return 50.0;
    }
    let start = closes.len().saturating_sub(period + 1);
    let window = &closes[start..];

    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }
    let n = (window.len() - 1) as f64;
    let avg_gain = gains / n;
    let avg_loss = losses / n;

    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD line: fast EMA minus slow EMA
pub fn macd(closes: &[f64], fast: usize, slow: usize) -> f64 {
    match (ema(closes, fast), ema(closes, slow)) {
        (Some(f), Some(s)) => f - s,
        _ => 0.0,
    }
}

/// (upper, lower) Bollinger bands around the SMA
pub fn bollinger_bands(closes: &[f64], period: usize, num_std: f64) -> (f64, f64) {
    let Some(middle) = sma(closes, period) else {
        return (0.0, 0.0);
    };
    let window = &closes[closes.len().saturating_sub(period)..];
    let variance =
        window.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / window.len() as f64;
    let std = variance.sqrt();
    (middle + num_std * std, middle - num_std * std)
}

/// Average true range over the last `period` bars
pub fn atr(bars: &[PriceBar], period: usize) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let start = bars.len().saturating_sub(period);
    let true_ranges: Vec<f64> = (start..bars.len())
        .map(|i| {
            let bar = &bars[i];
            let high_low = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(prev_close) => high_low
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs()),
                None => high_low,
            }
        })
        .collect();
    true_ranges.iter().sum::<f64>() / true_ranges.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::data::PriceSeries;

    #[test]
    fn test_sma_short_history_uses_available() {
        assert_eq!(sma(&[1.0, 2.0, 3.0], 50), Some(2.0));
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(sma(&[], 5), None);
    }

    #[test]
    fn test_rsi_no_losses_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), 100.0);
    }

    #[test]
    fn test_rsi_flat_is_100() {
        let closes = vec![100.0; 30];
        assert_eq!(rsi(&closes, 14), 100.0);
    }

    #[test]
    fn test_rsi_only_losses_is_0() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        assert!(rsi(&closes, 14).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_simple_averages_over_window() {
        // Only the last 3 changes count: +1, -1, +2 gives RS = 1 / (1/3)
        let closes = [50.0, 10.0, 11.0, 10.0, 12.0];
        assert!((rsi(&closes, 3) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert!(macd(&closes, 12, 26) > 0.0);
    }

    #[test]
    fn test_flat_series_bundle() {
        let series = PriceSeries::flat(60, 100.0, 1_000.0).unwrap();
        let ind = Indicators::compute(series.bars());
        assert_eq!(ind.sma20, 100.0);
        assert_eq!(ind.sma50, 100.0);
        assert_eq!(ind.macd, 0.0);
        assert_eq!(ind.bollinger_upper, ind.bollinger_lower);
        assert_eq!(ind.bollinger_position(100.0), 50.0);
        assert_eq!(ind.atr, 0.0);
    }

    #[test]
    fn test_bollinger_position_scale() {
        let ind = Indicators {
            bollinger_upper: 110.0,
            bollinger_lower: 90.0,
            ..Default::default()
        };
        assert!((ind.bollinger_position(100.0) - 50.0).abs() < 1e-9);
        assert!((ind.bollinger_position(110.0) - 100.0).abs() < 1e-9);
    }
}
