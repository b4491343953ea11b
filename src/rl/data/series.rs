//! Historical price series
//!
//! Ordered OHLCV bars shared read-only between environments.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeGymError};

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Bar whose open/high/low all equal the close
    pub fn flat(date: NaiveDate, price: f64, volume: f64) -> Self {
        Self {
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }
}

/// Validated, ascending sequence of bars
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, rejecting empty input, non-ascending dates and
    /// non-positive or non-finite closes
    pub fn new(bars: Vec<PriceBar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(TradeGymError::InsufficientData(
                "price series has no bars".to_string(),
            ));
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(TradeGymError::InvalidMarketData(format!(
                    "bar {i} ({}) has invalid close {}",
                    bar.date, bar.close
                )));
            }
            if !bar.volume.is_finite() || bar.volume < 0.0 {
                return Err(TradeGymError::InvalidMarketData(format!(
                    "bar {i} ({}) has invalid volume {}",
                    bar.date, bar.volume
                )));
            }
        }
        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(TradeGymError::InvalidMarketData(format!(
                "bars not ascending: {} followed by {}",
                pair[0].date, pair[1].date
            )));
        }
        Ok(Self { bars })
    }

    /// Constant-price series with daily bars starting 2020-01-01
    pub fn flat(len: usize, price: f64, volume: f64) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .ok_or_else(|| TradeGymError::Validation("invalid start date".to_string()))?;
        let bars = (0..len)
            .map(|i| PriceBar::flat(start + Duration::days(i as i64), price, volume))
            .collect();
        Self::new(bars)
    }

    /// Load a JSON array of bars
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let bars: Vec<PriceBar> = serde_json::from_str(&content)?;
        Self::new(bars)
    }

    /// Write the bars as a JSON array
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.bars)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn bar(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn close(&self, index: usize) -> Option<f64> {
        self.bars.get(index).map(|b| b.close)
    }

    pub fn volume(&self, index: usize) -> Option<f64> {
        self.bars.get(index).map(|b| b.volume)
    }

    /// Bars in `[end + 1 - len, end]`, truncated at the series start
    pub fn window(&self, end: usize, len: usize) -> &[PriceBar] {
        if self.bars.is_empty() {
            return &[];
        }
        let end = end.min(self.bars.len() - 1);
        let start = (end + 1).saturating_sub(len);
        &self.bars[start..=end]
    }
}
