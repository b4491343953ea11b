//! Synthetic price data for demos and tests

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::series::{PriceBar, PriceSeries};
use crate::error::{Result, TradeGymError};

/// Parameters for the synthetic random walk
#[derive(Debug, Clone)]
pub struct SampleDataConfig {
    pub bars: usize,
    pub initial_price: f64,
    /// Std dev of per-bar log returns
    pub volatility: f64,
    /// Mean per-bar log return
    pub drift: f64,
    pub base_volume: f64,
    pub seed: Option<u64>,
}

impl Default for SampleDataConfig {
    fn default() -> Self {
        Self {
            bars: 1500,
            initial_price: 100.0,
            volatility: 0.02,
            drift: 0.0002,
            base_volume: 1_000_000.0,
            seed: None,
        }
    }
}

/// Generate a geometric random walk with noisy volume and intrabar ranges
pub fn generate_sample_data(config: &SampleDataConfig) -> Result<PriceSeries> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let returns = Normal::new(config.drift, config.volatility.max(0.0))
        .map_err(|e| TradeGymError::Validation(format!("invalid volatility: {e}")))?;
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .ok_or_else(|| TradeGymError::Validation("invalid start date".to_string()))?;

    let mut bars = Vec::with_capacity(config.bars);
    let mut close = config.initial_price;

    for i in 0..config.bars {
        let open = close;
        close = (open * returns.sample(&mut rng).exp()).max(0.01);
        let range = open.max(close) * config.volatility * rng.gen_range(0.0..0.5);
        let high = open.max(close) + range;
        let low = (open.min(close) - range).max(0.005);
        let volume = config.base_volume * rng.gen_range(0.5..1.5);

        bars.push(PriceBar {
            date: start + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
        });
    }

    PriceSeries::new(bars)
}
