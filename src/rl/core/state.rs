//! State Representation
//!
//! The observation handed to agents: a market snapshot, a portfolio
//! snapshot, and a fixed-length normalized feature vector derived from both.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::indicators::Indicators;

/// Total number of features in the normalized state vector
pub const STATE_SIZE: usize = 50;

/// Price deltas taken from the close window
pub const PRICE_DELTA_FEATURES: usize = 19;

/// Volume ratios taken from the volume window
pub const VOLUME_FEATURES: usize = 10;

/// Indicator-derived ratios
pub const INDICATOR_FEATURES: usize = 8;

/// Portfolio-derived ratios
pub const PORTFOLIO_FEATURES: usize = 5;

/// Read-only market snapshot rebuilt every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    /// Recent closes, oldest first; the last entry is the current price
    pub prices: Vec<f64>,
    /// Recent volumes aligned with `prices`
    pub volumes: Vec<f64>,
    pub indicators: Indicators,
    pub timestamp: NaiveDate,
}

impl MarketState {
    pub fn current_price(&self) -> f64 {
        self.prices.last().copied().unwrap_or(0.0)
    }

    pub fn current_volume(&self) -> f64 {
        self.volumes.last().copied().unwrap_or(0.0)
    }
}

/// Portfolio ledger snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    /// Shares held
    pub positions: u64,
    /// cash + positions * current price
    pub portfolio_value: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
}

impl PortfolioState {
    /// Fresh all-cash portfolio
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            positions: 0,
            portfolio_value: initial_capital,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
        }
    }

    /// Fraction of portfolio value held in shares
    pub fn position_ratio(&self, price: f64) -> f64 {
        if self.portfolio_value <= 0.0 {
            return 0.0;
        }
        self.positions as f64 * price / self.portfolio_value
    }
}

/// Full observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub market: MarketState,
    pub portfolio: PortfolioState,
    /// Always exactly `STATE_SIZE` finite values
    pub normalized: Vec<f64>,
}

impl State {
    /// Build a state, deriving the normalized vector
    pub fn new(market: MarketState, portfolio: PortfolioState, initial_capital: f64) -> Self {
        let normalized = normalize(&market, &portfolio, initial_capital);
        Self {
            market,
            portfolio,
            normalized,
        }
    }

    pub fn features(&self) -> &[f64] {
        &self.normalized
    }
}

/// Derive the fixed-length feature vector.
///
/// Layout: price deltas, volume ratios, indicator ratios, portfolio ratios,
/// zero padding. Non-finite values become 0.
pub fn normalize(market: &MarketState, portfolio: &PortfolioState, initial_capital: f64) -> Vec<f64> {
    let mut features = Vec::with_capacity(STATE_SIZE);
    let price = market.current_price();

    // Price deltas (most recent first), padded to a fixed count
    let deltas: Vec<f64> = market
        .prices
        .windows(2)
        .rev()
        .map(|w| ratio(w[1] - w[0], w[0]))
        .take(PRICE_DELTA_FEATURES)
        .collect();
    push_padded(&mut features, &deltas, PRICE_DELTA_FEATURES);

    // Volume relative to the window average
    let avg_volume = if market.volumes.is_empty() {
        0.0
    } else {
        market.volumes.iter().sum::<f64>() / market.volumes.len() as f64
    };
    let volume_ratios: Vec<f64> = market
        .volumes
        .iter()
        .rev()
        .take(VOLUME_FEATURES)
        .map(|v| ratio(*v, avg_volume))
        .collect();
    push_padded(&mut features, &volume_ratios, VOLUME_FEATURES);

    // Indicator ratios
    let ind = &market.indicators;
    let previous = market
        .prices
        .len()
        .checked_sub(2)
        .and_then(|i| market.prices.get(i))
        .copied()
        .unwrap_or(price);
    features.push(ind.rsi / 100.0);
    features.push(ratio(ind.macd, price));
    features.push(ratio(price - ind.sma20, ind.sma20));
    features.push(ratio(price - ind.sma50, ind.sma50));
    features.push(ind.bollinger_position(price) / 100.0);
    features.push(ratio(ind.bollinger_upper - ind.bollinger_lower, price));
    features.push(ratio(ind.atr, price));
    features.push(ratio(price - previous, ind.atr));

    // Portfolio ratios
    let value = portfolio.portfolio_value;
    features.push(ratio(portfolio.cash, value));
    features.push(portfolio.position_ratio(price));
    features.push(ratio(portfolio.unrealized_pnl, initial_capital));
    features.push(ratio(portfolio.realized_pnl, initial_capital));
    features.push(ratio(value - initial_capital, initial_capital));

    for f in features.iter_mut() {
        if !f.is_finite() {
            *f = 0.0;
        }
    }
    features.resize(STATE_SIZE, 0.0);
    features
}

/// Division that yields 0 for a zero or non-finite denominator
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

fn push_padded(features: &mut Vec<f64>, values: &[f64], width: usize) {
    features.extend(values.iter().take(width));
    features.extend(std::iter::repeat(0.0).take(width.saturating_sub(values.len())));
}
