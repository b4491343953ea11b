//! Financial metrics over per-step return series.

/// Arithmetic mean (0 for an empty slice)
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (0 for fewer than two values)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Per-step volatility: standard deviation of the returns, not annualized
pub fn volatility(returns: &[f64]) -> f64 {
    std_dev(returns)
}

/// Annualized Sharpe ratio
///
/// # Arguments
/// * `returns` - per-step returns
/// * `annual_risk_free_rate` - converted to a per-step rate with `periods_per_year`
/// * `periods_per_year` - 252 for daily bars
pub fn sharpe_ratio(returns: &[f64], annual_risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 || periods_per_year <= 0.0 {
        return 0.0;
    }
    let step_rf = annual_risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - step_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-12 {
        return 0.0;
    }
    mean(&excess) / std * periods_per_year.sqrt()
}

/// Maximum peak-to-trough drawdown of a value series, as a fraction
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}
