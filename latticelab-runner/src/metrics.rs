//! Performance metrics — pure functions over an equity curve.
//!
//! Every metric takes the per-bar equity marks a run produces and returns a
//! scalar. Annualized figures take `bars_per_year` because bar duration is a
//! run-level choice (390-minute session bars → 252 per year, minute bars →
//! far more).

use serde::{Deserialize, Serialize};

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub bars: usize,
}

impl PerformanceSummary {
    pub fn compute(equity_curve: &[f64], bars_per_year: f64) -> Self {
        Self {
            total_return: total_return(equity_curve),
            cagr: cagr(equity_curve, bars_per_year),
            sharpe: sharpe_ratio(equity_curve, bars_per_year),
            max_drawdown: max_drawdown(equity_curve),
            bars: equity_curve.len(),
        }
    }
}

/// `(final - initial) / initial`; 0 for degenerate curves.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth rate.
pub fn cagr(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    if equity_curve.len() < 2 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let initial = equity_curve[0];
    let last = equity_curve[equity_curve.len() - 1];
    if initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / bars_per_year;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio over per-bar returns, zero risk-free rate.
/// Zero when the curve is flat or too short.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let std = var.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * bars_per_year.sqrt()
}

/// Deepest peak-to-trough loss as a positive fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &equity in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.max((peak - equity) / peak);
        }
    }
    worst
}

/// Simple per-bar returns; skips entries after a non-positive mark.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}
