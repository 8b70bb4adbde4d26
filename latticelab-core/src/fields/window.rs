//! Windowed reductions — one asset, one upstream field, the last W bars.

use crate::domain::CellValue;
use serde::{Deserialize, Serialize};

/// Reduction applied to the trailing window of one upstream field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowReduction {
    /// Arithmetic mean of the available window (may be shorter than W).
    Sma,
    /// Largest value in the available window.
    Max,
    /// Smallest value in the available window.
    Min,
    /// Sample standard deviation of the available window; needs two values.
    StdDev,
    /// `(last - first) / first` over a full window of W bars.
    Returns,
    /// `ln(last / first)` over a full window of W bars.
    LogReturns,
}

impl WindowReduction {
    /// Reduce `values` (oldest to newest, `len == min(W, bars_available)`)
    /// to one cell. Any missing or non-numeric input yields `Missing`, as do
    /// the return reductions when fewer than `window` bars exist yet.
    pub fn apply(&self, window: usize, values: &[CellValue]) -> CellValue {
        match self {
            WindowReduction::Sma => mean(values),
            WindowReduction::Max => extremum(values, f64::max),
            WindowReduction::Min => extremum(values, f64::min),
            WindowReduction::StdDev => sample_std(values),
            WindowReduction::Returns => {
                endpoints(window, values).map_or(CellValue::Missing, |(first, last)| {
                    finite_or_missing((last - first) / first)
                })
            }
            WindowReduction::LogReturns => {
                endpoints(window, values).map_or(CellValue::Missing, |(first, last)| {
                    finite_or_missing((last / first).ln())
                })
            }
        }
    }
}

/// All-numeric view of the window, or None when any cell is not.
fn numeric(values: &[CellValue]) -> Option<Vec<f64>> {
    values.iter().map(CellValue::as_f64).collect()
}

fn mean(values: &[CellValue]) -> CellValue {
    match numeric(values) {
        Some(xs) if !xs.is_empty() => {
            CellValue::Float64(xs.iter().sum::<f64>() / xs.len() as f64)
        }
        _ => CellValue::Missing,
    }
}

fn extremum(values: &[CellValue], pick: fn(f64, f64) -> f64) -> CellValue {
    match numeric(values) {
        Some(xs) if !xs.is_empty() => {
            let mut best = xs[0];
            for x in &xs[1..] {
                best = pick(best, *x);
            }
            CellValue::Float64(best)
        }
        _ => CellValue::Missing,
    }
}

fn sample_std(values: &[CellValue]) -> CellValue {
    match numeric(values) {
        Some(xs) if xs.len() >= 2 => {
            let mean = xs.iter().sum::<f64>() / xs.len() as f64;
            let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
            finite_or_missing(var.sqrt())
        }
        _ => CellValue::Missing,
    }
}

/// First and last numeric values of a full window, or None on a short or
/// non-numeric one.
fn endpoints(window: usize, values: &[CellValue]) -> Option<(f64, f64)> {
    if values.len() < window {
        return None;
    }
    let first = values.first()?.as_f64()?;
    let last = values.last()?.as_f64()?;
    Some((first, last))
}

fn finite_or_missing(x: f64) -> CellValue {
    if x.is_finite() {
        CellValue::Float64(x)
    } else {
        CellValue::Missing
    }
}
