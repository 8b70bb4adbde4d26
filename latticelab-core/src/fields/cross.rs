//! Cross-sectional reductions — one bar, one upstream field, every asset.

use crate::domain::{AssetId, CellValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reduction applied jointly across all assets' upstream values on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossSectionalReduction {
    /// `(x - mean) / sample_std` per asset.
    ZScore,
    /// `x - mean` per asset.
    Demean,
    /// Descending rank: the largest value maps to rank 1. Ties resolve
    /// stably by asset order.
    Rank,
}

impl CrossSectionalReduction {
    /// Compute one output cell per asset. `assets` carries the lattice's
    /// asset order, which fixes rank tie-breaking; `values` holds the
    /// upstream cell per asset for the current bar. Non-numeric inputs
    /// produce `Missing` outputs and are excluded from the statistics.
    pub fn apply(
        &self,
        assets: &[AssetId],
        values: &HashMap<AssetId, CellValue>,
    ) -> HashMap<AssetId, CellValue> {
        match self {
            CrossSectionalReduction::ZScore => z_score(assets, values),
            CrossSectionalReduction::Demean => demean(assets, values),
            CrossSectionalReduction::Rank => rank_descending(assets, values),
        }
    }
}

fn demean(assets: &[AssetId], values: &HashMap<AssetId, CellValue>) -> HashMap<AssetId, CellValue> {
    let numeric: Vec<f64> = assets
        .iter()
        .filter_map(|a| values.get(a).and_then(CellValue::as_f64))
        .collect();

    let mut out: HashMap<AssetId, CellValue> =
        assets.iter().map(|a| (a.clone(), CellValue::Missing)).collect();
    if numeric.is_empty() {
        return out;
    }
    let mean = numeric.iter().sum::<f64>() / numeric.len() as f64;
    for asset in assets {
        if let Some(x) = values.get(asset).and_then(CellValue::as_f64) {
            out.insert(asset.clone(), CellValue::Float64(x - mean));
        }
    }
    out
}

fn z_score(assets: &[AssetId], values: &HashMap<AssetId, CellValue>) -> HashMap<AssetId, CellValue> {
    let numeric: Vec<f64> = assets
        .iter()
        .filter_map(|a| values.get(a).and_then(CellValue::as_f64))
        .collect();

    let n = numeric.len();
    let mut out: HashMap<AssetId, CellValue> =
        assets.iter().map(|a| (a.clone(), CellValue::Missing)).collect();
    if n < 2 {
        return out;
    }

    let mean = numeric.iter().sum::<f64>() / n as f64;
    let var = numeric.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std == 0.0 || !std.is_finite() {
        return out;
    }

    for asset in assets {
        if let Some(x) = values.get(asset).and_then(CellValue::as_f64) {
            out.insert(asset.clone(), CellValue::Float64((x - mean) / std));
        }
    }
    out
}

fn rank_descending(
    assets: &[AssetId],
    values: &HashMap<AssetId, CellValue>,
) -> HashMap<AssetId, CellValue> {
    // (asset-order index, value); the stable sort keeps asset order on ties.
    let mut ranked: Vec<(usize, f64)> = assets
        .iter()
        .enumerate()
        .filter_map(|(i, a)| values.get(a).and_then(CellValue::as_f64).map(|v| (i, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: HashMap<AssetId, CellValue> =
        assets.iter().map(|a| (a.clone(), CellValue::Missing)).collect();
    for (pos, (asset_idx, _)) in ranked.iter().enumerate() {
        out.insert(assets[*asset_idx].clone(), CellValue::Rank(pos as u32 + 1));
    }
    out
}
