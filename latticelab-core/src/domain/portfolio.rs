use crate::domain::ids::AssetId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Portfolio accounting: cash (buying power), per-asset equity units, and the
/// marked total value.
///
/// `total_value` is recomputed on every fill as
/// `buying_power + Σ equity[a] · last_close[a]`, where `last_close` comes
/// from the lattice's most recent completed bar. During a bar, before that
/// bar's data has been processed, this is the previous bar's close — the
/// total lags intrabar fills by design of the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub equity: HashMap<AssetId, f64>,
    pub buying_power: f64,
    pub total_value: f64,
}

impl Portfolio {
    pub fn new(principal: f64) -> Self {
        Self {
            equity: HashMap::new(),
            buying_power: principal,
            total_value: principal,
        }
    }

    /// Apply one fill: adjust the asset's equity units and the cash balance.
    /// The caller revalues afterwards once it has current closes.
    pub fn apply_fill(&mut self, asset_id: &AssetId, delta_equity: f64, delta_cash: f64) {
        *self.equity.entry(asset_id.clone()).or_insert(0.0) += delta_equity;
        self.buying_power += delta_cash;
    }

    /// Recompute `total_value` from the given close lookup. Assets without a
    /// known close contribute nothing.
    pub fn revalue(&mut self, last_close: impl Fn(&AssetId) -> Option<f64>) {
        let held: f64 = self
            .equity
            .iter()
            .filter_map(|(asset, units)| last_close(asset).map(|close| units * close))
            .sum();
        self.total_value = self.buying_power + held;
    }

    pub fn position(&self, asset_id: &AssetId) -> f64 {
        self.equity.get(asset_id).copied().unwrap_or(0.0)
    }
}
