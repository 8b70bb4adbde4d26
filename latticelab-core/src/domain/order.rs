use crate::domain::ids::AssetId;
use serde::{Deserialize, Serialize};

/// How an order prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fill at the bar midpoint `(low + high) / 2`. This mid-price fill is a
    /// deliberate simplification of intrabar price action; there is no book.
    Market,
    /// Fill against the bar extremes. `extremum` is the buy ceiling for a
    /// positive size and the sell floor for a negative one.
    Limit { extremum: f64 },
}

/// A single order. `size` is signed: positive buys, negative sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub asset_id: AssetId,
    pub size: f64,
    pub kind: OrderKind,
}

impl Order {
    pub fn market(asset_id: impl Into<AssetId>, size: f64) -> Self {
        Self { asset_id: asset_id.into(), size, kind: OrderKind::Market }
    }

    pub fn limit(asset_id: impl Into<AssetId>, size: f64, extremum: f64) -> Self {
        Self { asset_id: asset_id.into(), size, kind: OrderKind::Limit { extremum } }
    }

    pub fn is_buy(&self) -> bool {
        self.size > 0.0
    }
}
