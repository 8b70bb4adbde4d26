use crate::domain::{AssetId, CellValue, FieldId};
use std::collections::HashMap;

/// All cell values for one bar, keyed by (asset, field).
///
/// A layer starts empty when its bar is ingested and becomes dense (one cell
/// per registered asset-field pair) once propagation completes.
#[derive(Debug, Clone, Default)]
pub struct BarLayer {
    cells: HashMap<AssetId, HashMap<FieldId, CellValue>>,
}

impl BarLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset_id: &AssetId, field_id: &FieldId, value: CellValue) {
        self.cells
            .entry(asset_id.clone())
            .or_default()
            .insert(field_id.clone(), value);
    }

    pub fn get(&self, asset_id: &AssetId, field_id: &FieldId) -> Option<&CellValue> {
        self.cells.get(asset_id)?.get(field_id)
    }

    /// One asset's cells on this bar.
    pub fn asset_cells(&self, asset_id: &AssetId) -> Option<&HashMap<FieldId, CellValue>> {
        self.cells.get(asset_id)
    }

    pub fn num_cells(&self) -> usize {
        self.cells.values().map(HashMap::len).sum()
    }
}
