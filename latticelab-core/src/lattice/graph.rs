use crate::domain::{AssetId, CellValue, FieldId};
use crate::fields::FieldOperation;
use crate::lattice::layer::BarLayer;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// How many past bars the lattice keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Keep at most this many bars, evicting the oldest. A cap of zero
    /// behaves as one.
    Bars(usize),
    /// Keep every bar.
    All,
}

impl Retention {
    fn cap(&self) -> Option<usize> {
        match self {
            Retention::Bars(n) => Some((*n).max(1)),
            Retention::All => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("new bar is missing data for asset `{asset}`")]
    MissingAsset { asset: AssetId },

    #[error("new bar is missing genesis field `{field}` for asset `{asset}`")]
    MissingGenesisField { asset: AssetId, field: FieldId },

    #[error("a field named `{field}` is already registered")]
    DuplicateField { field: FieldId },

    #[error("cannot add field `{field}`: the field set froze when the first bar was ingested")]
    FieldAfterStart { field: FieldId },

    #[error("field `{field}` depends on `{upstream}`, which is not registered")]
    UnknownUpstream { field: FieldId, upstream: FieldId },

    #[error("cannot access {ago} bars ago: only {available} bars are retained")]
    AgoOutOfRange { ago: usize, available: usize },

    #[error("no field named `{field}` is registered")]
    UnknownField { field: FieldId },

    #[error("no value for asset `{asset}`, field `{field}` on that bar")]
    ValueUnavailable { asset: AssetId, field: FieldId },
}

/// The calculation lattice: a rolling window of [`BarLayer`]s plus the field
/// dependency graph that fills them in.
///
/// Ingesting a bar walks the graph depth-first from each (asset, genesis
/// field) pair in asset-major order. Window dependents compute immediately
/// per asset; cross-sectional dependents are gated on a per-field counter of
/// completed assets, so each fires exactly once per bar, after the final
/// asset finishes its upstream, then propagates onward for every asset.
#[derive(Debug)]
pub struct CalcLattice {
    assets: Vec<AssetId>,
    retention: Retention,
    field_order: Vec<FieldId>,
    ops: HashMap<FieldId, FieldOperation>,
    genesis_fields: Vec<FieldId>,
    window_dependents: HashMap<FieldId, Vec<FieldId>>,
    cross_dependents: HashMap<FieldId, Vec<FieldId>>,
    recent_bars: VecDeque<BarLayer>,
    bar_index: u64,
    completed_assets: HashMap<FieldId, usize>,
}

impl CalcLattice {
    /// A lattice over `assets` (the order fixes propagation and rank
    /// tie-breaking), retaining `retention` bars. Fields are registered with
    /// [`add_field`](Self::add_field) before the first bar arrives.
    pub fn new(assets: Vec<AssetId>, retention: Retention) -> Self {
        Self {
            assets,
            retention,
            field_order: Vec::new(),
            ops: HashMap::new(),
            genesis_fields: Vec::new(),
            window_dependents: HashMap::new(),
            cross_dependents: HashMap::new(),
            recent_bars: VecDeque::new(),
            bar_index: 0,
            completed_assets: HashMap::new(),
        }
    }

    // ─── Registration ───────────────────────────────────────────────

    /// Register a field. Fails once any bar has been ingested, on a
    /// duplicate id, or when the upstream is not yet registered
    /// (registration order is the topological order).
    pub fn add_field(&mut self, op: FieldOperation) -> Result<(), LatticeError> {
        let field_id = op.field_id().clone();
        if self.bar_index > 0 {
            return Err(LatticeError::FieldAfterStart { field: field_id });
        }
        if self.ops.contains_key(&field_id) {
            return Err(LatticeError::DuplicateField { field: field_id });
        }
        if let Some(upstream) = op.upstream() {
            if !self.ops.contains_key(upstream) {
                return Err(LatticeError::UnknownUpstream {
                    field: field_id,
                    upstream: upstream.clone(),
                });
            }
        }

        match &op {
            FieldOperation::Genesis { .. } => self.genesis_fields.push(field_id.clone()),
            FieldOperation::Window { upstream, .. } => self
                .window_dependents
                .entry(upstream.clone())
                .or_default()
                .push(field_id.clone()),
            FieldOperation::CrossSectional { upstream, .. } => self
                .cross_dependents
                .entry(upstream.clone())
                .or_default()
                .push(field_id.clone()),
        }

        self.field_order.push(field_id.clone());
        self.ops.insert(field_id, op);
        Ok(())
    }

    pub fn add_fields(
        &mut self,
        ops: impl IntoIterator<Item = FieldOperation>,
    ) -> Result<(), LatticeError> {
        for op in ops {
            self.add_field(op)?;
        }
        Ok(())
    }

    // ─── Ingestion ──────────────────────────────────────────────────

    /// Ingest one bar of genesis data and propagate every derived field.
    ///
    /// The input must cover every asset and every genesis field; validation
    /// happens before any state changes.
    pub fn new_bar(
        &mut self,
        genesis_data: &HashMap<AssetId, HashMap<FieldId, CellValue>>,
    ) -> Result<(), LatticeError> {
        for asset in &self.assets {
            let fields = genesis_data
                .get(asset)
                .ok_or_else(|| LatticeError::MissingAsset { asset: asset.clone() })?;
            for genesis in &self.genesis_fields {
                if !fields.contains_key(genesis) {
                    return Err(LatticeError::MissingGenesisField {
                        asset: asset.clone(),
                        field: genesis.clone(),
                    });
                }
            }
        }

        self.completed_assets.clear();
        self.bar_index += 1;
        self.recent_bars.push_back(BarLayer::new());
        if let Some(cap) = self.retention.cap() {
            while self.recent_bars.len() > cap {
                self.recent_bars.pop_front();
            }
        }

        let assets = self.assets.clone();
        let genesis_fields = self.genesis_fields.clone();
        for asset in &assets {
            for genesis in &genesis_fields {
                // Validated above, so the lookup cannot miss.
                let value = genesis_data[asset][genesis].clone();
                self.insert_current(asset, genesis, value);
                self.mark_completed(genesis);
                self.propagate(asset, genesis);
            }
        }
        Ok(())
    }

    /// Depth-first propagation from a freshly completed (asset, field) cell.
    ///
    /// Invariant on entry: the cell's value is inserted and its field's
    /// completed-assets counter already counts this asset.
    fn propagate(&mut self, asset: &AssetId, field: &FieldId) {
        let window_deps = self.window_dependents.get(field).cloned().unwrap_or_default();
        for dep in &window_deps {
            let value = self.compute_window(dep, asset);
            self.insert_current(asset, dep, value);
            self.mark_completed(dep);
            self.propagate(asset, dep);
        }

        // Cross-sectional dependents wait for the last asset to complete the
        // upstream; the counter makes each fire exactly once per bar.
        if self.completed_assets.get(field).copied().unwrap_or(0) != self.assets.len() {
            return;
        }
        let cross_deps = self.cross_dependents.get(field).cloned().unwrap_or_default();
        for dep in &cross_deps {
            let results = self.compute_cross(dep);
            let assets = self.assets.clone();
            for a in &assets {
                let value = results.get(a).cloned().unwrap_or(CellValue::Missing);
                self.insert_current(a, dep, value);
            }
            for a in &assets {
                self.mark_completed(dep);
                self.propagate(a, dep);
            }
        }
    }

    fn compute_window(&self, field: &FieldId, asset: &AssetId) -> CellValue {
        let (upstream, window, reduce) = match self.ops.get(field) {
            Some(FieldOperation::Window { upstream, window, reduce, .. }) => {
                (upstream, *window, *reduce)
            }
            _ => return CellValue::Missing,
        };

        let take = window.min(self.recent_bars.len());
        let mut values = Vec::with_capacity(take);
        for ago in (0..take).rev() {
            let cell = self
                .layer(ago)
                .and_then(|layer| layer.get(asset, upstream))
                .cloned()
                .unwrap_or(CellValue::Missing);
            values.push(cell);
        }
        reduce.apply(window, &values)
    }

    fn compute_cross(&self, field: &FieldId) -> HashMap<AssetId, CellValue> {
        let (upstream, reduce) = match self.ops.get(field) {
            Some(FieldOperation::CrossSectional { upstream, reduce, .. }) => (upstream, *reduce),
            _ => return HashMap::new(),
        };

        let mut values = HashMap::with_capacity(self.assets.len());
        for asset in &self.assets {
            let cell = self
                .layer(0)
                .and_then(|layer| layer.get(asset, upstream))
                .cloned()
                .unwrap_or(CellValue::Missing);
            values.insert(asset.clone(), cell);
        }
        reduce.apply(&self.assets, &values)
    }

    fn insert_current(&mut self, asset: &AssetId, field: &FieldId, value: CellValue) {
        if let Some(layer) = self.recent_bars.back_mut() {
            layer.insert(asset, field, value);
        }
    }

    fn mark_completed(&mut self, field: &FieldId) {
        *self.completed_assets.entry(field.clone()).or_insert(0) += 1;
    }

    fn layer(&self, ago: usize) -> Option<&BarLayer> {
        let len = self.recent_bars.len();
        if ago < len {
            self.recent_bars.get(len - 1 - ago)
        } else {
            None
        }
    }

    // ─── Read access ────────────────────────────────────────────────

    /// The full layer `ago` bars back; `ago = 0` is the most recent bar.
    pub fn data(&self, ago: usize) -> Result<&BarLayer, LatticeError> {
        self.layer(ago).ok_or(LatticeError::AgoOutOfRange {
            ago,
            available: self.recent_bars.len(),
        })
    }

    /// One field across every asset, `ago` bars back.
    pub fn data_field(
        &self,
        ago: usize,
        field: &FieldId,
    ) -> Result<HashMap<AssetId, CellValue>, LatticeError> {
        if !self.ops.contains_key(field) {
            return Err(LatticeError::UnknownField { field: field.clone() });
        }
        let layer = self.data(ago)?;
        Ok(self
            .assets
            .iter()
            .map(|asset| {
                let cell = layer.get(asset, field).cloned().unwrap_or(CellValue::Missing);
                (asset.clone(), cell)
            })
            .collect())
    }

    /// A single cell, `ago` bars back.
    pub fn data_cell(
        &self,
        ago: usize,
        asset: &AssetId,
        field: &FieldId,
    ) -> Result<&CellValue, LatticeError> {
        let layer = self.data(ago)?;
        layer.get(asset, field).ok_or_else(|| {
            if self.ops.contains_key(field) {
                LatticeError::ValueUnavailable { asset: asset.clone(), field: field.clone() }
            } else {
                LatticeError::UnknownField { field: field.clone() }
            }
        })
    }

    pub fn num_bars_available(&self) -> usize {
        self.recent_bars.len()
    }

    /// Count of bars ingested so far (never decreases with eviction).
    pub fn bar_index(&self) -> u64 {
        self.bar_index
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Registered field ids, in registration order.
    pub fn fields(&self) -> &[FieldId] {
        &self.field_order
    }
}
