//! Lattice JSON export.
//!
//! Replays a dataset through the core loop with zero latencies and full
//! retention, snapshotting every bar's fully propagated layer. The dump is
//! an ordered map `datetime → asset → field → value`; writing it to JSON and
//! reading it back preserves every cell.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use latticelab_core::{
    AssetId, Backtest, BacktestError, BacktestSettings, BarReader, CellValue, FieldOperation,
    FieldsCompletedEvent, Retention, Strategy,
};
use std::collections::BTreeMap;

/// Key format for dump entries; lexicographic order is chronological.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Ordered per-bar snapshot of the whole lattice.
pub type LatticeDump = BTreeMap<String, BTreeMap<String, BTreeMap<String, CellValue>>>;

struct SnapshotStrategy {
    dump: LatticeDump,
}

impl Strategy for SnapshotStrategy {
    fn on_data(
        &mut self,
        backtest: &mut Backtest,
        _event: &FieldsCompletedEvent,
    ) -> Result<(), BacktestError> {
        let layer = backtest.lattice().data(0)?;
        let mut per_asset = BTreeMap::new();
        for asset in backtest.lattice().assets() {
            let mut per_field = BTreeMap::new();
            for field in backtest.lattice().fields() {
                let cell = layer.get(asset, field).cloned().unwrap_or(CellValue::Missing);
                per_field.insert(field.to_string(), cell);
            }
            per_asset.insert(asset.to_string(), per_field);
        }
        let key = backtest.bar_start_time().format(TIMESTAMP_FORMAT).to_string();
        self.dump.insert(key, per_asset);
        Ok(())
    }
}

/// Run the dataset through the core loop and collect one snapshot per bar
/// from `start` up to (exclusive of) `end_time`.
///
/// Latencies are zeroed so every bar's data event lands at the bar start,
/// and retention is unbounded so no layer is evicted mid-run.
pub fn run_lattice_dump(
    readers: Vec<(AssetId, Box<dyn BarReader>)>,
    field_operations: Vec<FieldOperation>,
    start: DateTime<Utc>,
    end_time: DateTime<Utc>,
    trading_interval: Duration,
) -> Result<LatticeDump> {
    let settings = BacktestSettings::new(start, end_time)
        .with_trading_interval(trading_interval)
        .with_lookback(Retention::All)
        .with_data_delay(Duration::zero())
        .with_message_latency(Duration::zero())
        .with_field_op_timeout(std::time::Duration::from_secs(1));

    let mut backtest = Backtest::new(settings);
    for (asset, reader) in readers {
        backtest
            .add_reader(asset.clone(), reader)
            .with_context(|| format!("registering reader for {asset}"))?;
    }
    backtest.add_fields(field_operations);

    let mut strategy = SnapshotStrategy { dump: LatticeDump::new() };
    backtest.run(&mut strategy).context("lattice dump run failed")?;
    Ok(strategy.dump)
}

/// Serialize a dump to pretty JSON.
pub fn export_json(dump: &LatticeDump) -> Result<String> {
    serde_json::to_string_pretty(dump).context("failed to serialize lattice dump to JSON")
}

/// Deserialize a dump from JSON.
pub fn import_json(json: &str) -> Result<LatticeDump> {
    serde_json::from_str(json).context("failed to deserialize lattice dump from JSON")
}
