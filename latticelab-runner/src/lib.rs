//! LatticeLab runner — harness utilities over the core engine.
//!
//! Houses the lattice JSON export (a zero-latency, full-retention replay of
//! a dataset), equity-curve performance metrics, and the crossover signal
//! helpers strategies lean on.

pub mod export;
pub mod metrics;
pub mod signals;

pub use export::{export_json, import_json, run_lattice_dump, LatticeDump};
pub use metrics::PerformanceSummary;
pub use signals::{crossed_over, crossed_under};
