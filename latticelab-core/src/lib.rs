//! LatticeLab core — an event-driven historical backtester built around an
//! incrementally maintained calculation lattice.
//!
//! Two subsystems carry the weight: the [`lattice`] (a rolling window of
//! per-bar layers keyed by (asset, field), propagated through a dependency
//! graph of window and cross-sectional reductions) and the [`engine`] (a
//! discrete-event loop ordering data arrival, strategy callbacks, and order
//! lifecycle under configurable latencies). Everything is single-threaded
//! and deterministic: one total order on events, one seeded RNG.

pub mod data;
pub mod domain;
pub mod engine;
pub mod events;
pub mod execution;
pub mod fields;
pub mod lattice;

pub use data::{BarReader, CsvOptions, CsvReader, DataError, MemoryReader, ReaderBar};
pub use domain::{AssetId, CellValue, FieldId, Order, OrderId, OrderKind, Portfolio};
pub use engine::{
    Backtest, BacktestError, BacktestSettings, ColumnNames, NullStrategy, RunReport, Strategy,
    Verbosity,
};
pub use events::{FieldsCompletedEvent, OrderEvent};
pub use fields::{CrossSectionalReduction, FieldOperation, WindowReduction};
pub use lattice::{BarLayer, CalcLattice, LatticeError, Retention};
