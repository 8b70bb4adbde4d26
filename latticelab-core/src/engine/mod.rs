//! The backtest engine — settings, verbosity-gated logging, and the
//! bar-by-bar strategy loop.

pub mod backtest;
pub mod logger;
pub mod settings;

pub use backtest::{Backtest, BacktestError, NullStrategy, RunReport, Strategy};
pub use logger::{Logger, Verbosity};
pub use settings::{BacktestSettings, ColumnNames};
