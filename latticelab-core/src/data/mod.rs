//! Data readers — per-asset lazy bar iterators feeding the backtest.

pub mod csv;
pub mod reader;

pub use self::csv::{CsvOptions, CsvReader};
pub use reader::{BarReader, DataError, MemoryReader, ReaderBar};
