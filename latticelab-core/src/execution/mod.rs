//! Order matching — the single-bar fill heuristic.

pub mod matching;

pub use matching::{try_fill, BarPrices, FillTerms, OrderError};
