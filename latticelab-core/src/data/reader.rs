use crate::domain::{CellValue, FieldId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// One bar as produced by a data reader: its datetime plus every other
/// column keyed by field id.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderBar {
    pub datetime: DateTime<Utc>,
    pub fields: HashMap<FieldId, CellValue>,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot fast-forward to {target}: data begins at {first}")]
    DateTooEarly { target: DateTime<Utc>, first: DateTime<Utc> },

    #[error("cannot fast-forward to {target}: data ends before it")]
    DateTooFarOut { target: DateTime<Utc> },

    #[error("no data sources configured")]
    NoSources,

    #[error("no bars parsed from `{path}`")]
    EmptySource { path: String },

    #[error("read error on `{path}`: {message}")]
    Io { path: String, message: String },

    #[error("parse error in `{path}` row {row}: {message}")]
    Parse { path: String, row: usize, message: String },
}

/// Iterator over time-sorted bars for exactly one asset.
///
/// `peek` never advances; `pop_first` returns the same bar `peek` showed and
/// moves on. An exhausted reader yields `None` from both.
pub trait BarReader {
    fn peek(&mut self) -> Option<&ReaderBar>;

    fn pop_first(&mut self) -> Option<ReaderBar>;

    /// Advance until the next bar's datetime is at or past `target`.
    fn fast_forward(&mut self, target: DateTime<Utc>) -> Result<(), DataError> {
        let first = match self.peek() {
            Some(bar) => bar.datetime,
            None => return Err(DataError::DateTooFarOut { target }),
        };
        if first > target {
            return Err(DataError::DateTooEarly { target, first });
        }
        loop {
            match self.peek().map(|bar| bar.datetime) {
                Some(dt) if dt < target => {
                    self.pop_first();
                }
                Some(_) => return Ok(()),
                None => return Err(DataError::DateTooFarOut { target }),
            }
        }
    }
}

/// In-memory reader over a pre-built bar sequence. Bars are sorted by
/// datetime on construction.
#[derive(Debug, Default)]
pub struct MemoryReader {
    bars: VecDeque<ReaderBar>,
}

impl MemoryReader {
    pub fn new(mut bars: Vec<ReaderBar>) -> Self {
        bars.sort_by_key(|bar| bar.datetime);
        Self { bars: bars.into() }
    }
}

impl BarReader for MemoryReader {
    fn peek(&mut self) -> Option<&ReaderBar> {
        self.bars.front()
    }

    fn pop_first(&mut self) -> Option<ReaderBar> {
        self.bars.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(minute: u32) -> ReaderBar {
        ReaderBar {
            datetime: Utc.with_ymd_and_hms(2021, 5, 3, 9, minute, 0).unwrap(),
            fields: HashMap::from([(FieldId::new("open"), CellValue::Float64(minute as f64))]),
        }
    }

    #[test]
    fn peek_then_pop_yield_identical_bars() {
        let mut reader = MemoryReader::new(vec![bar_at(31), bar_at(30)]);
        let peeked = reader.peek().cloned().unwrap();
        let popped = reader.pop_first().unwrap();
        assert_eq!(peeked, popped);
        // Sorted on construction, so the earlier bar came first.
        assert_eq!(popped.datetime.format("%M").to_string(), "30");
    }

    #[test]
    fn fast_forward_lands_on_first_bar_at_or_after_target() {
        let mut reader = MemoryReader::new(vec![bar_at(30), bar_at(31), bar_at(32)]);
        let target = Utc.with_ymd_and_hms(2021, 5, 3, 9, 31, 0).unwrap();
        reader.fast_forward(target).unwrap();
        assert_eq!(reader.peek().unwrap().datetime, target);
    }

    #[test]
    fn fast_forward_before_data_is_too_early() {
        let mut reader = MemoryReader::new(vec![bar_at(30)]);
        let target = Utc.with_ymd_and_hms(2021, 5, 3, 9, 0, 0).unwrap();
        assert!(matches!(
            reader.fast_forward(target),
            Err(DataError::DateTooEarly { .. })
        ));
    }

    #[test]
    fn fast_forward_past_data_is_too_far_out() {
        let mut reader = MemoryReader::new(vec![bar_at(30)]);
        let target = Utc.with_ymd_and_hms(2021, 5, 3, 10, 0, 0).unwrap();
        assert!(matches!(
            reader.fast_forward(target),
            Err(DataError::DateTooFarOut { .. })
        ));
    }

    #[test]
    fn exhausted_reader_yields_none() {
        let mut reader = MemoryReader::new(vec![bar_at(30)]);
        reader.pop_first();
        assert!(reader.peek().is_none());
        assert!(reader.pop_first().is_none());
    }
}
