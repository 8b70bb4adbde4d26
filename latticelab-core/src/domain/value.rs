use serde::{Deserialize, Serialize};
use std::fmt;

/// Tagged cell value stored at one (bar, asset, field) address.
///
/// The lattice is heterogeneous: genesis columns are floats or integers,
/// derived fields may be absent early in a run (`Missing`), and the rank
/// reduction produces ordinal positions rather than prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Missing,
    Float64(f64),
    Int64(i64),
    Text(String),
    Rank(u32),
}

impl CellValue {
    /// Numeric view of the cell. `Text` and `Missing` have none; ranks widen
    /// to their ordinal position.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float64(v) => Some(*v),
            CellValue::Int64(v) => Some(*v as f64),
            CellValue::Rank(r) => Some(*r as f64),
            CellValue::Missing | CellValue::Text(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => write!(f, "missing"),
            CellValue::Float64(v) => write!(f, "{v}"),
            CellValue::Int64(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Rank(r) => write!(f, "#{r}"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float64(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_widening() {
        assert_eq!(CellValue::Float64(1.5).as_f64(), Some(1.5));
        assert_eq!(CellValue::Int64(7).as_f64(), Some(7.0));
        assert_eq!(CellValue::Rank(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::Missing.as_f64(), None);
        assert_eq!(CellValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn missing_is_missing() {
        assert!(CellValue::Missing.is_missing());
        assert!(!CellValue::Float64(0.0).is_missing());
    }

    #[test]
    fn serde_round_trip_keeps_the_tag() {
        let cells = [
            CellValue::Missing,
            CellValue::Float64(1.5),
            CellValue::Int64(7),
            CellValue::Text("spread".into()),
            CellValue::Rank(2),
        ];
        for cell in cells {
            let json = serde_json::to_string(&cell).unwrap();
            let back: CellValue = serde_json::from_str(&json).unwrap();
            assert_eq!(cell, back);
        }
    }
}
