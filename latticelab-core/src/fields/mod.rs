//! Field operations — what each lattice column is and how it computes.
//!
//! The taxonomy is a flat sum type: genesis fields are injected from
//! outside, window fields reduce the trailing bars of one upstream field for
//! one asset, and cross-sectional fields reduce one bar of one upstream
//! field across every asset. Each non-genesis field has exactly one
//! upstream, so the dependency graph is a forest rooted at the genesis set.

pub mod cross;
pub mod window;

pub use cross::CrossSectionalReduction;
pub use window::WindowReduction;

use crate::domain::FieldId;
use serde::{Deserialize, Serialize};

/// Declaration of one lattice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldOperation {
    /// Externally supplied value; identity propagation.
    Genesis { field_id: FieldId },
    /// Reduction over the last `window` bars of `upstream` for one asset.
    Window {
        field_id: FieldId,
        upstream: FieldId,
        window: usize,
        reduce: WindowReduction,
    },
    /// Reduction over the current bar of `upstream` across all assets.
    CrossSectional {
        field_id: FieldId,
        upstream: FieldId,
        reduce: CrossSectionalReduction,
    },
}

impl FieldOperation {
    pub fn genesis(field_id: impl Into<FieldId>) -> Self {
        FieldOperation::Genesis { field_id: field_id.into() }
    }

    pub fn sma(field_id: impl Into<FieldId>, upstream: impl Into<FieldId>, window: usize) -> Self {
        FieldOperation::Window {
            field_id: field_id.into(),
            upstream: upstream.into(),
            window,
            reduce: WindowReduction::Sma,
        }
    }

    pub fn rolling_max(
        field_id: impl Into<FieldId>,
        upstream: impl Into<FieldId>,
        window: usize,
    ) -> Self {
        FieldOperation::Window {
            field_id: field_id.into(),
            upstream: upstream.into(),
            window,
            reduce: WindowReduction::Max,
        }
    }

    pub fn rolling_min(
        field_id: impl Into<FieldId>,
        upstream: impl Into<FieldId>,
        window: usize,
    ) -> Self {
        FieldOperation::Window {
            field_id: field_id.into(),
            upstream: upstream.into(),
            window,
            reduce: WindowReduction::Min,
        }
    }

    pub fn rolling_std(
        field_id: impl Into<FieldId>,
        upstream: impl Into<FieldId>,
        window: usize,
    ) -> Self {
        FieldOperation::Window {
            field_id: field_id.into(),
            upstream: upstream.into(),
            window,
            reduce: WindowReduction::StdDev,
        }
    }

    pub fn returns(
        field_id: impl Into<FieldId>,
        upstream: impl Into<FieldId>,
        window: usize,
    ) -> Self {
        FieldOperation::Window {
            field_id: field_id.into(),
            upstream: upstream.into(),
            window,
            reduce: WindowReduction::Returns,
        }
    }

    pub fn log_returns(
        field_id: impl Into<FieldId>,
        upstream: impl Into<FieldId>,
        window: usize,
    ) -> Self {
        FieldOperation::Window {
            field_id: field_id.into(),
            upstream: upstream.into(),
            window,
            reduce: WindowReduction::LogReturns,
        }
    }

    pub fn z_score(field_id: impl Into<FieldId>, upstream: impl Into<FieldId>) -> Self {
        FieldOperation::CrossSectional {
            field_id: field_id.into(),
            upstream: upstream.into(),
            reduce: CrossSectionalReduction::ZScore,
        }
    }

    pub fn demean(field_id: impl Into<FieldId>, upstream: impl Into<FieldId>) -> Self {
        FieldOperation::CrossSectional {
            field_id: field_id.into(),
            upstream: upstream.into(),
            reduce: CrossSectionalReduction::Demean,
        }
    }

    pub fn rank(field_id: impl Into<FieldId>, upstream: impl Into<FieldId>) -> Self {
        FieldOperation::CrossSectional {
            field_id: field_id.into(),
            upstream: upstream.into(),
            reduce: CrossSectionalReduction::Rank,
        }
    }

    pub fn field_id(&self) -> &FieldId {
        match self {
            FieldOperation::Genesis { field_id }
            | FieldOperation::Window { field_id, .. }
            | FieldOperation::CrossSectional { field_id, .. } => field_id,
        }
    }

    /// The single upstream dependency, if any.
    pub fn upstream(&self) -> Option<&FieldId> {
        match self {
            FieldOperation::Genesis { .. } => None,
            FieldOperation::Window { upstream, .. }
            | FieldOperation::CrossSectional { upstream, .. } => Some(upstream),
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, FieldOperation::Genesis { .. })
    }
}
