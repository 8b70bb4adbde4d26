//! Crossover helpers over the lattice accessors.
//!
//! A "cross" compares two fields of one asset on the last two bars: the fast
//! field was at or below the slow one, and now is above (or the mirror, for
//! a cross under). With fewer than two bars, or any non-numeric input, there
//! is no cross.

use latticelab_core::{AssetId, CalcLattice, FieldId};

fn pair(lattice: &CalcLattice, ago: usize, asset: &AssetId, fast: &FieldId, slow: &FieldId) -> Option<(f64, f64)> {
    let fast_value = lattice.data_cell(ago, asset, fast).ok()?.as_f64()?;
    let slow_value = lattice.data_cell(ago, asset, slow).ok()?.as_f64()?;
    Some((fast_value, slow_value))
}

/// True when `fast` moved from at-or-below `slow` on the previous bar to
/// above it on the current bar.
pub fn crossed_over(
    lattice: &CalcLattice,
    asset: &AssetId,
    fast: &FieldId,
    slow: &FieldId,
) -> bool {
    let Some((prev_fast, prev_slow)) = pair(lattice, 1, asset, fast, slow) else {
        return false;
    };
    let Some((cur_fast, cur_slow)) = pair(lattice, 0, asset, fast, slow) else {
        return false;
    };
    prev_fast <= prev_slow && cur_fast > cur_slow
}

/// True when `fast` moved from at-or-above `slow` to below it.
pub fn crossed_under(
    lattice: &CalcLattice,
    asset: &AssetId,
    fast: &FieldId,
    slow: &FieldId,
) -> bool {
    let Some((prev_fast, prev_slow)) = pair(lattice, 1, asset, fast, slow) else {
        return false;
    };
    let Some((cur_fast, cur_slow)) = pair(lattice, 0, asset, fast, slow) else {
        return false;
    };
    prev_fast >= prev_slow && cur_fast < cur_slow
}
