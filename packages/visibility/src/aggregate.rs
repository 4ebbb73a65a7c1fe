//! Per-cell aggregation formulas.
//!
//! Both scores are computed from the full set of check-ins currently in a
//! cell, never incrementally, so recomputing a cell is idempotent.

use serde::{Deserialize, Serialize};
use visibility_map_checkin_models::Checkin;

/// Weight applied to a visibility sample, indexed by check-in age.
/// Ages past the end of the table weigh 0.
pub const AGE_WEIGHTS: [f64; 11] = [10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0];

/// Aggregated scores for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellScores {
    /// Age-weighted mean visibility. In `[0, 1]` for samples in `[0, 1]`.
    pub visibility: f64,
    /// Mean of `100 - age * 10`.
    pub accuracy: f64,
}

impl CellScores {
    /// Computes both scores for a cell. `None` for an empty cell.
    #[must_use]
    pub fn from_checkins(checkins: &[Checkin]) -> Option<Self> {
        Some(Self {
            visibility: aggregate_visibility(checkins)?,
            accuracy: aggregate_accuracy(checkins)?,
        })
    }
}

/// Looks up the weight for `age`, bounds-checked against [`AGE_WEIGHTS`].
#[must_use]
pub fn age_weight(age: u32) -> f64 {
    usize::try_from(age)
        .ok()
        .and_then(|index| AGE_WEIGHTS.get(index))
        .copied()
        .unwrap_or(0.0)
}

/// `sum(weight[age] * visibility) / count / 10`. `None` for no check-ins.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_visibility(checkins: &[Checkin]) -> Option<f64> {
    if checkins.is_empty() {
        return None;
    }

    let weighted: f64 = checkins
        .iter()
        .map(|c| age_weight(c.age) * c.visibility)
        .sum();

    Some(weighted / checkins.len() as f64 / 10.0)
}

/// Mean of `100 - age * 10`. `None` for no check-ins.
///
/// Not clamped: check-ins older than 10 hours pull the mean below 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_accuracy(checkins: &[Checkin]) -> Option<f64> {
    if checkins.is_empty() {
        return None;
    }

    let total: f64 = checkins
        .iter()
        .map(|c| 10.0_f64.mul_add(-f64::from(c.age), 100.0))
        .sum();

    Some(total / checkins.len() as f64)
}
