//! Physical Machine Index
//!
//! Folds one scheduling category's kurtosis, skewness and variance into a
//! single scalar. The thread and multiprocess categories each get their own
//! index; the two are reported side by side and never averaged.

use crate::stats::Statistics;
use serde::{Deserialize, Serialize};

/// Value reported when the index is undefined (non-positive variance or
/// non-positive numerator). Reads as "maximally anomalous".
pub const INDEX_SENTINEL: f64 = -10.0;

/// Formula applied to the `kurtosis * skewness / variance` ratio
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexScale {
    /// Raw ratio
    #[default]
    Ratio,
    /// Base-10 logarithm of the ratio
    Log10,
}

/// Composite index with the default [`IndexScale::Ratio`] formula
///
/// # Example
/// ```
/// use vmprobe::index::{composite_index, INDEX_SENTINEL};
///
/// assert_eq!(composite_index(4.0, 2.0, 2.0), 4.0);
/// assert_eq!(composite_index(4.0, 2.0, 0.0), INDEX_SENTINEL);
/// assert_eq!(composite_index(-4.0, 2.0, 1.0), INDEX_SENTINEL);
/// ```
pub fn composite_index(kurtosis: f64, skewness: f64, variance: f64) -> f64 {
    composite_index_scaled(kurtosis, skewness, variance, IndexScale::Ratio)
}

/// Composite index under an explicit formula
pub fn composite_index_scaled(
    kurtosis: f64,
    skewness: f64,
    variance: f64,
    scale: IndexScale,
) -> f64 {
    let numerator = kurtosis * skewness;
    if !(variance > 0.0 && numerator > 0.0) {
        return INDEX_SENTINEL;
    }

    let ratio = numerator / variance;
    let value = match scale {
        IndexScale::Ratio => ratio,
        IndexScale::Log10 => ratio.log10(),
    };

    if value.is_finite() {
        value
    } else {
        INDEX_SENTINEL
    }
}

/// Composite index of a statistics record
pub fn index_of(stats: &Statistics, scale: IndexScale) -> f64 {
    composite_index_scaled(stats.kurtosis, stats.skewness, stats.variance, scale)
}
