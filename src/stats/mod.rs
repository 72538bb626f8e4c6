// Moment-based estimators over timing sample sequences
//
// Every function here is a pure reduction over `&[f64]`: no hidden state, a
// fixed summation order, and a defined value for every degenerate input
// (empty, too short, constant). A flat timing distribution is itself a
// measurement, so nothing in this module returns an error.
//
// Bias corrections follow the adjusted Fisher-Pearson estimators:
// - skewness G1 = g1 * sqrt(n(n-1)) / (n-2)
// - excess kurtosis G2 = ((n-1)/((n-2)(n-3))) * ((n+1) g2 + 6)
//
// Clamp policy: skewness is bounded to [SKEWNESS_MIN, SKEWNESS_MAX] and
// kurtosis to [KURTOSIS_MIN, KURTOSIS_MAX] so near-zero variance cannot blow
// up downstream ratios.

mod entropy;
mod moments;

pub use entropy::{shannon_entropy, shannon_entropy_with_bins, HISTOGRAM_BINS};
pub use moments::{
    coefficient_of_variation, kurtosis, mean, skewness, std_dev, variance, KURTOSIS_MAX,
    KURTOSIS_MIN, SKEWNESS_MAX, SKEWNESS_MIN,
};

use serde::Serialize;

/// Summary of one sample sequence
///
/// `Statistics::default()` is the all-zero record reported for empty or
/// failed categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub cv: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl Statistics {
    /// Compute every estimator over `samples`
    ///
    /// # Example
    /// ```
    /// use vmprobe::stats::Statistics;
    ///
    /// let stats = Statistics::from_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.variance, 2.5);
    /// ```
    pub fn from_samples(samples: &[f64]) -> Self {
        let mean = mean(samples);
        let variance = variance(samples);
        let std_dev = variance.sqrt();

        Self {
            mean,
            variance,
            std_dev,
            cv: if mean == 0.0 { 0.0 } else { std_dev / mean },
            skewness: skewness(samples),
            kurtosis: kurtosis(samples),
        }
    }

    /// True when every field is zero (no usable samples)
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
