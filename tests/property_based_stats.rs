//! Property-based tests for the estimators, entropy and composite index
//!
//! Properties covered:
//! 1. Variance is never negative
//! 2. CV is zero whenever the mean is zero
//! 3. Skewness/kurtosis defaults for short sequences, clamp bounds otherwise
//! 4. Entropy of a constant sequence is zero, and never exceeds log2(bins)
//! 5. The composite index is the sentinel for non-positive variance
//! 6. Repeated evaluation is bit-identical

use proptest::prelude::*;
use vmprobe::index::{composite_index, INDEX_SENTINEL};
use vmprobe::stats::{
    coefficient_of_variation, kurtosis, mean, shannon_entropy, skewness, variance, Statistics,
    HISTOGRAM_BINS, KURTOSIS_MAX, KURTOSIS_MIN, SKEWNESS_MAX, SKEWNESS_MIN,
};

fn timing_samples(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..1.0e9, 0..max_len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_variance_non_negative(samples in timing_samples(200)) {
        prop_assert!(variance(&samples) >= 0.0);
    }

    #[test]
    fn prop_variance_non_negative_signed(samples in prop::collection::vec(-1.0e6f64..1.0e6, 0..100)) {
        prop_assert!(variance(&samples) >= 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_cv_zero_when_mean_zero(values in prop::collection::vec(1.0f64..1.0e6, 1..50)) {
        // Mirror every value so the mean is exactly zero
        let mut samples = values.clone();
        samples.extend(values.iter().map(|v| -v));
        if mean(&samples) == 0.0 {
            prop_assert_eq!(coefficient_of_variation(&samples), 0.0);
        }
    }

    #[test]
    fn prop_short_sequences_have_zero_moments(samples in prop::collection::vec(0.0f64..1.0e6, 0..4)) {
        if samples.len() < 3 {
            prop_assert_eq!(skewness(&samples), 0.0);
        }
        prop_assert_eq!(kurtosis(&samples), 0.0);
    }

    #[test]
    fn prop_moments_within_clamp(samples in timing_samples(300)) {
        let skew = skewness(&samples);
        let kurt = kurtosis(&samples);
        prop_assert!((SKEWNESS_MIN..=SKEWNESS_MAX).contains(&skew));
        prop_assert!((KURTOSIS_MIN..=KURTOSIS_MAX).contains(&kurt));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_constant_entropy_is_zero(value in -1.0e9f64..1.0e9, len in 0usize..500) {
        let samples = vec![value; len];
        prop_assert_eq!(shannon_entropy(&samples), 0.0);
    }

    #[test]
    fn prop_entropy_bounded_by_bins(samples in timing_samples(500)) {
        let entropy = shannon_entropy(&samples);
        prop_assert!(entropy >= 0.0);
        prop_assert!(entropy <= (HISTOGRAM_BINS as f64).log2() + 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_index_sentinel_for_non_positive_variance(
        k in -100.0f64..1000.0,
        s in -100.0f64..100.0,
        v in -1.0e6f64..=0.0,
    ) {
        prop_assert_eq!(composite_index(k, s, v), INDEX_SENTINEL);
    }

    #[test]
    fn prop_index_positive_or_sentinel(
        k in -100.0f64..1000.0,
        s in -100.0f64..100.0,
        v in 1.0e-3f64..1.0e9,
    ) {
        let index = composite_index(k, s, v);
        prop_assert!(index == INDEX_SENTINEL || index > 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_statistics_bit_identical(samples in timing_samples(300)) {
        let first = Statistics::from_samples(&samples);
        let second = Statistics::from_samples(&samples);
        prop_assert_eq!(first.mean.to_bits(), second.mean.to_bits());
        prop_assert_eq!(first.variance.to_bits(), second.variance.to_bits());
        prop_assert_eq!(first.skewness.to_bits(), second.skewness.to_bits());
        prop_assert_eq!(first.kurtosis.to_bits(), second.kurtosis.to_bits());
        prop_assert_eq!(
            shannon_entropy(&samples).to_bits(),
            shannon_entropy(&samples).to_bits()
        );
    }
}
