#![no_main]

use libfuzzer_sys::fuzz_target;
use vmprobe::index::{composite_index, INDEX_SENTINEL};
use vmprobe::stats::{
    shannon_entropy, Statistics, KURTOSIS_MAX, KURTOSIS_MIN, SKEWNESS_MAX, SKEWNESS_MIN,
};

fuzz_target!(|data: &[u8]| {
    // Reinterpret the input as little-endian f64 samples, NaN and inf included
    let samples: Vec<f64> = data
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect();

    let stats = Statistics::from_samples(&samples);
    assert!(stats.skewness >= SKEWNESS_MIN && stats.skewness <= SKEWNESS_MAX);
    assert!(stats.kurtosis >= KURTOSIS_MIN && stats.kurtosis <= KURTOSIS_MAX);

    let entropy = shannon_entropy(&samples);
    assert!(entropy >= 0.0);

    let index = composite_index(stats.kurtosis, stats.skewness, stats.variance);
    assert!(index == INDEX_SENTINEL || index.is_finite());
});
