// Histogram-based Shannon entropy

/// Bin count used for every entropy value in a report
///
/// Entropies computed with different bin counts are not comparable, so the
/// report always goes through [`shannon_entropy`].
pub const HISTOGRAM_BINS: usize = 20;

/// Shannon entropy (bits) of `samples` over [`HISTOGRAM_BINS`] equal-width bins
///
/// # Example
/// ```
/// use vmprobe::stats::shannon_entropy;
///
/// assert_eq!(shannon_entropy(&[5.0; 1000]), 0.0);
/// let half_and_half: Vec<f64> = (0..100).map(|i| (i % 2) as f64).collect();
/// assert!((shannon_entropy(&half_and_half) - 1.0).abs() < 1e-12);
/// ```
pub fn shannon_entropy(samples: &[f64]) -> f64 {
    shannon_entropy_with_bins(samples, HISTOGRAM_BINS)
}

/// Shannon entropy (bits) over `bins` equal-width bins
///
/// Returns 0 for an empty sequence, zero bins, or a zero-width range. Values
/// equal to the maximum fall into the last bin. Non-finite samples are
/// ignored.
pub fn shannon_entropy_with_bins(samples: &[f64], bins: usize) -> f64 {
    if bins == 0 {
        return 0.0;
    }

    let finite: Vec<f64> = samples.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }

    let (min, max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let width = (max - min) / bins as f64;
    if !(width.is_finite() && width > 0.0) {
        return 0.0;
    }

    let mut histogram = vec![0usize; bins];
    for x in &finite {
        let idx = ((x - min) / width) as usize;
        histogram[idx.min(bins - 1)] += 1;
    }

    let total = finite.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .fold(0.0, |acc, &count| {
            let p = count as f64 / total;
            acc - p * p.log2()
        })
}
