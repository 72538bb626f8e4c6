// Central-moment estimators: mean, variance, CV, skewness, kurtosis

/// Lower bound applied to bias-corrected skewness
pub const SKEWNESS_MIN: f64 = -100.0;
/// Upper bound applied to bias-corrected skewness
pub const SKEWNESS_MAX: f64 = 100.0;
/// Lower bound applied to bias-corrected excess kurtosis
pub const KURTOSIS_MIN: f64 = -100.0;
/// Upper bound applied to bias-corrected excess kurtosis
pub const KURTOSIS_MAX: f64 = 1000.0;

/// Arithmetic mean, 0 for an empty sequence
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample variance with Bessel's correction (divide by n-1)
///
/// Returns 0 when fewer than two samples are available.
pub fn variance(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }

    let m = mean(samples);
    let sum_sq: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    let var = sum_sq / (n - 1) as f64;

    if var.is_finite() {
        var.max(0.0)
    } else {
        0.0
    }
}

/// Sample standard deviation
pub fn std_dev(samples: &[f64]) -> f64 {
    variance(samples).sqrt()
}

/// Standard deviation divided by mean
///
/// A zero mean yields 0 rather than a division by zero.
///
/// # Example
/// ```
/// use vmprobe::stats::coefficient_of_variation;
///
/// let cv = coefficient_of_variation(&[1.0, 2.0, 3.0, 4.0, 5.0]);
/// assert!((cv - 2.5_f64.sqrt() / 3.0).abs() < 1e-12);
/// assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
/// ```
pub fn coefficient_of_variation(samples: &[f64]) -> f64 {
    let m = mean(samples);
    if m == 0.0 {
        return 0.0;
    }
    std_dev(samples) / m
}

/// Population central moments (m2, m3, m4) around the mean
fn central_moments(samples: &[f64]) -> (f64, f64, f64) {
    let n = samples.len() as f64;
    let m = mean(samples);

    let (mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0);
    for x in samples {
        let d = x - m;
        let d2 = d * d;
        s2 += d2;
        s3 += d2 * d;
        s4 += d2 * d2;
    }

    (s2 / n, s3 / n, s4 / n)
}

fn bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

/// Bias-corrected sample skewness (G1)
///
/// Returns 0 for fewer than three samples or a constant sequence. The result
/// is clamped to [`SKEWNESS_MIN`, `SKEWNESS_MAX`].
pub fn skewness(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 3 || std_dev(samples) <= 0.0 {
        return 0.0;
    }

    let (m2, m3, _) = central_moments(samples);
    if m2 <= 0.0 {
        return 0.0;
    }

    let nf = n as f64;
    let g1 = m3 / m2.powf(1.5);
    let corrected = g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0);

    bounded(corrected, SKEWNESS_MIN, SKEWNESS_MAX)
}

/// Bias-corrected sample excess kurtosis (G2)
///
/// Returns 0 for fewer than four samples or a constant sequence. The result
/// is clamped to [`KURTOSIS_MIN`, `KURTOSIS_MAX`].
pub fn kurtosis(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 4 || std_dev(samples) <= 0.0 {
        return 0.0;
    }

    let (m2, _, m4) = central_moments(samples);
    if m2 <= 0.0 {
        return 0.0;
    }

    let nf = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    let corrected = ((nf - 1.0) / ((nf - 2.0) * (nf - 3.0))) * ((nf + 1.0) * g2 + 6.0);

    bounded(corrected, KURTOSIS_MIN, KURTOSIS_MAX)
}
