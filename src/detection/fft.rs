//! FFT utilities for seasonal period detection.

use crate::utils::ols::linear_regression;
use rustfft::{num_complex::Complex64, FftPlanner};

/// Compute the FFT of a real-valued signal.
///
/// Returns only frequencies 0..=N/2 since the spectrum of a real signal is symmetric.
pub fn fft_real(signal: &[f64]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer.truncate(n / 2 + 1);
    buffer
}

/// Periodogram of a signal as `(period, power)` pairs, DC excluded.
///
/// Period is `N / k` for frequency index `k`, so it may be fractional.
pub fn periodogram(signal: &[f64]) -> Vec<(f64, f64)> {
    let n = signal.len();
    if n < 4 {
        return Vec::new();
    }

    let mean = signal.iter().sum::<f64>() / n as f64;
    let centred: Vec<f64> = signal.iter().map(|x| x - mean).collect();

    fft_real(&centred)
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, c)| (n as f64 / k as f64, c.norm_sqr() / n as f64))
        .collect()
}

/// Dominant seasonal period of a series, if the spectrum has a clear peak.
///
/// The series is linearly detrended first. Candidate periods lie in
/// `[min_period, max_period]` and the peak must carry at least
/// `peak_ratio` times the mean power of the candidates.
///
/// # Arguments
/// * `values` - Observed series
/// * `min_period` / `max_period` - Admissible period range (inclusive)
/// * `peak_ratio` - Required peak-to-mean power ratio (e.g. 4.0)
///
/// # Returns
/// The rounded period, or `None` for short or aperiodic series.
pub fn detect_period(
    values: &[f64],
    min_period: usize,
    max_period: usize,
    peak_ratio: f64,
) -> Option<usize> {
    let n = values.len();
    if n < 8 || min_period < 2 || max_period < min_period {
        return None;
    }

    let index: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let detrended: Vec<f64> = match linear_regression(&index, values) {
        Ok(fit) => values
            .iter()
            .enumerate()
            .map(|(i, v)| v - fit.predict(i as f64))
            .collect(),
        Err(_) => values.to_vec(),
    };

    let candidates: Vec<(f64, f64)> = periodogram(&detrended)
        .into_iter()
        .filter(|(p, _)| *p >= min_period as f64 - 0.5 && *p <= max_period as f64 + 0.5)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mean_power = candidates.iter().map(|(_, pw)| pw).sum::<f64>() / candidates.len() as f64;
    let (period, power) = candidates
        .iter()
        .copied()
        .fold((0.0, f64::NEG_INFINITY), |best, c| if c.1 > best.1 { c } else { best });

    if power <= 1e-12 || power < peak_ratio * mean_power {
        return None;
    }
    Some(period.round() as usize)
}
