//! Interquartile-range outlier fences.

use crate::utils::stats::quantile;
use serde::Serialize;

/// Tukey fences computed from a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrFences {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFences {
    /// Whether `value` falls outside the fences.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Fences `[Q1 - k*IQR, Q3 + k*IQR]` with linearly interpolated quartiles.
///
/// Returns `None` for an empty sample.
pub fn iqr_fences(values: &[f64], multiplier: f64) -> Option<IqrFences> {
    if values.is_empty() {
        return None;
    }
    let q1 = quantile(values, 0.25);
    let q3 = quantile(values, 0.75);
    let iqr = q3 - q1;
    Some(IqrFences {
        q1,
        q3,
        iqr,
        lower: q1 - multiplier * iqr,
        upper: q3 + multiplier * iqr,
    })
}

/// Indices of values outside the `multiplier`×IQR fences.
pub fn iqr_outliers(values: &[f64], multiplier: f64) -> Vec<usize> {
    let Some(fences) = iqr_fences(values, multiplier) else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter(|(_, &v)| fences.is_outlier(v))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fences_use_interpolated_quartiles() {
        let fences = iqr_fences(&[1.0, 2.0, 3.0, 4.0], 1.5).unwrap();
        assert_relative_eq!(fences.q1, 1.75);
        assert_relative_eq!(fences.q3, 3.25);
        assert_relative_eq!(fences.lower, 1.75 - 2.25);
        assert_relative_eq!(fences.upper, 3.25 + 2.25);
    }

    #[test]
    fn detects_single_spike() {
        let values = [10.0, 11.0, 10.5, 9.5, 10.2, 50.0];
        assert_eq!(iqr_outliers(&values, 1.5), vec![5]);
    }

    #[test]
    fn constant_sample_has_no_outliers() {
        assert!(iqr_outliers(&[5.0; 6], 1.5).is_empty());
        assert!(iqr_fences(&[], 1.5).is_none());
    }
}
