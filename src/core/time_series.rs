//! Univariate time series with validated timestamps and finite values.

use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Policy for handling missing values (NaN/Inf) before a series is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingValuePolicy {
    /// Drop observations with missing values.
    Drop,
    /// Fill with a specific value.
    Fill(f64),
    /// Forward fill (use previous valid value).
    ForwardFill,
    /// Linear interpolation between neighbouring valid values; edges take the nearest one.
    Interpolate,
    /// Return error if missing values found.
    Error,
}

/// An ordered sequence of (timestamp, value) observations.
///
/// Timestamps are strictly increasing and every value is finite. A series is
/// immutable once constructed; slicing produces a new series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    frequency: Duration,
}

impl TimeSeries {
    /// Create a series, rejecting unordered timestamps and non-finite values.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(AnalyticsError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(AnalyticsError::TimestampError(format!(
                    "timestamps must be strictly increasing (position {})",
                    i
                )));
            }
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::MissingValues);
        }

        let frequency = infer_frequency(&timestamps);
        Ok(Self {
            timestamps,
            values,
            frequency,
        })
    }

    /// Create a series after applying a missing-value policy to the raw values.
    pub fn with_policy(
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        policy: MissingValuePolicy,
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(AnalyticsError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        let (timestamps, values) = match policy {
            MissingValuePolicy::Error => (timestamps, values),
            MissingValuePolicy::Drop => timestamps
                .into_iter()
                .zip(values)
                .filter(|(_, v)| v.is_finite())
                .unzip(),
            MissingValuePolicy::Fill(fill) => {
                let values = values
                    .into_iter()
                    .map(|v| if v.is_finite() { v } else { fill })
                    .collect();
                (timestamps, values)
            }
            MissingValuePolicy::ForwardFill => {
                let mut last_valid = None;
                let values = values
                    .into_iter()
                    .map(|v| {
                        if v.is_finite() {
                            last_valid = Some(v);
                            v
                        } else {
                            last_valid.unwrap_or(v)
                        }
                    })
                    .collect();
                (timestamps, values)
            }
            MissingValuePolicy::Interpolate => {
                let values = interpolate_missing(&values);
                (timestamps, values)
            }
        };

        Self::new(timestamps, values)
    }

    /// Daily series starting at `start`.
    pub fn daily(start: DateTime<Utc>, values: Vec<f64>) -> Result<Self> {
        let timestamps = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Self::new(timestamps, values)
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observation timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Observed values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Modal spacing between timestamps (one day for series shorter than two points).
    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// Last observed timestamp.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Span between the first and last observation in days.
    pub fn span_days(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => (*last - *first).num_seconds() as f64 / 86_400.0,
            _ => 0.0,
        }
    }

    /// `horizon` timestamps continuing from the last observation at the series' frequency.
    pub fn future_timestamps(&self, horizon: usize) -> Vec<DateTime<Utc>> {
        let Some(last) = self.last_timestamp() else {
            return Vec::new();
        };
        (1..=horizon)
            .map(|h| last + self.frequency * h as i32)
            .collect()
    }

    /// Extract observations `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(AnalyticsError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(AnalyticsError::DimensionMismatch {
                expected: self.len(),
                got: end,
            });
        }

        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            frequency: self.frequency,
        })
    }

    /// Chronological split into `[0, index)` and `[index, len)`.
    pub fn split_at(&self, index: usize) -> Result<(TimeSeries, TimeSeries)> {
        Ok((self.slice(0, index)?, self.slice(index, self.len())?))
    }
}

/// Modal spacing of the timestamps; ties resolve to the shorter spacing.
fn infer_frequency(timestamps: &[DateTime<Utc>]) -> Duration {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for w in timestamps.windows(2) {
        *counts.entry((w[1] - w[0]).num_seconds()).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (&diff, &count) in &counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((diff, count));
        }
    }

    best.map(|(diff, _)| Duration::seconds(diff))
        .unwrap_or_else(|| Duration::days(1))
}

fn interpolate_missing(values: &[f64]) -> Vec<f64> {
    let valid: Vec<usize> = (0..values.len())
        .filter(|&i| values[i].is_finite())
        .collect();
    if valid.is_empty() {
        return values.to_vec();
    }

    let mut result = values.to_vec();
    for i in 0..values.len() {
        if values[i].is_finite() {
            continue;
        }
        let next = valid.partition_point(|&j| j < i);
        result[i] = match (next.checked_sub(1).map(|k| valid[k]), valid.get(next)) {
            (Some(lo), Some(&hi)) => {
                let frac = (i - lo) as f64 / (hi - lo) as f64;
                values[lo] + frac * (values[hi] - values[lo])
            }
            (Some(lo), None) => values[lo],
            (None, Some(&hi)) => values[hi],
            (None, None) => values[i],
        };
    }
    result
}
