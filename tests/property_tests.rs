//! Property-based tests for metrics, forecasts and market scores.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated data.

use market_analytics::core::TimeSeries;
use market_analytics::market::competitor::herfindahl_index;
use market_analytics::market::{gini, OpportunityScorer, RegionIndicators};
use market_analytics::models::{Arima, ArimaConfig, Forecaster, SeasonalConfig, SeasonalModel};
use market_analytics::seasonality::{decompose, DecompositionMode};
use market_analytics::utils::{evaluate, evaluate_with_intervals};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

/// Create a daily TimeSeries from a vector of values.
fn make_ts(values: &[f64]) -> TimeSeries {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    TimeSeries::daily(base, values.to_vec()).unwrap()
}

/// Positive values with a small drift so no series is constant.
fn valid_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(1.0..1000.0_f64, len).prop_map(|mut v| {
            for (i, val) in v.iter_mut().enumerate() {
                *val += (i as f64) * 0.001;
            }
            v
        })
    })
}

/// Weekly seasonal series with noise.
fn seasonal_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        (
            50.0..100.0_f64,
            5.0..20.0_f64,
            prop::collection::vec(-1.0..1.0_f64, len),
        )
            .prop_map(move |(base, amplitude, noise)| {
                (0..len)
                    .map(|i| {
                        base + amplitude * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin()
                            + noise[i]
                    })
                    .collect()
            })
    })
}

// =============================================================================
// Property: Metrics are non-negative and coverage is a fraction
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn error_metrics_are_non_negative(
        pairs in prop::collection::vec((1.0..500.0_f64, -500.0..500.0_f64), 1..60)
    ) {
        let actual: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let predicted: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let m = evaluate(&actual, &predicted).unwrap();
        prop_assert!(m.rmse >= 0.0);
        prop_assert!(m.mae >= 0.0);
        prop_assert!(m.mape >= 0.0);
        prop_assert!(m.rmse + 1e-9 >= m.mae);
    }

    #[test]
    fn coverage_is_a_fraction(
        rows in prop::collection::vec((0.0..100.0_f64, 0.0..100.0_f64, 0.0..20.0_f64), 1..60)
    ) {
        let actual: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let predicted: Vec<f64> = rows.iter().map(|r| r.1).collect();
        let lower: Vec<f64> = rows.iter().map(|r| r.1 - r.2).collect();
        let upper: Vec<f64> = rows.iter().map(|r| r.1 + r.2).collect();
        let m = evaluate_with_intervals(&actual, &predicted, &lower, &upper).unwrap();
        let coverage = m.coverage.unwrap();
        prop_assert!((0.0..=1.0).contains(&coverage));
        prop_assert!(m.avg_interval_width.unwrap() >= 0.0);
    }
}

// =============================================================================
// Property: Forecast intervals bracket the point forecast
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn seasonal_intervals_are_ordered(
        values in seasonal_values_strategy(100, 180),
        horizon in 1usize..30
    ) {
        let mut model = SeasonalModel::with_config(SeasonalConfig::default().with_period(7));
        model.fit(&make_ts(&values)).unwrap();
        let forecast = model.forecast(horizon).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);
        for step in forecast.steps() {
            prop_assert!(step.lower <= step.point);
            prop_assert!(step.point <= step.upper);
        }
    }

    #[test]
    fn arima_intervals_are_ordered(
        values in valid_values_strategy(50, 90),
        horizon in 1usize..15
    ) {
        let mut model = Arima::with_config(ArimaConfig::default().with_max_orders(2, 1, 2));
        model.fit(&make_ts(&values)).unwrap();
        let forecast = model.forecast(horizon).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);
        prop_assert_eq!(forecast.points().len(), horizon);
        for step in forecast.steps() {
            prop_assert!(step.lower <= step.point);
            prop_assert!(step.point <= step.upper);
        }
    }
}

// =============================================================================
// Property: Additive decomposition reconstructs the series
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn additive_decomposition_reconstructs(values in seasonal_values_strategy(28, 120)) {
        let result = decompose(&values, 7, DecompositionMode::Additive).unwrap();
        let rebuilt = result.reconstruct();
        for (r, v) in rebuilt.iter().zip(&values) {
            prop_assert!((r - v).abs() <= 1e-6 * v.abs().max(1.0));
        }
    }
}

// =============================================================================
// Property: Opportunity scores, Gini and HHI stay within their ranges
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn opportunity_scores_are_bounded(
        rows in prop::collection::vec(prop::collection::vec(0.0..1000.0_f64, 5), 1..12)
    ) {
        let names = ["market_size", "growth_rate", "competition_level", "price_premium", "market_maturity"];
        let regions: Vec<RegionIndicators> = rows
            .iter()
            .enumerate()
            .map(|(i, values)| {
                names
                    .iter()
                    .zip(values)
                    .fold(RegionIndicators::new(format!("R{:02}", i)), |r, (n, v)| r.with_indicator(*n, *v))
            })
            .collect();

        let scores = OpportunityScorer::default().score(&regions).unwrap();
        prop_assert_eq!(scores.len(), regions.len());
        for (i, s) in scores.iter().enumerate() {
            prop_assert!((0.0..=100.0).contains(&s.score));
            prop_assert_eq!(s.rank, i + 1);
        }
    }

    #[test]
    fn gini_is_a_fraction(values in prop::collection::vec(0.0..1000.0_f64, 1..50)) {
        let g = gini(&values);
        prop_assert!(g >= -1e-12);
        prop_assert!(g < 1.0);
    }

    #[test]
    fn hhi_of_shares_is_bounded(sales in prop::collection::vec(0.1..1000.0_f64, 1..20)) {
        let total: f64 = sales.iter().sum();
        let shares: Vec<f64> = sales.iter().map(|s| s / total * 100.0).collect();
        let hhi = herfindahl_index(&shares);
        prop_assert!(hhi > 0.0);
        prop_assert!(hhi <= 10_000.0 + 1e-6);
    }
}
