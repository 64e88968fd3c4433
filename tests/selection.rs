//! Model selection across every candidate on realistic sales shapes.

use chrono::{TimeZone, Utc};
use market_analytics::core::TimeSeries;
use market_analytics::models::{ModelConfigs, ModelKind, SequenceConfig};
use market_analytics::selection::{ModelSelector, SelectorConfig};
use market_analytics::AnalyticsError;

fn weekly_sales(n: usize) -> TimeSeries {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let values = (0..n)
        .map(|i| {
            let t = i as f64;
            200.0 + 0.8 * t + 25.0 * (2.0 * std::f64::consts::PI * t / 7.0).sin() + ((i * 13) % 7) as f64
        })
        .collect();
    TimeSeries::daily(base, values).unwrap()
}

fn fast_selector(parallel: bool) -> ModelSelector {
    let models = ModelConfigs {
        sequence: SequenceConfig::default().with_epochs(5).with_seed(7),
        ..ModelConfigs::default()
    };
    ModelSelector::with_config(SelectorConfig::default().with_models(models).with_parallel(parallel))
}

#[test]
fn every_candidate_is_compared() {
    let series = weekly_sales(260);
    let result = fast_selector(true).select(&series, 14, None).unwrap();

    assert_eq!(result.comparison.len(), ModelKind::ALL.len());
    assert_eq!(result.comparison[0].model, result.selected);
    assert!(result.comparison[0].is_best);
    assert_eq!(result.forecast.horizon(), 14);
    assert!(result.forecast.metrics().is_some());

    let ranked: Vec<f64> = result
        .comparison
        .iter()
        .filter_map(|c| c.metrics.as_ref().map(|m| m.rmse))
        .collect();
    assert!(ranked.len() >= 2);
    assert!(ranked.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn forecasts_continue_past_the_history() {
    let series = weekly_sales(150);
    let result = fast_selector(false)
        .select(&series, 7, Some(&[ModelKind::Seasonal, ModelKind::Arima][..]))
        .unwrap();
    let last = series.last_timestamp().unwrap();
    assert!(result.forecast.steps()[0].timestamp > last);
    assert_eq!(result.comparison.len(), 2);
}

#[test]
fn tiny_history_reports_what_is_missing() {
    let series = weekly_sales(6);
    match fast_selector(false).select(&series, 3, None) {
        Err(AnalyticsError::InsufficientData { needed, got, .. }) => {
            assert!(needed > got);
        }
        other => panic!("expected insufficient data, got {other:?}"),
    }
}

#[test]
fn model_names_parse_with_aliases() {
    assert_eq!("LSTM".parse::<ModelKind>().unwrap(), ModelKind::Sequence);
    assert_eq!("arima".parse::<ModelKind>().unwrap(), ModelKind::Arima);
    assert!("prophet".parse::<ModelKind>().is_err());
}
