//! Recurrent sequence forecaster over min-max scaled sliding windows.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{AnalyticsError, Result};
use crate::models::sequence::network::{Adam, RecurrentNetwork};
use crate::models::traits::{require_horizon, require_length};
use crate::models::Forecaster;
use crate::utils::stats::{std_dev, z_for_level};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for [`SequenceModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Input window length.
    pub lookback: usize,
    /// Units in each recurrent layer.
    pub hidden_units: usize,
    /// Units in the dense layer before the output.
    pub dense_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Dropout rate between the recurrent layers while training.
    pub dropout: f64,
    /// Trailing share of windows held out for early stopping.
    pub validation_fraction: f64,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    pub confidence_level: f64,
    /// Seed for weight initialisation, shuffling and dropout masks.
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            hidden_units: 32,
            dense_units: 16,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            dropout: 0.2,
            validation_fraction: 0.2,
            patience: 10,
            confidence_level: 0.95,
            seed: 42,
        }
    }
}

impl SequenceConfig {
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Set recurrent and dense layer widths.
    pub fn with_units(mut self, hidden_units: usize, dense_units: usize) -> Self {
        self.hidden_units = hidden_units;
        self.dense_units = dense_units;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.lookback == 0 || self.hidden_units == 0 || self.dense_units == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "lookback and layer sizes must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 || self.epochs == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "epochs and batch_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Maps values to [0, 1] using the training range.
#[derive(Debug, Clone, Copy)]
struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    fn fit(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max - min > 0.0 { max - min } else { 1.0 };
        Self { min, range }
    }

    fn transform(&self, v: f64) -> f64 {
        (v - self.min) / self.range
    }

    fn inverse(&self, v: f64) -> f64 {
        v * self.range + self.min
    }
}

#[derive(Debug, Clone)]
struct SequenceFit {
    network: RecurrentNetwork,
    scaler: MinMaxScaler,
    /// Last `lookback` scaled observations.
    window: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    validation_sigma: f64,
    epochs_run: usize,
}

/// Two-layer recurrent network forecasting one step at a time.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    config: SequenceConfig,
    series: Option<TimeSeries>,
    fit: Option<SequenceFit>,
}

impl SequenceModel {
    /// Minimum series length accepted by `fit`.
    pub const MIN_OBSERVATIONS: usize = 200;

    pub fn new() -> Self {
        Self::with_config(SequenceConfig::default())
    }

    pub fn with_config(config: SequenceConfig) -> Self {
        Self {
            config,
            series: None,
            fit: None,
        }
    }

    /// Epochs run before early stopping in the last fit.
    pub fn epochs_run(&self) -> Option<usize> {
        self.fit.as_ref().map(|f| f.epochs_run)
    }

    /// Standard deviation of validation residuals on the original scale.
    pub fn validation_sigma(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.validation_sigma)
    }
}

impl Default for SequenceModel {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_squared_error(network: &RecurrentNetwork, samples: &[(&[f64], f64)]) -> f64 {
    samples
        .iter()
        .map(|(x, y)| (network.predict(x) - y).powi(2))
        .sum::<f64>()
        / samples.len() as f64
}

impl Forecaster for SequenceModel {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        require_length("sequence", series, Self::MIN_OBSERVATIONS)?;
        let cfg = &self.config;
        cfg.validate()?;
        let values = series.values();
        let lookback = cfg.lookback;
        if values.len() < lookback + 2 {
            return Err(AnalyticsError::insufficient("sequence", lookback + 2, values.len()));
        }

        let scaler = MinMaxScaler::fit(values);
        let scaled: Vec<f64> = values.iter().map(|v| scaler.transform(*v)).collect();
        let samples: Vec<(&[f64], f64)> = (0..scaled.len() - lookback)
            .map(|i| (&scaled[i..i + lookback], scaled[i + lookback]))
            .collect();

        let n_val = ((samples.len() as f64 * cfg.validation_fraction).floor() as usize)
            .clamp(1, samples.len() - 1);
        let (train, validation) = samples.split_at(samples.len() - n_val);

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut network = RecurrentNetwork::new(cfg.hidden_units, cfg.dense_units, &mut rng);
        let mut optimizer = Adam::new(network.num_params(), cfg.learning_rate);

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut best_params = network.params().to_vec();
        let mut best_val = mean_squared_error(&network, validation);
        let mut stale = 0;
        let mut epochs_run = 0;

        for epoch in 0..cfg.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for chunk in order.chunks(cfg.batch_size) {
                let batch: Vec<(&[f64], f64)> = chunk.iter().map(|&i| train[i]).collect();
                let loss = network.train_batch(&batch, cfg.dropout, &mut rng, &mut optimizer);
                if !loss.is_finite() {
                    return Err(AnalyticsError::ComputationError(format!(
                        "sequence model training diverged at epoch {}",
                        epoch + 1
                    )));
                }
                epoch_loss += loss * batch.len() as f64;
            }
            epochs_run = epoch + 1;

            let val_loss = mean_squared_error(&network, validation);
            debug!(
                epoch = epochs_run,
                train_loss = epoch_loss / train.len() as f64,
                val_loss,
                "sequence epoch"
            );
            if val_loss < best_val {
                best_val = val_loss;
                best_params.copy_from_slice(network.params());
                stale = 0;
            } else {
                stale += 1;
                if stale >= cfg.patience {
                    debug!(epoch = epochs_run, "early stopping");
                    break;
                }
            }
        }
        network.set_params(&best_params);

        let mut fitted = values[..lookback].to_vec();
        fitted.extend(samples.iter().map(|(x, _)| scaler.inverse(network.predict(x))));
        if fitted.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::ComputationError(
                "sequence model produced non-finite predictions".to_string(),
            ));
        }
        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(v, f)| v - f).collect();
        let validation_sigma = std_dev(&residuals[residuals.len() - n_val..]);

        self.fit = Some(SequenceFit {
            network,
            scaler,
            window: scaled[scaled.len() - lookback..].to_vec(),
            fitted,
            residuals,
            validation_sigma,
            epochs_run,
        });
        self.series = Some(series.clone());
        Ok(())
    }

    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let (fit, series) = match (&self.fit, &self.series) {
            (Some(fit), Some(series)) => (fit, series),
            _ => return Err(AnalyticsError::NotFitted),
        };
        require_horizon(horizon)?;

        let z = z_for_level(self.config.confidence_level);
        let half_width = z * fit.validation_sigma;

        let mut window = fit.window.clone();
        let mut points = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = fit.network.predict(&window);
            points.push(fit.scaler.inverse(next));
            window.remove(0);
            window.push(next);
        }

        let lower = points.iter().map(|p| p - half_width).collect();
        let upper = points.iter().map(|p| p + half_width).collect();
        ForecastResult::new(
            self.name(),
            series.future_timestamps(horizon),
            points,
            lower,
            upper,
            self.config.confidence_level,
        )
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "Sequence"
    }

    fn min_observations(&self) -> usize {
        Self::MIN_OBSERVATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::f64::consts::PI;

    fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::days(i as i64)).collect()
    }

    fn seasonal_series(n: usize) -> TimeSeries {
        let values = (0..n)
            .map(|i| 50.0 + 10.0 * (2.0 * PI * i as f64 / 14.0).sin())
            .collect();
        TimeSeries::new(make_timestamps(n), values).unwrap()
    }

    fn small_config() -> SequenceConfig {
        SequenceConfig::default()
            .with_lookback(14)
            .with_units(6, 4)
            .with_epochs(8)
            .with_learning_rate(0.01)
    }

    #[test]
    fn rejects_short_series() {
        let ts = seasonal_series(150);
        let err = SequenceModel::new().fit(&ts).unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::InsufficientData {
                context: "sequence".to_string(),
                needed: 200,
                got: 150
            }
        );
    }

    #[test]
    fn identical_inputs_give_identical_forecasts() {
        let ts = seasonal_series(220);
        let mut a = SequenceModel::with_config(small_config());
        let mut b = SequenceModel::with_config(small_config());
        a.fit(&ts).unwrap();
        b.fit(&ts).unwrap();
        assert_eq!(a.forecast(10).unwrap(), b.forecast(10).unwrap());
    }

    #[test]
    fn forecast_shape_and_intervals() {
        let ts = seasonal_series(220);
        let mut model = SequenceModel::with_config(small_config());
        model.fit(&ts).unwrap();
        let forecast = model.forecast(20).unwrap();

        assert_eq!(forecast.horizon(), 20);
        assert_eq!(forecast.model(), "Sequence");
        for step in forecast.steps() {
            assert!(step.lower <= step.point && step.point <= step.upper);
            assert!(step.point.is_finite());
        }
        assert_eq!(model.fitted_values().unwrap().len(), 220);
        assert!(model.epochs_run().unwrap() <= 8);
        assert!(model.validation_sigma().unwrap() >= 0.0);
    }

    #[test]
    fn forecasting_twice_is_stateless() {
        let ts = seasonal_series(210);
        let mut model = SequenceModel::with_config(small_config());
        model.fit(&ts).unwrap();
        assert_eq!(model.forecast(5).unwrap(), model.forecast(5).unwrap());
    }

    #[test]
    fn invalid_dropout_is_rejected() {
        let ts = seasonal_series(210);
        let mut model = SequenceModel::with_config(small_config().with_dropout(1.5));
        assert_eq!(model.fit(&ts).unwrap_err().kind(), "invalid_parameter");
    }
}
