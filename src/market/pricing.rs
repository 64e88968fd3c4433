//! Cross-regional price comparison on USD-normalized prices.

use crate::detection::iqr_fences;
use crate::error::{AnalyticsError, Result};
use crate::utils::stats::{
    coefficient_of_variation, max, mean, median, min, std_dev, t_two_sided_p, variance,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Conversion rates to USD keyed by upper-case ISO currency code.
///
/// `USD` is always present with rate 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ExchangeRates {
    rates: BTreeMap<String, f64>,
}

impl Default for ExchangeRates {
    fn default() -> Self {
        let rates = [
            ("USD", 1.0),
            ("EUR", 1.08),
            ("GBP", 1.27),
            ("JPY", 0.0067),
            ("CNY", 0.14),
            ("INR", 0.012),
            ("CAD", 0.74),
            ("AUD", 0.66),
            ("BRL", 0.20),
            ("MXN", 0.058),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();
        Self { rates }
    }
}

impl TryFrom<BTreeMap<String, f64>> for ExchangeRates {
    type Error = AnalyticsError;

    fn try_from(rates: BTreeMap<String, f64>) -> Result<Self> {
        Self::new(rates)
    }
}

impl From<ExchangeRates> for BTreeMap<String, f64> {
    fn from(rates: ExchangeRates) -> Self {
        rates.rates
    }
}

impl ExchangeRates {
    /// Build a table from `currency -> USD per unit`; USD is pinned to 1.0.
    pub fn new(rates: BTreeMap<String, f64>) -> Result<Self> {
        let mut normalized = BTreeMap::new();
        for (code, rate) in rates {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(AnalyticsError::InvalidParameter(format!(
                    "exchange rate for {} must be positive, got {}",
                    code, rate
                )));
            }
            normalized.insert(code.to_ascii_uppercase(), rate);
        }
        normalized.insert("USD".to_string(), 1.0);
        Ok(Self { rates: normalized })
    }

    /// Add or replace a rate; USD cannot be changed.
    pub fn with_rate(mut self, currency: &str, rate: f64) -> Result<Self> {
        let code = currency.to_ascii_uppercase();
        if code == "USD" {
            return Ok(self);
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "exchange rate for {} must be positive, got {}",
                code, rate
            )));
        }
        self.rates.insert(code, rate);
        Ok(self)
    }

    /// USD per unit of `currency`.
    pub fn rate(&self, currency: &str) -> Result<f64> {
        self.rates
            .get(&currency.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| AnalyticsError::UnknownCurrency(currency.to_string()))
    }

    pub fn to_usd(&self, amount: f64, currency: &str) -> Result<f64> {
        Ok(amount * self.rate(currency)?)
    }

    pub fn from_usd(&self, amount: f64, currency: &str) -> Result<f64> {
        Ok(amount / self.rate(currency)?)
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }
}

/// A raw price observation as delivered by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub region: String,
    pub currency: String,
    pub price: f64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub product_id: Option<String>,
}

/// A price observation with its USD equivalent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalObservation {
    pub region: String,
    pub currency: String,
    pub raw_price: f64,
    pub price_usd: f64,
    pub quantity: f64,
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStats {
    pub region: String,
    pub mean_price: f64,
    pub median_price: f64,
    pub std_dev: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub count: usize,
    pub coefficient_of_variation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectSize {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectSize {
    /// Cohen's conventional buckets on |d|.
    pub fn from_cohens_d(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            EffectSize::Negligible
        } else if d < 0.5 {
            EffectSize::Small
        } else if d < 0.8 {
            EffectSize::Medium
        } else {
            EffectSize::Large
        }
    }
}

/// Welch t-test and effect size between two regions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseComparison {
    pub region1: String,
    pub region2: String,
    pub region1_mean: f64,
    pub region2_mean: f64,
    /// region1_mean − region2_mean
    pub price_difference: f64,
    /// Difference relative to region2's mean, in percent.
    pub price_difference_pct: Option<f64>,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub is_significant: bool,
    pub cohens_d: f64,
    pub effect_size: EffectSize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDispersion {
    pub overall_mean: f64,
    pub overall_std: f64,
    pub price_range: f64,
    pub coefficient_of_variation: f64,
    pub gini_coefficient: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// range / mean × 100
    pub price_spread_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierKind {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceOutlier {
    pub region: String,
    pub product_id: Option<String>,
    pub price: f64,
    pub mean_price: f64,
    pub deviation_from_mean: f64,
    pub z_score: f64,
    pub kind: OutlierKind,
}

/// Full regional price comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceComparison {
    /// Sorted by mean price, highest first.
    pub regional_statistics: Vec<RegionStats>,
    /// Sorted by |price difference|, largest first.
    pub pairwise_comparisons: Vec<PairwiseComparison>,
    pub outliers: Vec<PriceOutlier>,
    pub dispersion: PriceDispersion,
    pub total_regions: usize,
    pub total_products: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyImpact {
    pub currency: String,
    pub exchange_rate_to_usd: f64,
    pub avg_price_local: f64,
    pub avg_price_usd: f64,
    pub regions: Vec<String>,
    pub count: usize,
}

/// Gini coefficient of non-negative values; 0 for empty or zero-sum input.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let total: f64 = sorted.iter().sum();
    if n == 0 || total == 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (i + 1) as f64 * x)
        .sum();
    let nf = n as f64;
    2.0 * weighted / (nf * total) - (nf + 1.0) / nf
}

/// Welch's t statistic, Welch–Satterthwaite df and two-sided p-value.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> (f64, f64, f64) {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(a), mean(b));
    let (v1, v2) = (variance(a) / n1, variance(b) / n2);
    let se = (v1 + v2).sqrt();

    if se == 0.0 {
        // identical constant samples carry no evidence of a difference
        return if m1 == m2 {
            (0.0, n1 + n2 - 2.0, 1.0)
        } else {
            let t = if m1 > m2 { f64::INFINITY } else { f64::NEG_INFINITY };
            (t, n1 + n2 - 2.0, 0.0)
        };
    }

    let t = (m1 - m2) / se;
    let df = (v1 + v2).powi(2) / (v1 * v1 / (n1 - 1.0) + v2 * v2 / (n2 - 1.0));
    (t, df, t_two_sided_p(t, df))
}

/// Group items by key, keeping the order in which keys first appear.
fn group_by_region<'a, T>(items: &'a [T], key: impl Fn(&T) -> &str) -> Vec<(String, Vec<&'a T>)> {
    let mut groups: Vec<(String, Vec<&T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(g, _)| g == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k.to_string(), vec![item])),
        }
    }
    groups
}

/// Compares USD-normalized prices across regions.
#[derive(Debug, Clone, Default)]
pub struct RegionalComparator {
    rates: ExchangeRates,
}

impl RegionalComparator {
    pub fn new(rates: ExchangeRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &ExchangeRates {
        &self.rates
    }

    /// Convert every record to USD; fails on unknown currencies and non-finite prices.
    pub fn normalize(&self, records: &[PriceRecord]) -> Result<Vec<RegionalObservation>> {
        records
            .iter()
            .map(|r| {
                if !r.price.is_finite() {
                    return Err(AnalyticsError::MissingValues);
                }
                Ok(RegionalObservation {
                    region: r.region.clone(),
                    currency: r.currency.to_ascii_uppercase(),
                    raw_price: r.price,
                    price_usd: self.rates.to_usd(r.price, &r.currency)?,
                    quantity: r.quantity,
                    product_id: r.product_id.clone(),
                })
            })
            .collect()
    }

    /// Regional statistics, pairwise tests, outliers and dispersion.
    pub fn compare(&self, records: &[PriceRecord]) -> Result<PriceComparison> {
        if records.is_empty() {
            return Err(AnalyticsError::EmptyData);
        }
        let observations = self.normalize(records)?;
        let groups = group_by_region(&observations, |o| o.region.as_str());
        let prices: Vec<(String, Vec<f64>)> = groups
            .iter()
            .map(|(region, obs)| (region.clone(), obs.iter().map(|o| o.price_usd).collect()))
            .collect();

        let mut regional_statistics: Vec<RegionStats> = prices
            .iter()
            .map(|(region, p)| RegionStats {
                region: region.clone(),
                mean_price: mean(p),
                median_price: median(p),
                std_dev: std_dev(p),
                min_price: min(p),
                max_price: max(p),
                count: p.len(),
                coefficient_of_variation: coefficient_of_variation(p),
            })
            .collect();
        regional_statistics.sort_by(|a, b| b.mean_price.total_cmp(&a.mean_price));

        let pairwise_comparisons = pairwise(&prices);
        let outliers = outliers(&groups);

        let all: Vec<f64> = observations.iter().map(|o| o.price_usd).collect();
        let overall_mean = mean(&all);
        let price_range = max(&all) - min(&all);
        let dispersion = PriceDispersion {
            overall_mean,
            overall_std: std_dev(&all),
            price_range,
            coefficient_of_variation: coefficient_of_variation(&all),
            gini_coefficient: gini(&all),
            min_price: min(&all),
            max_price: max(&all),
            price_spread_pct: if overall_mean > 0.0 {
                price_range / overall_mean * 100.0
            } else {
                0.0
            },
        };

        let total_products = observations
            .iter()
            .filter_map(|o| o.product_id.as_deref())
            .collect::<BTreeSet<_>>()
            .len();

        debug!(
            regions = groups.len(),
            pairs = pairwise_comparisons.len(),
            outliers = outliers.len(),
            "regional price comparison"
        );

        Ok(PriceComparison {
            regional_statistics,
            pairwise_comparisons,
            outliers,
            dispersion,
            total_regions: groups.len(),
            total_products,
        })
    }

    /// Per-currency local and USD averages.
    pub fn currency_impact(&self, records: &[PriceRecord]) -> Result<Vec<CurrencyImpact>> {
        let observations = self.normalize(records)?;
        group_by_region(&observations, |o| o.currency.as_str())
            .into_iter()
            .map(|(currency, obs)| {
                let local: Vec<f64> = obs.iter().map(|o| o.raw_price).collect();
                let usd: Vec<f64> = obs.iter().map(|o| o.price_usd).collect();
                let mut regions: Vec<String> = Vec::new();
                for o in &obs {
                    if !regions.contains(&o.region) {
                        regions.push(o.region.clone());
                    }
                }
                Ok(CurrencyImpact {
                    exchange_rate_to_usd: self.rates.rate(&currency)?,
                    currency,
                    avg_price_local: mean(&local),
                    avg_price_usd: mean(&usd),
                    regions,
                    count: obs.len(),
                })
            })
            .collect()
    }
}

fn pairwise(prices: &[(String, Vec<f64>)]) -> Vec<PairwiseComparison> {
    let mut comparisons = Vec::new();
    for (i, (region1, p1)) in prices.iter().enumerate() {
        for (region2, p2) in &prices[i + 1..] {
            if p1.len() < 2 || p2.len() < 2 {
                continue;
            }
            let (t_statistic, degrees_of_freedom, p_value) = welch_t_test(p1, p2);
            let (m1, m2) = (mean(p1), mean(p2));
            let pooled = ((variance(p1) + variance(p2)) / 2.0).sqrt();
            let cohens_d = if pooled > 0.0 { (m1 - m2) / pooled } else { 0.0 };
            let diff = m1 - m2;

            comparisons.push(PairwiseComparison {
                region1: region1.clone(),
                region2: region2.clone(),
                region1_mean: m1,
                region2_mean: m2,
                price_difference: diff,
                price_difference_pct: (m2 > 0.0).then(|| diff / m2 * 100.0),
                t_statistic,
                degrees_of_freedom,
                p_value,
                is_significant: p_value < 0.05,
                cohens_d,
                effect_size: EffectSize::from_cohens_d(cohens_d),
            });
        }
    }
    comparisons.sort_by(|a, b| b.price_difference.abs().total_cmp(&a.price_difference.abs()));
    comparisons
}

fn outliers(groups: &[(String, Vec<&RegionalObservation>)]) -> Vec<PriceOutlier> {
    let mut found = Vec::new();
    for (region, obs) in groups {
        if obs.len() < 4 {
            continue;
        }
        let prices: Vec<f64> = obs.iter().map(|o| o.price_usd).collect();
        let Some(fences) = iqr_fences(&prices, 1.5) else {
            continue;
        };
        let m = mean(&prices);
        let sd = std_dev(&prices);
        for o in obs.iter().filter(|o| fences.is_outlier(o.price_usd)) {
            found.push(PriceOutlier {
                region: region.clone(),
                product_id: o.product_id.clone(),
                price: o.price_usd,
                mean_price: m,
                deviation_from_mean: o.price_usd - m,
                z_score: if sd > 0.0 { (o.price_usd - m) / sd } else { 0.0 },
                kind: if o.price_usd > fences.upper {
                    OutlierKind::High
                } else {
                    OutlierKind::Low
                },
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(region: &str, currency: &str, price: f64) -> PriceRecord {
        PriceRecord {
            region: region.to_string(),
            currency: currency.to_string(),
            price,
            quantity: 1.0,
            product_id: Some("P1".to_string()),
        }
    }

    #[test]
    fn usd_is_pinned_and_round_trips() {
        let mut custom = BTreeMap::new();
        custom.insert("usd".to_string(), 2.0);
        custom.insert("eur".to_string(), 1.1);
        let rates = ExchangeRates::new(custom).unwrap();
        assert_eq!(rates.rate("USD").unwrap(), 1.0);
        assert_eq!(rates.rate("eur").unwrap(), 1.1);

        let defaults = ExchangeRates::default();
        let usd = defaults.to_usd(250.0, "GBP").unwrap();
        assert_relative_eq!(defaults.from_usd(usd, "GBP").unwrap(), 250.0, epsilon = 1e-9);
        assert_eq!(defaults.with_rate("USD", 3.0).unwrap().rate("USD").unwrap(), 1.0);
    }

    #[test]
    fn unknown_currency_is_an_error() {
        let err = ExchangeRates::default().rate("XYZ").unwrap_err();
        assert_eq!(err, AnalyticsError::UnknownCurrency("XYZ".to_string()));
        let comparator = RegionalComparator::default();
        assert!(comparator.compare(&[record("NA", "XYZ", 10.0)]).is_err());
    }

    #[test]
    fn rates_deserialize_from_json_map() {
        let rates: ExchangeRates = serde_json::from_str(r#"{"EUR": 1.2, "SEK": 0.09}"#).unwrap();
        assert_eq!(rates.rate("SEK").unwrap(), 0.09);
        assert_eq!(rates.rate("USD").unwrap(), 1.0);
        assert!(serde_json::from_str::<ExchangeRates>(r#"{"EUR": -1.0}"#).is_err());
    }

    #[test]
    fn clearly_different_regions_are_significant_and_large() {
        let mut records: Vec<PriceRecord> = [100.0, 102.0, 98.0, 101.0]
            .iter()
            .map(|p| record("NA", "USD", *p))
            .collect();
        records.extend([150.0, 148.0, 152.0, 149.0].iter().map(|p| record("EU", "USD", *p)));

        let comparison = RegionalComparator::default().compare(&records).unwrap();
        let pair = &comparison.pairwise_comparisons[0];
        assert!(pair.is_significant);
        assert_eq!(pair.effect_size, EffectSize::Large);
        assert!(pair.p_value < 0.001);
        assert_relative_eq!(pair.price_difference, 100.25 - 149.75);
        assert_eq!(comparison.regional_statistics[0].region, "EU");
        assert_eq!(comparison.total_regions, 2);
        assert_eq!(comparison.total_products, 1);
    }

    #[test]
    fn prices_are_normalized_before_comparison() {
        let records = vec![
            record("EU", "EUR", 100.0),
            record("EU", "EUR", 100.0),
            record("JP", "JPY", 16119.4),
            record("JP", "JPY", 16119.4),
        ];
        let comparison = RegionalComparator::default().compare(&records).unwrap();
        let pair = &comparison.pairwise_comparisons[0];
        assert_relative_eq!(pair.region1_mean, 108.0, epsilon = 1e-9);
        assert_relative_eq!(pair.region2_mean, 16119.4 * 0.0067, epsilon = 1e-9);
        assert!(!pair.is_significant);
    }

    #[test]
    fn welch_matches_reference_values() {
        // scipy.stats.ttest_ind(a, b, equal_var=False)
        let a = [27.5, 21.0, 19.0, 23.6, 17.0, 17.9, 16.9, 20.1, 21.9, 22.6, 23.1, 19.6, 19.0, 21.7, 21.4];
        let b = [27.1, 22.0, 20.8, 23.4, 23.4, 23.5, 25.8, 22.0, 24.8, 20.2, 21.9, 22.1, 22.9, 20.5, 24.4];
        let (t, df, p) = welch_t_test(&a, &b);
        assert_relative_eq!(t, -2.46, epsilon = 0.01);
        assert_relative_eq!(df, 24.99, epsilon = 0.05);
        assert_relative_eq!(p, 0.021, epsilon = 0.002);
    }

    #[test]
    fn gini_bounds() {
        assert_relative_eq!(gini(&[10.0, 10.0, 10.0]), 0.0, epsilon = 1e-12);
        assert!(gini(&[1.0, 1.0, 1.0, 100.0]) > 0.6);
        assert_eq!(gini(&[]), 0.0);
    }

    #[test]
    fn outliers_need_four_observations() {
        let mut records: Vec<PriceRecord> = [10.0, 11.0, 10.5, 10.2, 10.8, 50.0]
            .iter()
            .map(|p| record("NA", "USD", *p))
            .collect();
        records.extend([1.0, 100.0, 2.0].iter().map(|p| record("SA", "USD", *p)));

        let comparison = RegionalComparator::default().compare(&records).unwrap();
        assert_eq!(comparison.outliers.len(), 1);
        let outlier = &comparison.outliers[0];
        assert_eq!(outlier.region, "NA");
        assert_eq!(outlier.kind, OutlierKind::High);
        assert!(outlier.z_score > 1.0);
    }

    #[test]
    fn currency_impact_groups_by_currency() {
        let records = vec![
            record("DE", "EUR", 10.0),
            record("FR", "eur", 20.0),
            record("US", "USD", 5.0),
        ];
        let impact = RegionalComparator::default().currency_impact(&records).unwrap();
        assert_eq!(impact.len(), 2);
        assert_eq!(impact[0].currency, "EUR");
        assert_eq!(impact[0].regions, vec!["DE".to_string(), "FR".to_string()]);
        assert_relative_eq!(impact[0].avg_price_usd, 15.0 * 1.08, epsilon = 1e-9);
    }

    #[test]
    fn effect_size_buckets() {
        assert_eq!(EffectSize::from_cohens_d(0.1), EffectSize::Negligible);
        assert_eq!(EffectSize::from_cohens_d(-0.3), EffectSize::Small);
        assert_eq!(EffectSize::from_cohens_d(0.5), EffectSize::Medium);
        assert_eq!(EffectSize::from_cohens_d(0.8), EffectSize::Large);
    }
}
