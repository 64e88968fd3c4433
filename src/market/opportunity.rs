//! Multi-criteria market-entry opportunity scoring.
//!
//! Indicators are min-max normalized across regions, cost criteria are
//! inverted, and the weighted sum is scaled to `[0, 100]`.

use crate::error::{AnalyticsError, Result};
use crate::utils::stats::{mean, median, spearman, std_dev};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Relative bump applied to one criterion in one-at-a-time sensitivity.
const SENSITIVITY_BUMP: f64 = 0.2;

/// Criteria where a lower raw value is a better opportunity.
const COST_CRITERIA: [&str; 2] = ["competition_level", "market_maturity"];

/// Whether higher or lower raw values are preferable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionDirection {
    Benefit,
    Cost,
}

impl CriterionDirection {
    /// Direction for a criterion name; unknown names are benefits.
    pub fn for_criterion(name: &str) -> Self {
        if COST_CRITERIA.contains(&name) {
            CriterionDirection::Cost
        } else {
            CriterionDirection::Benefit
        }
    }
}

/// Validated criterion weights.
///
/// Serialized as a plain `name -> weight` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct OpportunityCriteria {
    weights: BTreeMap<String, f64>,
}

impl Default for OpportunityCriteria {
    fn default() -> Self {
        let weights = [
            ("market_size", 0.25),
            ("growth_rate", 0.25),
            ("competition_level", 0.20),
            ("price_premium", 0.15),
            ("market_maturity", 0.15),
        ]
        .into_iter()
        .map(|(name, w)| (name.to_string(), w))
        .collect();
        Self { weights }
    }
}

impl TryFrom<BTreeMap<String, f64>> for OpportunityCriteria {
    type Error = AnalyticsError;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<OpportunityCriteria> for BTreeMap<String, f64> {
    fn from(criteria: OpportunityCriteria) -> Self {
        criteria.weights
    }
}

impl OpportunityCriteria {
    /// Weights must be finite, non-negative and sum to 1.0 within [`WEIGHT_TOLERANCE`].
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self> {
        let sum = check_weights(&weights)?;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AnalyticsError::InvalidWeights {
                sum,
                detail: "weights must sum to 1.0".to_string(),
            });
        }
        Ok(Self { weights })
    }

    /// Rescale arbitrary non-negative weights so they sum to 1.0.
    pub fn normalized(weights: BTreeMap<String, f64>) -> Result<Self> {
        let sum = check_weights(&weights)?;
        if sum <= 0.0 {
            return Err(AnalyticsError::InvalidWeights {
                sum,
                detail: "weights must not all be zero".to_string(),
            });
        }
        let weights = weights.into_iter().map(|(k, w)| (k, w / sum)).collect();
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn weight(&self, criterion: &str) -> Option<f64> {
        self.weights.get(criterion).copied()
    }

    pub fn criteria(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }
}

fn check_weights(weights: &BTreeMap<String, f64>) -> Result<f64> {
    let sum: f64 = weights.values().sum();
    if weights.is_empty() {
        return Err(AnalyticsError::InvalidWeights {
            sum,
            detail: "no criteria given".to_string(),
        });
    }
    for (name, w) in weights {
        if !w.is_finite() || *w < 0.0 {
            return Err(AnalyticsError::InvalidWeights {
                sum,
                detail: format!("weight for {} must be a non-negative number, got {}", name, w),
            });
        }
    }
    Ok(sum)
}

/// Raw market indicators of one region. Absent criteria are imputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionIndicators {
    pub region: String,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

impl RegionIndicators {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            indicators: BTreeMap::new(),
        }
    }

    pub fn with_indicator(mut self, criterion: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(criterion.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityCategory {
    Excellent,
    Good,
    Moderate,
    Low,
    VeryLow,
}

impl OpportunityCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            OpportunityCategory::Excellent
        } else if score >= 60.0 {
            OpportunityCategory::Good
        } else if score >= 40.0 {
            OpportunityCategory::Moderate
        } else if score >= 20.0 {
            OpportunityCategory::Low
        } else {
            OpportunityCategory::VeryLow
        }
    }
}

impl fmt::Display for OpportunityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpportunityCategory::Excellent => "Excellent",
            OpportunityCategory::Good => "Good",
            OpportunityCategory::Moderate => "Moderate",
            OpportunityCategory::Low => "Low",
            OpportunityCategory::VeryLow => "Very Low",
        })
    }
}

/// Scored region, rank 1 being the best opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityScore {
    pub region: String,
    pub score: f64,
    pub rank: usize,
    pub category: OpportunityCategory,
    /// Indicator values after imputation.
    pub indicators: BTreeMap<String, f64>,
    /// Direction-adjusted normalized values in `[0, 1]`.
    pub normalized: BTreeMap<String, f64>,
}

/// Score movement of one region under an alternative weighting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDelta {
    pub region: String,
    pub baseline_score: f64,
    pub scenario_score: f64,
    pub score_delta: f64,
    pub baseline_rank: usize,
    pub scenario_rank: usize,
    /// Positive when the region moved up.
    pub rank_change: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub weights: BTreeMap<String, f64>,
    pub renormalized: bool,
    pub scores: Vec<OpportunityScore>,
    pub deltas: Vec<ScoreDelta>,
    pub avg_score: f64,
    pub score_std: f64,
}

/// Effect of bumping a single criterion weight by 20%.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionSensitivity {
    pub criterion: String,
    pub weights: BTreeMap<String, f64>,
    /// `None` when either ranking is constant.
    pub rank_correlation: Option<f64>,
    pub avg_score_change: f64,
    pub max_score_change: f64,
    pub min_score_change: f64,
}

/// Baseline scores with their scenario and one-at-a-time sensitivities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityReport {
    pub baseline: Vec<OpportunityScore>,
    pub scenarios: Vec<ScenarioResult>,
    pub criteria: Vec<CriterionSensitivity>,
}

/// MCDA scorer over per-region indicators.
#[derive(Debug, Clone, Default)]
pub struct OpportunityScorer {
    criteria: OpportunityCriteria,
}

impl OpportunityScorer {
    pub fn new(criteria: OpportunityCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &OpportunityCriteria {
        &self.criteria
    }

    /// Score and rank every region with the configured weights.
    pub fn score(&self, regions: &[RegionIndicators]) -> Result<Vec<OpportunityScore>> {
        score_regions(regions, &self.criteria)
    }

    /// Best `n` regions, or all of them when `top_n` is `None`.
    pub fn top(&self, regions: &[RegionIndicators], top_n: Option<usize>) -> Result<Vec<OpportunityScore>> {
        let mut scores = self.score(regions)?;
        if let Some(n) = top_n {
            scores.truncate(n);
        }
        Ok(scores)
    }

    /// Re-score under named weight scenarios without touching the baseline.
    ///
    /// Scenario weights that do not sum to 1.0 are rescaled; negative
    /// weights are rejected.
    pub fn compare_scenarios(
        &self,
        regions: &[RegionIndicators],
        scenarios: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<Vec<ScenarioResult>> {
        let baseline = self.score(regions)?;
        scenarios
            .iter()
            .map(|(name, weights)| self.run_scenario(regions, &baseline, name, weights))
            .collect()
    }

    fn run_scenario(
        &self,
        regions: &[RegionIndicators],
        baseline: &[OpportunityScore],
        name: &str,
        weights: &BTreeMap<String, f64>,
    ) -> Result<ScenarioResult> {
        let (criteria, renormalized) = match OpportunityCriteria::new(weights.clone()) {
            Ok(c) => (c, false),
            Err(AnalyticsError::InvalidWeights { sum, .. }) if sum.is_finite() && sum > 0.0 => {
                warn!(scenario = %name, sum, "scenario weights do not sum to 1, renormalizing");
                (OpportunityCriteria::normalized(weights.clone())?, true)
            }
            Err(e) => return Err(e),
        };
        let scores = score_regions(regions, &criteria)?;
        let deltas = score_deltas(baseline, &scores);
        let values: Vec<f64> = scores.iter().map(|s| s.score).collect();

        Ok(ScenarioResult {
            name: name.to_string(),
            weights: criteria.weights,
            renormalized,
            avg_score: mean(&values),
            score_std: if values.len() > 1 { std_dev(&values) } else { 0.0 },
            scores,
            deltas,
        })
    }

    /// Bump each criterion weight by 20%, taking the increase proportionally
    /// from the others, and measure how scores and ranking move.
    pub fn criterion_sensitivity(&self, regions: &[RegionIndicators]) -> Result<Vec<CriterionSensitivity>> {
        let baseline = self.score(regions)?;
        let base = &self.criteria.weights;

        let mut results = Vec::with_capacity(base.len());
        for (criterion, &w) in base {
            let bump = w * SENSITIVITY_BUMP;
            let others: f64 = base.iter().filter(|(k, _)| *k != criterion).map(|(_, v)| v).sum();
            let weights: BTreeMap<String, f64> = base
                .iter()
                .map(|(k, &v)| {
                    let adjusted = if k == criterion {
                        v + bump
                    } else if others > 0.0 {
                        v - bump * v / others
                    } else {
                        v
                    };
                    (k.clone(), adjusted.max(0.0))
                })
                .collect();

            let bumped = score_regions(regions, &OpportunityCriteria::normalized(weights.clone())?)?;
            let deltas = score_deltas(&baseline, &bumped);
            let changes: Vec<f64> = deltas.iter().map(|d| d.score_delta).collect();
            let base_ranks: Vec<f64> = deltas.iter().map(|d| d.baseline_rank as f64).collect();
            let new_ranks: Vec<f64> = deltas.iter().map(|d| d.scenario_rank as f64).collect();
            let rho = spearman(&base_ranks, &new_ranks);

            debug!(criterion = %criterion, rank_correlation = rho, "criterion sensitivity");
            results.push(CriterionSensitivity {
                criterion: criterion.clone(),
                weights,
                rank_correlation: rho.is_finite().then_some(rho),
                avg_score_change: mean(&changes),
                max_score_change: changes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                min_score_change: changes.iter().copied().fold(f64::INFINITY, f64::min),
            });
        }
        Ok(results)
    }

    /// Baseline, named scenarios and one-at-a-time sensitivity in one pass.
    pub fn sensitivity(
        &self,
        regions: &[RegionIndicators],
        scenarios: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<SensitivityReport> {
        Ok(SensitivityReport {
            baseline: self.score(regions)?,
            scenarios: self.compare_scenarios(regions, scenarios)?,
            criteria: self.criterion_sensitivity(regions)?,
        })
    }
}

fn score_deltas(baseline: &[OpportunityScore], scenario: &[OpportunityScore]) -> Vec<ScoreDelta> {
    baseline
        .iter()
        .filter_map(|b| {
            let s = scenario.iter().find(|s| s.region == b.region)?;
            Some(ScoreDelta {
                region: b.region.clone(),
                baseline_score: b.score,
                scenario_score: s.score,
                score_delta: s.score - b.score,
                baseline_rank: b.rank,
                scenario_rank: s.rank,
                rank_change: b.rank as i64 - s.rank as i64,
            })
        })
        .collect()
}

/// Fill absent indicators with the median of the regions that report them.
fn impute(regions: &[RegionIndicators], criterion: &str) -> Option<Vec<f64>> {
    let present: Vec<f64> = regions
        .iter()
        .filter_map(|r| r.indicators.get(criterion).copied())
        .filter(|v| v.is_finite())
        .collect();
    if present.is_empty() {
        return None;
    }
    let fill = median(&present);
    Some(
        regions
            .iter()
            .map(|r| match r.indicators.get(criterion) {
                Some(v) if v.is_finite() => *v,
                _ => fill,
            })
            .collect(),
    )
}

/// Direction-adjusted min-max normalization; a constant criterion maps to 0.5.
fn normalize(values: &[f64], direction: CriterionDirection) -> Vec<f64> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    values
        .iter()
        .map(|v| {
            if range <= 0.0 {
                return 0.5;
            }
            let x = (v - lo) / range;
            match direction {
                CriterionDirection::Benefit => x,
                CriterionDirection::Cost => 1.0 - x,
            }
        })
        .collect()
}

fn score_regions(regions: &[RegionIndicators], criteria: &OpportunityCriteria) -> Result<Vec<OpportunityScore>> {
    if regions.is_empty() {
        return Err(AnalyticsError::EmptyData);
    }

    let n = regions.len();
    let mut totals = vec![0.0; n];
    let mut filled: Vec<BTreeMap<String, f64>> = vec![BTreeMap::new(); n];
    let mut normalized: Vec<BTreeMap<String, f64>> = vec![BTreeMap::new(); n];

    for (criterion, &weight) in &criteria.weights {
        let norm = match impute(regions, criterion) {
            Some(values) => {
                for (i, v) in values.iter().enumerate() {
                    filled[i].insert(criterion.clone(), *v);
                }
                normalize(&values, CriterionDirection::for_criterion(criterion))
            }
            None => {
                warn!(criterion = %criterion, "no region reports criterion, scoring it neutral");
                vec![0.5; n]
            }
        };
        for (i, x) in norm.into_iter().enumerate() {
            totals[i] += weight * x;
            normalized[i].insert(criterion.clone(), x);
        }
    }

    let mut scores: Vec<OpportunityScore> = regions
        .iter()
        .zip(totals)
        .zip(filled.into_iter().zip(normalized))
        .map(|((region, total), (indicators, normalized))| {
            let score = (total * 100.0).clamp(0.0, 100.0);
            OpportunityScore {
                region: region.region.clone(),
                score,
                rank: 0,
                category: OpportunityCategory::from_score(score),
                indicators,
                normalized,
            }
        })
        .collect();

    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.region.cmp(&b.region)));
    for (i, s) in scores.iter_mut().enumerate() {
        s.rank = i + 1;
    }
    Ok(scores)
}
