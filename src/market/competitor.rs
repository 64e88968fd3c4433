//! Competitor pricing strategy, positioning and market concentration.

use crate::error::{AnalyticsError, Result};
use crate::utils::stats::{coefficient_of_variation, max, mean, median, min, std_dev};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One competitor observation in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub competitor: String,
    pub region: String,
    pub price: f64,
    #[serde(default)]
    pub sales: f64,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub availability_score: Option<f64>,
}

impl CompetitorRecord {
    pub fn new(competitor: impl Into<String>, region: impl Into<String>, price: f64, sales: f64) -> Self {
        Self {
            competitor: competitor.into(),
            region: region.into(),
            price,
            sales,
            product_id: None,
            quality_score: None,
            availability_score: None,
        }
    }
}

/// Configuration for [`CompetitorAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorConfig {
    /// Regional price CV below which pricing counts as uniform.
    pub uniform_pricing_cv: f64,
}

impl Default for CompetitorConfig {
    fn default() -> Self {
        Self {
            uniform_pricing_cv: 0.1,
        }
    }
}

impl CompetitorConfig {
    pub fn with_uniform_pricing_cv(mut self, threshold: f64) -> Self {
        self.uniform_pricing_cv = threshold;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    Uniform,
    Regional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Positioning {
    Budget,
    Value,
    Market,
    Premium,
    Luxury,
}

impl Positioning {
    /// Bucket a percentage difference from the market average.
    pub fn from_difference_pct(pct: f64) -> Self {
        if pct < -20.0 {
            Positioning::Budget
        } else if pct < -5.0 {
            Positioning::Value
        } else if pct < 5.0 {
            Positioning::Market
        } else if pct <= 20.0 {
            Positioning::Premium
        } else {
            Positioning::Luxury
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concentration {
    Competitive,
    Moderate,
    Concentrated,
}

impl Concentration {
    pub fn from_hhi(hhi: f64) -> Self {
        if hhi < 1500.0 {
            Concentration::Competitive
        } else if hhi <= 2500.0 {
            Concentration::Moderate
        } else {
            Concentration::Concentrated
        }
    }
}

/// Herfindahl-Hirschman index of percentage shares, on the 0-10000 scale.
pub fn herfindahl_index(shares_pct: &[f64]) -> f64 {
    shares_pct.iter().map(|s| s * s).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorStats {
    pub competitor: String,
    pub avg_price: f64,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_std: f64,
    pub regions_present: usize,
    pub records: usize,
}

/// Cheapest and most expensive competitor in a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLeaders {
    pub lowest_price_competitor: String,
    pub lowest_avg_price: f64,
    pub highest_price_competitor: String,
    pub highest_avg_price: f64,
    pub price_spread: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalPriceLeaders {
    pub region: String,
    #[serde(flatten)]
    pub leaders: PriceLeaders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePosition {
    pub competitor: String,
    pub avg_price: f64,
    pub market_avg_price: f64,
    pub difference_from_market: f64,
    pub difference_pct: f64,
    pub positioning: Positioning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalStrategy {
    pub competitor: String,
    pub regions_count: usize,
    pub avg_price: f64,
    pub price_std: f64,
    pub coefficient_of_variation: f64,
    pub min_regional_price: f64,
    pub max_regional_price: f64,
    pub strategy: PricingStrategy,
}

/// Pricing view of the competitive landscape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingAnalysis {
    /// Sorted by average price, cheapest first.
    pub competitor_statistics: Vec<CompetitorStats>,
    pub overall_leaders: PriceLeaders,
    pub regional_leaders: Vec<RegionalPriceLeaders>,
    pub positioning: Vec<PricePosition>,
    pub strategies: Vec<RegionalStrategy>,
    pub total_competitors: usize,
    pub total_regions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketShare {
    pub competitor: String,
    pub sales: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalMarketShare {
    pub region: String,
    pub total_sales: f64,
    pub leader: String,
    pub leader_share_pct: f64,
    pub hhi: f64,
    pub concentration: Concentration,
    pub shares: Vec<MarketShare>,
}

/// Sales-based market shares and concentration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketShareAnalysis {
    /// Sorted by share, largest first.
    pub overall: Vec<MarketShare>,
    pub regional: Vec<RegionalMarketShare>,
    pub hhi: f64,
    pub concentration: Concentration,
    pub total_competitors: usize,
}

/// Per-competitor footprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorProfile {
    pub competitor: String,
    pub regional_prices: BTreeMap<String, f64>,
    pub presence_count: usize,
    pub market_share_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageKind {
    PriceLeader,
    QualityLeader,
    AvailabilityLeader,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advantage {
    pub kind: AdvantageKind,
    pub value: f64,
    pub market_avg: f64,
    pub difference_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitiveAdvantages {
    pub competitor: String,
    pub advantages: Vec<Advantage>,
}

/// Competitor analysis over sales/price records tagged by region.
#[derive(Debug, Clone, Default)]
pub struct CompetitorAnalyzer {
    config: CompetitorConfig,
}

impl CompetitorAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompetitorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompetitorConfig {
        &self.config
    }

    /// Classify a competitor from its per-region average prices.
    ///
    /// A single region has no variation and counts as uniform.
    pub fn classify_strategy(&self, regional_prices: &[f64]) -> (f64, PricingStrategy) {
        let cv = if regional_prices.len() < 2 {
            0.0
        } else {
            coefficient_of_variation(regional_prices)
        };
        let strategy = if cv < self.config.uniform_pricing_cv {
            PricingStrategy::Uniform
        } else {
            PricingStrategy::Regional
        };
        (cv, strategy)
    }

    /// Statistics, leaders, positioning and regional strategies.
    pub fn analyze_pricing(&self, records: &[CompetitorRecord]) -> Result<PricingAnalysis> {
        validate(records)?;
        let by_competitor = group(records, |r| &r.competitor);

        let mut competitor_statistics: Vec<CompetitorStats> = by_competitor
            .iter()
            .map(|(name, recs)| {
                let prices: Vec<f64> = recs.iter().map(|r| r.price).collect();
                CompetitorStats {
                    competitor: name.clone(),
                    avg_price: mean(&prices),
                    median_price: median(&prices),
                    min_price: min(&prices),
                    max_price: max(&prices),
                    price_std: if prices.len() > 1 { std_dev(&prices) } else { 0.0 },
                    regions_present: distinct(recs, |r| &r.region),
                    records: recs.len(),
                }
            })
            .collect();
        competitor_statistics.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));

        let overall_leaders = leaders(&average_prices(records))?;
        let mut regional_leaders = Vec::new();
        for (region, recs) in group(records, |r| &r.region) {
            regional_leaders.push(RegionalPriceLeaders {
                leaders: leaders(&average_prices(&recs))?,
                region,
            });
        }

        let market_avg = mean(&records.iter().map(|r| r.price).collect::<Vec<_>>());
        let mut positioning: Vec<PricePosition> = competitor_statistics
            .iter()
            .map(|s| {
                let diff = s.avg_price - market_avg;
                let pct = if market_avg > 0.0 { diff / market_avg * 100.0 } else { 0.0 };
                PricePosition {
                    competitor: s.competitor.clone(),
                    avg_price: s.avg_price,
                    market_avg_price: market_avg,
                    difference_from_market: diff,
                    difference_pct: pct,
                    positioning: Positioning::from_difference_pct(pct),
                }
            })
            .collect();
        positioning.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));

        let strategies = by_competitor
            .iter()
            .map(|(name, recs)| {
                let regional: Vec<f64> = group(recs, |r| &r.region)
                    .values()
                    .map(|rs| mean(&rs.iter().map(|r| r.price).collect::<Vec<_>>()))
                    .collect();
                let (cv, strategy) = self.classify_strategy(&regional);
                RegionalStrategy {
                    competitor: name.clone(),
                    regions_count: regional.len(),
                    avg_price: mean(&regional),
                    price_std: if regional.len() > 1 { std_dev(&regional) } else { 0.0 },
                    coefficient_of_variation: cv,
                    min_regional_price: min(&regional),
                    max_regional_price: max(&regional),
                    strategy,
                }
            })
            .collect();

        let total_regions = distinct(&records.iter().collect::<Vec<_>>(), |r| &r.region);
        debug!(competitors = by_competitor.len(), regions = total_regions, "competitor pricing analysis");

        Ok(PricingAnalysis {
            competitor_statistics,
            overall_leaders,
            regional_leaders,
            positioning,
            strategies,
            total_competitors: by_competitor.len(),
            total_regions,
        })
    }

    /// Global and per-region shares with HHI concentration.
    pub fn analyze_market_share(&self, records: &[CompetitorRecord]) -> Result<MarketShareAnalysis> {
        validate(records)?;
        let overall = shares(&records.iter().collect::<Vec<_>>());
        let hhi = herfindahl_index(&overall.iter().map(|s| s.share_pct).collect::<Vec<_>>());

        let mut regional = Vec::new();
        for (region, recs) in group(records, |r| &r.region) {
            let total_sales: f64 = recs.iter().map(|r| r.sales).sum();
            if total_sales <= 0.0 {
                continue;
            }
            let region_shares = shares(&recs);
            let region_hhi = herfindahl_index(&region_shares.iter().map(|s| s.share_pct).collect::<Vec<_>>());
            let Some(top) = region_shares.first() else {
                continue;
            };
            regional.push(RegionalMarketShare {
                region,
                total_sales,
                leader: top.competitor.clone(),
                leader_share_pct: top.share_pct,
                hhi: region_hhi,
                concentration: Concentration::from_hhi(region_hhi),
                shares: region_shares,
            });
        }

        debug!(hhi, competitors = overall.len(), "market share analysis");
        Ok(MarketShareAnalysis {
            total_competitors: overall.len(),
            overall,
            regional,
            hhi,
            concentration: Concentration::from_hhi(hhi),
        })
    }

    /// Per-competitor regional prices, presence and global share.
    pub fn profiles(&self, records: &[CompetitorRecord]) -> Result<Vec<CompetitorProfile>> {
        validate(records)?;
        let global = shares(&records.iter().collect::<Vec<_>>());
        Ok(group(records, |r| &r.competitor)
            .into_iter()
            .map(|(name, recs)| {
                let regional_prices: BTreeMap<String, f64> = group(&recs, |r| &r.region)
                    .into_iter()
                    .map(|(region, rs)| (region, mean(&rs.iter().map(|r| r.price).collect::<Vec<_>>())))
                    .collect();
                let market_share_pct = global
                    .iter()
                    .find(|s| s.competitor == name)
                    .map_or(0.0, |s| s.share_pct);
                CompetitorProfile {
                    competitor: name,
                    presence_count: regional_prices.len(),
                    regional_prices,
                    market_share_pct,
                }
            })
            .collect())
    }

    /// Price leaders sit below 95% of the market average price; quality and
    /// availability leaders above 105% of the market average score.
    pub fn competitive_advantages(&self, records: &[CompetitorRecord]) -> Result<Vec<CompetitiveAdvantages>> {
        validate(records)?;
        let metric = |recs: &[&CompetitorRecord], f: fn(&CompetitorRecord) -> Option<f64>| {
            let values: Vec<f64> = recs.iter().filter_map(|r| f(r)).filter(|v| v.is_finite()).collect();
            (!values.is_empty()).then(|| mean(&values))
        };
        let all: Vec<&CompetitorRecord> = records.iter().collect();

        let checks: [(AdvantageKind, fn(&CompetitorRecord) -> Option<f64>, bool); 3] = [
            (AdvantageKind::PriceLeader, |r| Some(r.price), true),
            (AdvantageKind::QualityLeader, |r| r.quality_score, false),
            (AdvantageKind::AvailabilityLeader, |r| r.availability_score, false),
        ];

        Ok(group(records, |r| &r.competitor)
            .into_iter()
            .map(|(competitor, recs)| {
                let advantages = checks
                    .iter()
                    .filter_map(|&(kind, f, lower_is_better)| {
                        let market_avg = metric(&all[..], f)?;
                        let value = metric(&recs[..], f)?;
                        let leads = if lower_is_better {
                            value < market_avg * 0.95
                        } else {
                            value > market_avg * 1.05
                        };
                        (leads && market_avg != 0.0).then(|| Advantage {
                            kind,
                            value,
                            market_avg,
                            difference_pct: (value - market_avg) / market_avg * 100.0,
                        })
                    })
                    .collect();
                CompetitiveAdvantages {
                    competitor,
                    advantages,
                }
            })
            .collect())
    }
}

fn validate(records: &[CompetitorRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(AnalyticsError::EmptyData);
    }
    if records.iter().any(|r| !r.price.is_finite() || !r.sales.is_finite()) {
        return Err(AnalyticsError::MissingValues);
    }
    if let Some(r) = records.iter().find(|r| r.price < 0.0 || r.sales < 0.0) {
        return Err(AnalyticsError::InvalidParameter(format!(
            "negative price or sales for {} in {}",
            r.competitor, r.region
        )));
    }
    Ok(())
}

fn group<'a, R>(records: &'a [R], key: impl Fn(&CompetitorRecord) -> &String) -> BTreeMap<String, Vec<&'a CompetitorRecord>>
where
    R: Borrow<CompetitorRecord>,
{
    let mut groups: BTreeMap<String, Vec<&CompetitorRecord>> = BTreeMap::new();
    for r in records {
        let r: &CompetitorRecord = Borrow::borrow(r);
        groups.entry(key(r).clone()).or_default().push(r);
    }
    groups
}

fn distinct(records: &[&CompetitorRecord], key: impl Fn(&CompetitorRecord) -> &String) -> usize {
    records.iter().map(|r| key(r)).collect::<BTreeSet<_>>().len()
}

/// Average price per competitor, keyed by name.
fn average_prices<R: Borrow<CompetitorRecord>>(records: &[R]) -> BTreeMap<String, f64> {
    group(records, |r| &r.competitor)
        .into_iter()
        .map(|(name, recs)| (name, mean(&recs.iter().map(|r| r.price).collect::<Vec<_>>())))
        .collect()
}

/// Min and max average price; ties go to the alphabetically first name.
fn leaders(averages: &BTreeMap<String, f64>) -> Result<PriceLeaders> {
    let mut iter = averages.iter();
    let (first_name, &first) = iter.next().ok_or(AnalyticsError::EmptyData)?;
    let (mut low, mut high) = ((first_name, first), (first_name, first));
    for (name, &avg) in iter {
        if avg < low.1 {
            low = (name, avg);
        }
        if avg > high.1 {
            high = (name, avg);
        }
    }
    Ok(PriceLeaders {
        lowest_price_competitor: low.0.clone(),
        lowest_avg_price: low.1,
        highest_price_competitor: high.0.clone(),
        highest_avg_price: high.1,
        price_spread: high.1 - low.1,
    })
}

/// Shares of total sales, largest first; all zero when nothing sold.
fn shares(records: &[&CompetitorRecord]) -> Vec<MarketShare> {
    let total: f64 = records.iter().map(|r| r.sales).sum();
    let mut out: Vec<MarketShare> = group(records, |r| &r.competitor)
        .into_iter()
        .map(|(competitor, recs)| {
            let sales: f64 = recs.iter().map(|r| r.sales).sum();
            MarketShare {
                competitor,
                sales,
                share_pct: if total > 0.0 { sales / total * 100.0 } else { 0.0 },
            }
        })
        .collect();
    out.sort_by(|a, b| b.share_pct.total_cmp(&a.share_pct));
    out
}
