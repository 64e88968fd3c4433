//! Read-only query descriptions sent to a [`DataSource`](super::DataSource).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default row cap for a single query.
pub const DEFAULT_ROW_LIMIT: usize = 10_000;

/// What kind of rows a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Daily aggregated sales metrics (`date` plus one column per metric).
    Sales,
    /// Product prices per region and currency.
    RegionalPrices,
    /// Competitor prices and sales per region.
    Competitors,
    /// Per-region market indicators for opportunity scoring.
    MarketIndicators,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Sales => "sales",
            EntityKind::RegionalPrices => "regional_prices",
            EntityKind::Competitors => "competitors",
            EntityKind::MarketIndicators => "market_indicators",
        })
    }
}

/// Row filters; `None` and empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    /// Inclusive lower date bound.
    pub start: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub end: Option<NaiveDate>,
    pub product_ids: Vec<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub competitor: Option<String>,
}

impl QueryFilters {
    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_product_ids(mut self, ids: Vec<String>) -> Self {
        self.product_ids = ids;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Whether `date` falls inside the configured range.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// A single read-only request for a flat table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuery {
    pub entity: EntityKind,
    #[serde(default)]
    pub filters: QueryFilters,
    pub limit: usize,
}

impl DataQuery {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            filters: QueryFilters::default(),
            limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}
