//! Flat tables returned by data sources and their typed views.

use crate::core::TimeSeries;
use crate::error::{AnalyticsError, Result};
use crate::market::{CompetitorRecord, PriceRecord, RegionIndicators};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A single cell. Upstream engines often deliver numbers as text, so
/// numeric accessors parse text cells too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Null => None,
            CellValue::Number(x) => Some(*x),
            CellValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Number(x) => Some(x.to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }

    /// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub fn as_date(&self) -> Option<NaiveDate> {
        let CellValue::Text(s) = self else {
            return None;
        };
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Number(x)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Null, Into::into)
    }
}

/// Named columns over rows of equal width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable", into = "RawTable")]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

/// Wire form of [`DataTable`]; width is checked on the way in.
#[derive(Serialize, Deserialize)]
struct RawTable {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<CellValue>>,
}

impl TryFrom<RawTable> for DataTable {
    type Error = AnalyticsError;

    fn try_from(raw: RawTable) -> Result<Self> {
        Self::new(raw.columns, raw.rows)
    }
}

impl From<DataTable> for RawTable {
    fn from(table: DataTable) -> Self {
        Self {
            columns: table.columns,
            rows: table.rows,
        }
    }
}

impl DataTable {
    /// Build a table; every row must have one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(AnalyticsError::DimensionMismatch {
                expected: columns.len(),
                got: bad.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalyticsError::MissingColumn(name.to_string()))
    }

    /// First of `names` present in the table.
    fn first_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.column_index(n).ok())
    }

    pub fn cell(&self, row: usize, column: &str) -> Result<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows
            .get(row)
            .map(|r| &r[idx])
            .ok_or(AnalyticsError::DimensionMismatch {
                expected: self.rows.len(),
                got: row,
            })
    }

    pub fn numbers(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[idx].as_f64()).collect())
    }

    pub fn texts(&self, column: &str) -> Result<Vec<Option<String>>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[idx].as_text()).collect())
    }

    pub fn dates(&self, column: &str) -> Result<Vec<Option<NaiveDate>>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| r[idx].as_date()).collect())
    }

    /// Keep rows matching `keep`, then at most `limit` of them.
    pub(crate) fn retain_rows(&mut self, keep: impl Fn(&[String], &[CellValue]) -> bool, limit: usize) {
        let columns = &self.columns;
        self.rows.retain(|r| keep(columns, r));
        self.rows.truncate(limit);
    }

    /// Split rows by the text value of `column`; rows with a null key are dropped.
    pub fn partition_by(&self, column: &str) -> Result<BTreeMap<String, DataTable>> {
        let idx = self.column_index(column)?;
        let mut parts: BTreeMap<String, DataTable> = BTreeMap::new();
        for row in &self.rows {
            if let Some(key) = row[idx].as_text() {
                parts
                    .entry(key)
                    .or_insert_with(|| DataTable {
                        columns: self.columns.clone(),
                        rows: Vec::new(),
                    })
                    .rows
                    .push(row.clone());
            }
        }
        Ok(parts)
    }

    /// Daily series from a date column and a numeric column.
    ///
    /// Rows are sorted by date, duplicate dates are summed and rows with a
    /// missing date or value are skipped.
    pub fn to_time_series(&self, date_column: &str, value_column: &str) -> Result<TimeSeries> {
        let dates = self.dates(date_column)?;
        let values = self.numbers(value_column)?;

        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (date, value) in dates.into_iter().zip(values) {
            if let (Some(d), Some(v)) = (date, value) {
                if v.is_finite() {
                    *daily.entry(d).or_insert(0.0) += v;
                }
            }
        }
        if daily.is_empty() {
            return Err(AnalyticsError::EmptyData);
        }
        debug!(rows = self.len(), days = daily.len(), metric = value_column, "built series from table");

        let (timestamps, values): (Vec<DateTime<Utc>>, Vec<f64>) = daily
            .into_iter()
            .filter_map(|(d, v)| d.and_hms_opt(0, 0, 0).map(|n| (Utc.from_utc_datetime(&n), v)))
            .unzip();
        TimeSeries::new(timestamps, values)
    }

    /// Price rows; `region` and `price` are required, `currency` defaults to USD.
    pub fn to_price_records(&self) -> Result<Vec<PriceRecord>> {
        let region = self.column_index("region")?;
        let price = self.column_index("price")?;
        let currency = self.first_column(&["currency"]);
        let quantity = self.first_column(&["total_quantity", "quantity"]);
        let product = self.first_column(&["product_id"]);

        Ok(self
            .rows
            .iter()
            .filter_map(|row| {
                Some(PriceRecord {
                    region: row[region].as_text()?,
                    price: row[price].as_f64()?,
                    currency: currency
                        .and_then(|i| row[i].as_text())
                        .unwrap_or_else(|| "USD".to_string()),
                    quantity: quantity.and_then(|i| row[i].as_f64()).unwrap_or(0.0),
                    product_id: product.and_then(|i| row[i].as_text()),
                })
            })
            .collect())
    }

    /// One indicator set per row: every numeric column other than `region`.
    pub fn to_region_indicators(&self) -> Result<Vec<RegionIndicators>> {
        let region = self.column_index("region")?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| {
                let mut indicators = RegionIndicators::new(row[region].as_text()?);
                for (i, name) in self.columns.iter().enumerate() {
                    if i == region {
                        continue;
                    }
                    if let Some(v) = row[i].as_f64() {
                        indicators.indicators.insert(name.clone(), v);
                    }
                }
                Some(indicators)
            })
            .collect())
    }

    /// Competitor rows; `competitor`, `region` and `price` are required.
    pub fn to_competitor_records(&self) -> Result<Vec<CompetitorRecord>> {
        let competitor = self.column_index("competitor")?;
        let region = self.column_index("region")?;
        let price = self.column_index("price")?;
        let sales = self.first_column(&["sales", "sales_quantity"]);
        let product = self.first_column(&["product_id"]);
        let quality = self.first_column(&["quality_score"]);
        let availability = self.first_column(&["availability_score"]);

        Ok(self
            .rows
            .iter()
            .filter_map(|row| {
                Some(CompetitorRecord {
                    competitor: row[competitor].as_text()?,
                    region: row[region].as_text()?,
                    price: row[price].as_f64()?,
                    sales: sales.and_then(|i| row[i].as_f64()).unwrap_or(0.0),
                    product_id: product.and_then(|i| row[i].as_text()),
                    quality_score: quality.and_then(|i| row[i].as_f64()),
                    availability_score: availability.and_then(|i| row[i].as_f64()),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> DataTable {
        DataTable::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = DataTable::new(vec!["a".into(), "b".into()], vec![vec![CellValue::Number(1.0)]]).unwrap_err();
        assert_eq!(err, AnalyticsError::DimensionMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn deserialized_tables_are_width_checked() {
        let ragged = r#"{"columns":["date","total_sales"],"rows":[["2024-01-01",1.0],["2024-01-02"]]}"#;
        let err = serde_json::from_str::<DataTable>(ragged).unwrap_err();
        assert!(err.to_string().contains("dimension"), "{err}");

        let ok = r#"{"columns":["date","total_sales"],"rows":[["2024-01-01",1.0],["2024-01-02",null]]}"#;
        let parsed: DataTable = serde_json::from_str(ok).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.numbers("total_sales").unwrap(), vec![Some(1.0), None]);
        let round_trip: DataTable = serde_json::from_str(&serde_json::to_string(&parsed).unwrap()).unwrap();
        assert_eq!(round_trip, parsed);
    }

    #[test]
    fn numbers_parse_text_cells() {
        let t = table(&["x"], vec![vec!["3.5".into()], vec![CellValue::Null], vec![CellValue::Number(2.0)]]);
        assert_eq!(t.numbers("x").unwrap(), vec![Some(3.5), None, Some(2.0)]);
        assert_eq!(t.numbers("y").unwrap_err(), AnalyticsError::MissingColumn("y".to_string()));
    }

    #[test]
    fn series_sorts_and_sums_duplicates() {
        let t = table(
            &["date", "total_sales"],
            vec![
                vec!["2024-01-03".into(), CellValue::Number(5.0)],
                vec!["2024-01-01".into(), CellValue::Number(1.0)],
                vec!["2024-01-01".into(), "2".into()],
                vec!["2024-01-02".into(), CellValue::Null],
                vec!["2024-01-02T00:00:00Z".into(), CellValue::Number(4.0)],
            ],
        );
        let series = t.to_time_series("date", "total_sales").unwrap();
        assert_eq!(series.values(), &[3.0, 4.0, 5.0]);
        assert_eq!(series.timestamps()[0], Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn partition_groups_rows() {
        let t = table(
            &["region", "v"],
            vec![
                vec!["NA".into(), CellValue::Number(1.0)],
                vec!["EU".into(), CellValue::Number(2.0)],
                vec![CellValue::Null, CellValue::Number(3.0)],
                vec!["NA".into(), CellValue::Number(4.0)],
            ],
        );
        let parts = t.partition_by("region").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts["NA"].numbers("v").unwrap(), vec![Some(1.0), Some(4.0)]);
    }

    #[test]
    fn empty_series_is_an_error() {
        let t = table(&["date", "v"], vec![vec![CellValue::Null, CellValue::Number(1.0)]]);
        assert_eq!(t.to_time_series("date", "v").unwrap_err(), AnalyticsError::EmptyData);
    }

    #[test]
    fn price_records_default_currency() {
        let t = table(
            &["region", "price", "product_id"],
            vec![
                vec!["NA".into(), CellValue::Number(10.0), "P1".into()],
                vec!["EU".into(), CellValue::Null, "P1".into()],
            ],
        );
        let records = t.to_price_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].currency, "USD");
        assert_eq!(records[0].product_id.as_deref(), Some("P1"));
    }

    #[test]
    fn indicators_take_numeric_columns() {
        let t = table(
            &["region", "market_size", "note"],
            vec![vec!["APAC".into(), CellValue::Number(120.0), "fast".into()]],
        );
        let rows = t.to_region_indicators().unwrap();
        assert_eq!(rows[0].region, "APAC");
        assert_eq!(rows[0].indicators.len(), 1);
        assert_eq!(rows[0].indicators["market_size"], 120.0);
    }

    #[test]
    fn competitor_records_require_price() {
        let t = table(
            &["competitor", "region", "price", "sales_quantity"],
            vec![vec!["Acme".into(), "NA".into(), CellValue::Number(9.5), CellValue::Number(3.0)]],
        );
        let records = t.to_competitor_records().unwrap();
        assert_eq!(records[0].sales, 3.0);
        let missing = table(&["competitor", "region"], vec![]);
        assert!(missing.to_competitor_records().is_err());
    }

    #[test]
    fn cells_deserialize_untagged() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[null, 1.5, "x"]"#).unwrap();
        assert_eq!(cells, vec![CellValue::Null, CellValue::Number(1.5), CellValue::Text("x".into())]);
    }
}
