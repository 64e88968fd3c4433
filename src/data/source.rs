//! Data source seam and a bounded fetch helper.

use super::query::{DataQuery, EntityKind};
use super::table::{CellValue, DataTable};
use crate::error::{AnalyticsError, Result};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Read-only provider of flat tables.
pub trait DataSource: Send + Sync {
    /// Run one query. Implementations do not retry.
    fn fetch(&self, query: &DataQuery) -> Result<DataTable>;
}

impl<S: DataSource + ?Sized> DataSource for Arc<S> {
    fn fetch(&self, query: &DataQuery) -> Result<DataTable> {
        (**self).fetch(query)
    }
}

/// Run `source.fetch` on a worker thread, giving up after `timeout`.
///
/// Both a timeout and a source failure surface as
/// [`AnalyticsError::DataUnavailable`]. A timed-out worker is left to finish
/// on its own; its result is discarded.
pub fn fetch_with_timeout(
    source: Arc<dyn DataSource>,
    query: &DataQuery,
    timeout: Duration,
) -> Result<DataTable> {
    let (tx, rx) = mpsc::channel();
    let worker_query = query.clone();
    thread::Builder::new()
        .name("data-fetch".to_string())
        .spawn(move || {
            // receiver may already be gone after a timeout
            let _ = tx.send(source.fetch(&worker_query));
        })
        .map_err(|e| AnalyticsError::DataUnavailable(format!("failed to spawn fetch worker: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(table)) => {
            debug!(entity = %query.entity, rows = table.len(), "fetched table");
            Ok(table)
        }
        Ok(Err(AnalyticsError::DataUnavailable(msg))) => Err(AnalyticsError::DataUnavailable(msg)),
        Ok(Err(e)) => {
            warn!(entity = %query.entity, error = %e, "data source failed");
            Err(AnalyticsError::DataUnavailable(e.to_string()))
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(entity = %query.entity, timeout_ms = timeout.as_millis() as u64, "data fetch timed out");
            Err(AnalyticsError::DataUnavailable(format!(
                "{} query timed out after {:?}",
                query.entity, timeout
            )))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AnalyticsError::DataUnavailable(format!(
            "{} query worker exited without a result",
            query.entity
        ))),
    }
}

/// In-memory source holding one table per entity.
///
/// Applies the region, product, category, competitor and date filters to
/// columns of those names when present, then the row limit. Every query is
/// recorded and can be inspected with [`StaticSource::queries`].
#[derive(Debug, Default)]
pub struct StaticSource {
    tables: BTreeMap<EntityKind, DataTable>,
    log: Mutex<Vec<DataQuery>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, entity: EntityKind, table: DataTable) -> Self {
        self.tables.insert(entity, table);
        self
    }

    /// Queries received so far, oldest first.
    pub fn queries(&self) -> Vec<DataQuery> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

fn text_matches(columns: &[String], row: &[CellValue], column: &str, wanted: &str) -> bool {
    match columns.iter().position(|c| c == column) {
        Some(i) => row[i].as_text().is_some_and(|v| v.eq_ignore_ascii_case(wanted)),
        None => true,
    }
}

impl DataSource for StaticSource {
    fn fetch(&self, query: &DataQuery) -> Result<DataTable> {
        if let Ok(mut log) = self.log.lock() {
            log.push(query.clone());
        }

        let mut table = self
            .tables
            .get(&query.entity)
            .cloned()
            .ok_or_else(|| AnalyticsError::DataUnavailable(format!("no {} table loaded", query.entity)))?;

        let f = &query.filters;
        table.retain_rows(
            |columns, row| {
                let date_ok = match columns.iter().position(|c| c == "date") {
                    Some(i) => row[i].as_date().map_or(true, |d| f.contains_date(d)),
                    None => true,
                };
                let product_ok = f.product_ids.is_empty()
                    || match columns.iter().position(|c| c == "product_id") {
                        Some(i) => row[i]
                            .as_text()
                            .is_some_and(|p| f.product_ids.iter().any(|id| *id == p)),
                        None => true,
                    };
                date_ok
                    && product_ok
                    && f.region.as_deref().map_or(true, |r| text_matches(columns, row, "region", r))
                    && f.category.as_deref().map_or(true, |c| text_matches(columns, row, "category", c))
                    && f
                        .competitor
                        .as_deref()
                        .map_or(true, |c| text_matches(columns, row, "competitor", c))
            },
            query.limit,
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::QueryFilters;
    use chrono::NaiveDate;

    struct SlowSource(Duration);

    impl DataSource for SlowSource {
        fn fetch(&self, _query: &DataQuery) -> Result<DataTable> {
            thread::sleep(self.0);
            Ok(DataTable::default())
        }
    }

    struct BrokenSource;

    impl DataSource for BrokenSource {
        fn fetch(&self, _query: &DataQuery) -> Result<DataTable> {
            Err(AnalyticsError::ComputationError("connection reset".to_string()))
        }
    }

    fn sales_table() -> DataTable {
        let rows = vec![
            vec!["2024-01-01".into(), "NA".into(), CellValue::Number(1.0)],
            vec!["2024-01-02".into(), "EU".into(), CellValue::Number(2.0)],
            vec!["2024-01-03".into(), "NA".into(), CellValue::Number(3.0)],
        ];
        DataTable::new(vec!["date".into(), "region".into(), "total_sales".into()], rows).unwrap()
    }

    #[test]
    fn timeout_becomes_data_unavailable() {
        let source: Arc<dyn DataSource> = Arc::new(SlowSource(Duration::from_millis(500)));
        let err = fetch_with_timeout(source, &DataQuery::new(EntityKind::Sales), Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err.kind(), "data_unavailable");
    }

    #[test]
    fn source_failure_becomes_data_unavailable() {
        let source: Arc<dyn DataSource> = Arc::new(BrokenSource);
        let err = fetch_with_timeout(source, &DataQuery::new(EntityKind::Sales), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable(ref m) if m.contains("connection reset")));
    }

    #[test]
    fn fast_fetch_returns_table() {
        let source: Arc<dyn DataSource> = Arc::new(StaticSource::new().with_table(EntityKind::Sales, sales_table()));
        let table = fetch_with_timeout(source, &DataQuery::new(EntityKind::Sales), Duration::from_secs(5)).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn static_source_filters_and_limits() {
        let source = StaticSource::new().with_table(EntityKind::Sales, sales_table());
        let filters = QueryFilters::default()
            .with_region("na")
            .with_date_range(NaiveDate::from_ymd_opt(2024, 1, 2), None);
        let table = source
            .fetch(&DataQuery::new(EntityKind::Sales).with_filters(filters))
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.numbers("total_sales").unwrap(), vec![Some(3.0)]);

        let limited = source.fetch(&DataQuery::new(EntityKind::Sales).with_limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(source.queries().len(), 2);
    }

    #[test]
    fn missing_entity_is_unavailable() {
        let err = StaticSource::new()
            .fetch(&DataQuery::new(EntityKind::Competitors))
            .unwrap_err();
        assert_eq!(err.kind(), "data_unavailable");
    }
}
