//! Data access: query descriptions, flat tables and the source seam.
//!
//! The engine issues exactly one [`DataQuery`] per request through a
//! [`DataSource`], bounded by [`fetch_with_timeout`].

mod query;
mod source;
mod table;

pub use query::{DataQuery, EntityKind, QueryFilters, DEFAULT_ROW_LIMIT};
pub use source::{fetch_with_timeout, DataSource, StaticSource};
pub use table::{CellValue, DataTable};
