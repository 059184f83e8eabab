//! Injectable data-source boundary (spec.md §4.8): the engine's only
//! dependency on where rows actually live. `exec::scan` calls
//! `DataSource::scan` and trusts the returned `applied_*` flags
//! all-or-nothing (spec.md §6.3) rather than re-checking row contents.

pub mod memory;
pub mod parquet_filter;

use crate::error::ExecutorError;
use crate::planner::ScanHints;
use crate::row::Row;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type RowStream<'a> = BoxStream<'a, Result<Row, ExecutorError>>;

/// `scan(hints) -> { rows, appliedWhere, appliedLimitOffset, appliedColumns }`
/// (spec.md §4.8). A source that honours a hint MUST apply it to every
/// row it yields and report the flag true; otherwise the flag must be
/// false and the hint left for `exec::scan` to apply itself. There is no
/// partial-credit state (spec.md §6.3).
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn scan(&self, hints: &ScanHints) -> Result<ScanResult, ExecutorError>;
}

pub struct ScanResult {
    pub rows: RowStream<'static>,
    pub applied_where: bool,
    pub applied_limit_offset: bool,
    pub applied_columns: bool,
}

/// Row-level access used by adapters that don't already hold a `Row`
/// (spec.md §4.8 `RowAccessor`); `Row` itself satisfies this trivially.
pub trait RowAccessor {
    fn get_cell(&self, name: &str) -> Option<&crate::value::DataValue>;
    fn keys(&self) -> Vec<&str>;
}

impl RowAccessor for Row {
    fn get_cell(&self, name: &str) -> Option<&crate::value::DataValue> {
        self.get(name)
    }

    fn keys(&self) -> Vec<&str> {
        self.column_names().collect()
    }
}
