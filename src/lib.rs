//! `rill_sql` — an embeddable, streaming SQL query engine (spec §1): lex
//! → parse → validate → plan (with pushdown) → pull-based async
//! tri-valued execution over caller-supplied `DataSource`s. See
//! `DESIGN.md` in the repository root for how each module is grounded.
//!
//! The pipeline mirrors the five public entry points below: `parse_sql`
//! and `query_plan` are pure; `estimate_cost` is a separate advisory
//! surface over a table statistics map; `execute_sql` drives the whole
//! pipeline and returns the row stream directly; `collect` drains it.

pub mod config;
pub mod error;
pub mod eval;
pub mod exec;
pub mod lexer;
pub mod parser;
pub mod planner;
pub mod row;
pub mod source;
pub mod validator;
pub mod value;

use config::EngineConfig;
use error::{ExecutorError, ParseError};
use eval::UdfRegistry;
use exec::{BoxedExecutor, CancelSignal, ExecutionContext, TableProvider};
use futures::stream::{self, StreamExt};
use futures::TryStreamExt;
use parser::ast::SelectStatement;
use planner::cost::TableStatistics;
use planner::LogicalPlan;
use row::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use validator::FunctionRegistry;

/// Parses `query` into a `SelectStatement` (spec §6.1 `parseSql`) — parse
/// only, no semantic validation.
#[instrument(skip_all, fields(len = query.len()))]
pub fn parse_sql(query: &str) -> Result<SelectStatement, ParseError> {
    let result = parser::parse_sql(query);
    match &result {
        Ok(stmt) => debug!(columns = stmt.columns.len(), joins = stmt.joins.len(), "parsed statement"),
        Err(e) => debug!(%e, "parse failed"),
    }
    result
}

/// Lowers an already-parsed statement into its `LogicalPlan` (spec §6.1
/// `queryPlan`). Pure and independent of any table/function environment.
#[instrument(skip_all)]
pub fn query_plan(stmt: &SelectStatement) -> LogicalPlan {
    let plan = planner::plan(stmt);
    debug!(?plan, "built logical plan");
    plan
}

/// Advisory byte-cost estimate over a query and a per-table statistics map
/// (spec §6.1 `estimateCost`); `None` ("undefined") when any table
/// participating directly in `FROM`/`JOIN` is missing from `tables`.
pub fn estimate_cost(stmt: &SelectStatement, tables: &HashMap<String, TableStatistics>) -> Option<f64> {
    planner::cost::estimate_cost(stmt, tables)
}

/// Everything `execute_sql` needs beyond the query text itself. Every
/// field but `tables` defaults, matching spec §6.1's `functions?`/
/// `signal?` optionality — construct with `ExecuteSqlOptions::new` and
/// override only what the caller actually has.
pub struct ExecuteSqlOptions {
    pub tables: Arc<dyn TableProvider>,
    pub functions: FunctionRegistry,
    pub udfs: Arc<UdfRegistry>,
    pub config: Arc<EngineConfig>,
    pub signal: CancelSignal,
}

impl ExecuteSqlOptions {
    pub fn new(tables: Arc<dyn TableProvider>) -> Self {
        ExecuteSqlOptions {
            tables,
            functions: FunctionRegistry::empty(),
            udfs: Arc::new(UdfRegistry::new()),
            config: Arc::new(EngineConfig::default()),
            signal: CancelSignal::inert(),
        }
    }
}

/// Parses, validates, plans, and executes `query` in one call (spec §6.1
/// `executeSql`), returning the asynchronous row sequence directly — a
/// parse or validation failure is reported as the stream's sole item
/// rather than a separate `Result`, so callers always drive the same
/// shape regardless of where a query fails.
#[instrument(skip_all, fields(len = query.len()))]
pub fn execute_sql(query: &str, options: ExecuteSqlOptions) -> BoxedExecutor {
    let stmt = match parser::parse_sql(query) {
        Ok(stmt) => stmt,
        Err(e) => {
            debug!(%e, "execute_sql: parse failed");
            return error_stream(e.into());
        }
    };
    if let Err(e) = validator::validate(&stmt, &options.functions) {
        debug!(%e, "execute_sql: validation failed");
        return error_stream(e.into());
    }

    let plan = planner::plan(&stmt);
    debug!(?plan, "execute_sql: dispatching plan");
    let ctx = ExecutionContext {
        tables: options.tables,
        udfs: options.udfs,
        config: options.config,
        signal: options.signal,
    };
    exec::execute(&plan, ctx)
}

fn error_stream(err: ExecutorError) -> BoxedExecutor {
    stream::once(async move { Err(err) }).boxed()
}

/// Drains an executed row sequence into a `Vec` (spec §6.1 `collect`).
pub async fn collect(seq: BoxedExecutor) -> Result<Vec<Row>, ExecutorError> {
    seq.try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use source::memory::InMemoryTable;
    use source::DataSource;
    use value::DataValue;

    fn users_table() -> Arc<dyn TableProvider> {
        let mut rows = Vec::new();
        for (id, name, age) in [(1, "Alice", 30.0), (2, "Bob", 17.0)] {
            let mut row = Row::new();
            row.push("id", DataValue::Number(id as f64));
            row.push("name", DataValue::String(name.to_string()));
            row.push("age", DataValue::Number(age));
            rows.push(row);
        }
        let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
        tables.insert("users".to_string(), Arc::new(InMemoryTable::new(rows)));
        Arc::new(tables)
    }

    #[tokio::test]
    async fn execute_sql_runs_the_whole_pipeline() {
        let options = ExecuteSqlOptions::new(users_table());
        let rows = collect(execute_sql("SELECT name FROM users WHERE age >= 18", options))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&DataValue::String("Alice".to_string())));
    }

    #[tokio::test]
    async fn execute_sql_reports_parse_errors_through_the_stream() {
        let options = ExecuteSqlOptions::new(users_table());
        let err = collect(execute_sql("SELECT FROM", options)).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Parse(_)));
    }

    #[tokio::test]
    async fn execute_sql_reports_unknown_function_as_semantic_error() {
        let options = ExecuteSqlOptions::new(users_table());
        let err = collect(execute_sql("SELECT NOPE(name) FROM users", options))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Semantic(_)));
    }

    #[test]
    fn query_plan_is_pure_and_independent_of_tables() {
        let stmt = parse_sql("SELECT name FROM users WHERE age >= 18").unwrap();
        let plan = query_plan(&stmt);
        assert!(matches!(plan, LogicalPlan::Project { .. } | LogicalPlan::Scan { .. } | LogicalPlan::Filter { .. }));
    }

    #[test]
    fn estimate_cost_is_undefined_without_statistics() {
        let stmt = parse_sql("SELECT name FROM users").unwrap();
        assert_eq!(estimate_cost(&stmt, &HashMap::new()), None);
    }
}
