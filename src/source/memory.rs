//! In-memory table adapter (spec.md §6 "the in-memory arrays"): the
//! reference `DataSource` implementation, grounded on the teacher's own
//! `Storage`-backed in-memory catalog tables but narrowed to the plain
//! `scan(hints) -> rows` contract of spec.md §4.8 rather than a full
//! transactional storage engine.

use super::{DataSource, RowStream, ScanResult};
use crate::config::EngineConfig;
use crate::error::ExecutorError;
use crate::eval::{self, EvalContext, SubqueryRunner, UdfRegistry};
use crate::parser::ast::SelectStatement;
use crate::planner::ScanHints;
use crate::row::Row;
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::sync::Arc;

struct NoSubqueries;

#[async_trait]
impl SubqueryRunner for NoSubqueries {
    async fn run(&self, _stmt: &SelectStatement) -> Result<Vec<Row>, ExecutorError> {
        Ok(Vec::new())
    }
}

/// Holds a fixed `Vec<Row>` and applies every scan hint fully (columns,
/// WHERE, LIMIT/OFFSET), always reporting `applied_* = true` — it never
/// needs `exec::scan`'s fallback-Filter/Limit path.
pub struct InMemoryTable {
    rows: Vec<Row>,
    udfs: Arc<UdfRegistry>,
    config: Arc<EngineConfig>,
}

impl InMemoryTable {
    pub fn new(rows: Vec<Row>) -> Self {
        InMemoryTable {
            rows,
            udfs: Arc::new(UdfRegistry::new()),
            config: Arc::new(EngineConfig::default()),
        }
    }

    pub fn with_udfs(rows: Vec<Row>, udfs: UdfRegistry, config: EngineConfig) -> Self {
        InMemoryTable {
            rows,
            udfs: Arc::new(udfs),
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl DataSource for InMemoryTable {
    async fn scan(&self, hints: &ScanHints) -> Result<ScanResult, ExecutorError> {
        let mut matched = Vec::with_capacity(self.rows.len());
        let runner = NoSubqueries;
        for row in &self.rows {
            if let Some(predicate) = &hints.where_clause {
                let ctx = EvalContext {
                    row,
                    udfs: &self.udfs,
                    subqueries: &runner,
                    config: &self.config,
                };
                if !eval::evaluate_predicate(predicate, &ctx).await?.is_true() {
                    continue;
                }
            }
            matched.push(project_columns(row, hints.columns.as_deref()));
        }

        let offset = hints.offset.unwrap_or(0) as usize;
        let windowed: Vec<Row> = match hints.limit {
            Some(limit) => matched.into_iter().skip(offset).take(limit as usize).collect(),
            None if offset > 0 => matched.into_iter().skip(offset).collect(),
            None => matched,
        };

        let rows: RowStream<'static> = stream::iter(windowed.into_iter().map(Ok)).boxed();
        Ok(ScanResult {
            rows,
            applied_where: true,
            applied_limit_offset: true,
            applied_columns: true,
        })
    }
}

fn project_columns(row: &Row, columns: Option<&[String]>) -> Row {
    match columns {
        None => row.clone(),
        Some(wanted) => wanted
            .iter()
            .filter_map(|name| row.get(name).map(|v| (name.clone(), v.clone())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataValue;

    fn sample_rows() -> Vec<Row> {
        let mut rows = Vec::new();
        for (id, name, age) in [(1, "Alice", 30.0), (2, "Bob", 25.0), (3, "Charlie", 35.0)] {
            let mut row = Row::new();
            row.push("id", DataValue::Number(id as f64));
            row.push("name", DataValue::String(name.to_string()));
            row.push("age", DataValue::Number(age));
            rows.push(row);
        }
        rows
    }

    #[tokio::test]
    async fn applies_where_and_reports_applied_flags() {
        let table = InMemoryTable::new(sample_rows());
        let stmt = crate::parser::parse_sql("SELECT * FROM t WHERE age > 28").unwrap();
        let hints = ScanHints {
            where_clause: stmt.where_clause,
            ..Default::default()
        };
        let result = table.scan(&hints).await.unwrap();
        assert!(result.applied_where);
        let rows: Vec<Row> = result.rows.map(|r| r.unwrap()).collect().await;
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn applies_limit_offset() {
        let table = InMemoryTable::new(sample_rows());
        let hints = ScanHints {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        };
        let result = table.scan(&hints).await.unwrap();
        let rows: Vec<Row> = result.rows.map(|r| r.unwrap()).collect().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&DataValue::String("Bob".to_string())));
    }

    #[tokio::test]
    async fn applies_column_pruning() {
        let table = InMemoryTable::new(sample_rows());
        let hints = ScanHints {
            columns: Some(vec!["name".to_string()]),
            ..Default::default()
        };
        let result = table.scan(&hints).await.unwrap();
        let rows: Vec<Row> = result.rows.map(|r| r.unwrap()).collect().await;
        assert_eq!(rows[0].len(), 1);
    }
}
