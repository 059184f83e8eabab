//! Checks the quantified invariant of spec §8: for any plan produced by
//! the planner, evaluating it yields the same multiset of rows as
//! evaluating a naive Scan→Filter→Project→Sort plan built by hand with no
//! pushdown into the scan hints at all.

use futures::TryStreamExt;
use rill_sql::config::EngineConfig;
use rill_sql::eval::UdfRegistry;
use rill_sql::exec::{execute, CancelSignal, ExecutionContext, TableProvider};
use rill_sql::planner::{LogicalPlan, ProjectColumn, ScanHints};
use rill_sql::row::Row;
use rill_sql::source::memory::InMemoryTable;
use rill_sql::source::DataSource;
use rill_sql::value::DataValue;
use std::collections::HashMap;
use std::sync::Arc;

fn ctx_with_table(name: &str, rows: Vec<Row>) -> ExecutionContext {
    let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
    tables.insert(name.to_string(), Arc::new(InMemoryTable::new(rows)));
    ExecutionContext {
        tables: Arc::new(tables),
        udfs: Arc::new(UdfRegistry::new()),
        config: Arc::new(EngineConfig::default()),
        signal: CancelSignal::inert(),
    }
}

fn users_rows() -> Vec<Row> {
    let mut rows = Vec::new();
    for (id, name, age) in [(1, "Alice", 30.0), (2, "Bob", 25.0), (3, "Charlie", 35.0), (4, "Dee", 40.0)] {
        let mut row = Row::new();
        row.push("id", DataValue::Number(id as f64));
        row.push("name", DataValue::String(name.to_string()));
        row.push("age", DataValue::Number(age));
        rows.push(row);
    }
    rows
}

/// A row fingerprint independent of column order, for multiset comparison.
fn row_signature(row: &Row) -> String {
    let mut parts: Vec<String> = row
        .iter()
        .map(|(name, value)| format!("{name}={value:?}"))
        .collect();
    parts.sort();
    parts.join("|")
}

fn multiset(rows: &[Row]) -> Vec<String> {
    let mut sigs: Vec<String> = rows.iter().map(row_signature).collect();
    sigs.sort();
    sigs
}

#[tokio::test]
async fn filter_project_sort_pushdown_is_meaning_preserving() {
    let stmt = rill_sql::parse_sql("SELECT name, age FROM users WHERE age > 26 ORDER BY age DESC").unwrap();

    let optimized = rill_sql::query_plan(&stmt);
    let optimized_rows: Vec<Row> = execute(&optimized, ctx_with_table("users", users_rows()))
        .try_collect()
        .await
        .unwrap();

    // Hand-built naive plan: a bare Scan (no hints at all), Filter, Project,
    // then Sort — nothing pushed down anywhere.
    let naive = LogicalPlan::Sort {
        order_by: stmt.order_by.clone(),
        aliases: HashMap::new(),
        child: Box::new(LogicalPlan::Project {
            columns: vec![
                ProjectColumn::Expr {
                    expr: rill_sql::parser::ast::Expr::Identifier {
                        name: "name".to_string(),
                        position_start: 0,
                        position_end: 0,
                    },
                    output_name: "name".to_string(),
                },
                ProjectColumn::Expr {
                    expr: rill_sql::parser::ast::Expr::Identifier {
                        name: "age".to_string(),
                        position_start: 0,
                        position_end: 0,
                    },
                    output_name: "age".to_string(),
                },
            ],
            child: Box::new(LogicalPlan::Filter {
                condition: stmt.where_clause.clone().unwrap(),
                child: Box::new(LogicalPlan::Scan {
                    table: "users".to_string(),
                    alias: None,
                    hints: ScanHints::default(),
                }),
            }),
        }),
    };
    let naive_rows: Vec<Row> = execute(&naive, ctx_with_table("users", users_rows()))
        .try_collect()
        .await
        .unwrap();

    assert!(!optimized_rows.is_empty());
    assert_eq!(multiset(&optimized_rows), multiset(&naive_rows));
}

#[tokio::test]
async fn limit_offset_pushdown_is_meaning_preserving() {
    let stmt = rill_sql::parse_sql("SELECT name FROM users ORDER BY age LIMIT 2 OFFSET 1").unwrap();

    let optimized = rill_sql::query_plan(&stmt);
    let optimized_rows: Vec<Row> = execute(&optimized, ctx_with_table("users", users_rows()))
        .try_collect()
        .await
        .unwrap();

    let naive = LogicalPlan::Limit {
        limit: stmt.limit,
        offset: stmt.offset,
        child: Box::new(LogicalPlan::Project {
            columns: vec![ProjectColumn::Expr {
                expr: rill_sql::parser::ast::Expr::Identifier {
                    name: "name".to_string(),
                    position_start: 0,
                    position_end: 0,
                },
                output_name: "name".to_string(),
            }],
            child: Box::new(LogicalPlan::Sort {
                order_by: stmt.order_by.clone(),
                aliases: HashMap::new(),
                child: Box::new(LogicalPlan::Scan {
                    table: "users".to_string(),
                    alias: None,
                    hints: ScanHints::default(),
                }),
            }),
        }),
    };
    let naive_rows: Vec<Row> = execute(&naive, ctx_with_table("users", users_rows()))
        .try_collect()
        .await
        .unwrap();

    // LIMIT/OFFSET is order-sensitive, not a multiset property — compare
    // directly in sequence.
    let optimized_names: Vec<_> = optimized_rows.iter().map(|r| r.get("name").cloned()).collect();
    let naive_names: Vec<_> = naive_rows.iter().map(|r| r.get("name").cloned()).collect();
    assert_eq!(optimized_names, naive_names);
    assert_eq!(optimized_names.len(), 2);
}
