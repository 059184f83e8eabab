//! Distinct operator (spec.md §4.7): materialises the stream and emits
//! each distinct output row once, preserving first-seen order.

use crate::error::ExecutorError;
use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext};
use crate::row::Row;
use futures_async_stream::try_stream;
use std::collections::HashSet;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn distinct(input: BoxedExecutor, ctx: ExecutionContext) {
    let mut seen: HashSet<String> = HashSet::new();

    #[for_await]
    for row in input {
        check_cancelled(&ctx.signal)?;
        let row = row?;
        let signature = row_signature(&row);
        if seen.insert(signature) {
            yield row;
        }
    }
}

/// A stable per-row fingerprint keyed by column name and canonical
/// per-cell value, reusing `DataValue::group_key` so NULL, bigint, and
/// array cells are distinguished the same way `HashAggregate` groups them.
fn row_signature(row: &Row) -> String {
    row.iter()
        .map(|(name, value)| format!("{name}={}", value.group_key()))
        .collect::<Vec<_>>()
        .join("\u{1}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::eval::UdfRegistry;
    use crate::exec::CancelSignal;
    use crate::source::memory::InMemoryTable;
    use crate::source::DataSource;
    use crate::value::DataValue;
    use futures::TryStreamExt;
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

    #[tokio::test]
    async fn duplicate_rows_collapse_preserving_first_seen_order() {
        let mut rows = Vec::new();
        for city in ["NYC", "LA", "NYC"] {
            let mut row = Row::new();
            row.push("city", DataValue::String(city.to_string()));
            rows.push(row);
        }
        let ctx = ctx_with_table("t", rows);
        let stmt = crate::parser::parse_sql("SELECT DISTINCT city FROM t").unwrap();
        let plan = crate::planner::plan(&stmt);
        let out: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        let cities: Vec<_> = out.iter().map(|r| r.get("city").cloned().unwrap()).collect();
        assert_eq!(
            cities,
            vec![DataValue::String("NYC".to_string()), DataValue::String("LA".to_string())]
        );
    }
}
