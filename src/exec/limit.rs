//! Limit operator (spec.md §4.7): drops OFFSET rows, emits LIMIT rows,
//! then ends the stream without draining the remainder of its input.

use crate::error::ExecutorError;
use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext};
use crate::row::Row;
use futures_async_stream::try_stream;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn limit(limit: Option<u64>, offset: Option<u64>, input: BoxedExecutor, ctx: ExecutionContext) {
    let offset = offset.unwrap_or(0);
    let mut skipped = 0u64;
    let mut emitted = 0u64;

    #[for_await]
    for row in input {
        check_cancelled(&ctx.signal)?;
        let row = row?;
        if skipped < offset {
            skipped += 1;
            continue;
        }
        if let Some(limit) = limit {
            if emitted >= limit {
                break;
            }
        }
        emitted += 1;
        yield row;
    }
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

    fn ctx_with_rows(n: i64) -> ExecutionContext {
        let mut rows = Vec::new();
        for i in 0..n {
            let mut row = Row::new();
            row.push("i", DataValue::Number(i as f64));
            rows.push(row);
        }
        let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
        tables.insert("t".to_string(), Arc::new(InMemoryTable::new(rows)));
        ExecutionContext {
            tables: Arc::new(tables),
            udfs: Arc::new(UdfRegistry::new()),
            config: Arc::new(EngineConfig::default()),
            signal: CancelSignal::inert(),
        }
    }

    #[tokio::test]
    async fn offset_then_limit_slices_the_stream() {
        let ctx = ctx_with_rows(10);
        let stmt = crate::parser::parse_sql("SELECT i FROM t LIMIT 3 OFFSET 5").unwrap();
        let plan = crate::planner::plan(&stmt);
        let out: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        let values: Vec<_> = out.iter().map(|r| r.get("i").unwrap().clone()).collect();
        assert_eq!(
            values,
            vec![DataValue::Number(5.0), DataValue::Number(6.0), DataValue::Number(7.0)]
        );
    }

    #[tokio::test]
    async fn limit_zero_yields_no_rows() {
        let ctx = ctx_with_rows(5);
        let stmt = crate::parser::parse_sql("SELECT i FROM t LIMIT 0").unwrap();
        let plan = crate::planner::plan(&stmt);
        let out: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        assert!(out.is_empty());
    }
}
