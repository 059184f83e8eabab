//! Sort operator (spec.md §4.7): materialises the stream and sorts it by
//! the ORDER BY list, using the same comparison `compare` gives every
//! other operator extended with a NULLS FIRST/LAST placement (default
//! NULLS LAST for ASC, NULLS FIRST for DESC — spec.md §4.7); stable.
//!
//! `aliases` maps a SELECT alias to the expression it names. A sort key
//! that is a bare alias already resolves directly against the incoming
//! row when `Sort` sits above `Project` (the row already carries a column
//! under that alias); the map is only consulted as a fallback when it
//! doesn't.

use crate::error::ExecutorError;
use crate::eval::{self, EvalContext};
use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::parser::ast::{Direction, Expr, NullsOrder, OrderByItem};
use crate::row::Row;
use crate::value::DataValue;
use futures::TryStreamExt;
use futures_async_stream::try_stream;
use std::cmp::Ordering;
use std::collections::HashMap;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn sort(
    order_by: Vec<OrderByItem>,
    aliases: HashMap<String, Expr>,
    input: BoxedExecutor,
    ctx: ExecutionContext,
) {
    check_cancelled(&ctx.signal)?;
    let mut rows: Vec<Row> = input.try_collect().await?;
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };

    let mut keys: Vec<Vec<DataValue>> = Vec::with_capacity(rows.len());
    for row in &rows {
        let eval_ctx = EvalContext {
            row,
            udfs: &ctx.udfs,
            subqueries: &runner,
            config: &ctx.config,
        };
        let mut row_keys = Vec::with_capacity(order_by.len());
        for item in &order_by {
            let resolved = resolve_sort_expr(&item.expr, row, &aliases);
            row_keys.push(eval::evaluate(resolved, &eval_ctx).await?);
        }
        keys.push(row_keys);
    }

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b], &order_by));

    for idx in indices {
        yield std::mem::take(&mut rows[idx]);
    }
}

/// Falls back to the aliased expression only when the row doesn't already
/// carry a column under that name — the common "Sort above Project" case
/// never needs this, since the alias is already the row's own key there.
fn resolve_sort_expr<'a>(expr: &'a Expr, row: &Row, aliases: &'a HashMap<String, Expr>) -> &'a Expr {
    if let Expr::Identifier { name, .. } = expr {
        if row.get(name).is_none() {
            if let Some(aliased) = aliases.get(name) {
                return aliased;
            }
        }
    }
    expr
}

fn compare_keys(a: &[DataValue], b: &[DataValue], order_by: &[OrderByItem]) -> Ordering {
    for (i, item) in order_by.iter().enumerate() {
        let ord = compare_one(&a[i], &b[i], item);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_one(a: &DataValue, b: &DataValue, item: &OrderByItem) -> Ordering {
    let nulls = item.nulls.unwrap_or(match item.direction {
        Direction::Asc => NullsOrder::Last,
        Direction::Desc => NullsOrder::First,
    });
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => {
            if nulls == NullsOrder::First {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, true) => {
            if nulls == NullsOrder::First {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, false) => {
            let ord = a.compare(b).unwrap_or(Ordering::Equal);
            match item.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
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
    use futures::TryStreamExt;
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

    fn row_with_age(age: Option<f64>) -> Row {
        let mut row = Row::new();
        row.push(
            "t.age",
            age.map(DataValue::Number).unwrap_or(DataValue::Null),
        );
        row
    }

    #[tokio::test]
    async fn asc_defaults_nulls_last() {
        let rows = vec![row_with_age(Some(2.0)), row_with_age(None), row_with_age(Some(1.0))];
        let ctx = ctx_with_table("t", rows);
        let stmt = crate::parser::parse_sql("SELECT age FROM t ORDER BY age ASC").unwrap();
        let plan = crate::planner::plan(&stmt);
        let out: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        let values: Vec<_> = out.iter().map(|r| r.get("age").unwrap().clone()).collect();
        assert_eq!(
            values,
            vec![DataValue::Number(1.0), DataValue::Number(2.0), DataValue::Null]
        );
    }

    #[tokio::test]
    async fn desc_defaults_nulls_first() {
        let rows = vec![row_with_age(Some(2.0)), row_with_age(None), row_with_age(Some(1.0))];
        let ctx = ctx_with_table("t", rows);
        let stmt = crate::parser::parse_sql("SELECT age FROM t ORDER BY age DESC").unwrap();
        let plan = crate::planner::plan(&stmt);
        let out: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        let values: Vec<_> = out.iter().map(|r| r.get("age").unwrap().clone()).collect();
        assert_eq!(
            values,
            vec![DataValue::Null, DataValue::Number(2.0), DataValue::Number(1.0)]
        );
    }

    #[tokio::test]
    async fn order_by_alias_of_derived_expression() {
        let rows = vec![row_with_age(Some(30.0)), row_with_age(Some(10.0))];
        let ctx = ctx_with_table("t", rows);
        let stmt = crate::parser::parse_sql("SELECT age + 1 AS a FROM t ORDER BY a DESC").unwrap();
        let plan = crate::planner::plan(&stmt);
        let out: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        let values: Vec<_> = out.iter().map(|r| r.get("a").unwrap().clone()).collect();
        assert_eq!(values, vec![DataValue::Number(31.0), DataValue::Number(11.0)]);
    }
}
