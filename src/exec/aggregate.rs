//! Hash/Scalar aggregation (spec.md §4.7 HashAggregate/ScalarAggregate):
//! materialises the input stream, groups by the tuple of GROUP BY
//! expression values (canonical serialisation via `DataValue::group_key`),
//! and reduces each group's aggregate calls with the accumulators of
//! `eval::aggregate`. `HAVING` filters post-aggregation. Neither node
//! emits through a separate `Project` afterward — `columns` here already
//! is the final output shape (see planner's "no redundant Project over
//! Aggregate").

use crate::error::ExecutorError;
use crate::eval::aggregate::{build_accumulator, Accumulator};
use crate::eval::{self, render_expr, EvalContext};
use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::parser::ast::{Expr, WhenClause};
use crate::planner::ProjectColumn;
use crate::row::Row;
use futures_async_stream::try_stream;
use std::collections::{HashMap, HashSet};

/// One distinct aggregate call found in the output/HAVING expressions,
/// keyed by its rendered text (`eval::render_expr`) so the same call
/// appearing in both SELECT and HAVING shares one accumulator.
struct AggregateSlot {
    key: String,
    func: String,
    arg: Expr,
    distinct: bool,
}

struct GroupState {
    representative: Row,
    accumulators: Vec<Box<dyn Accumulator>>,
    seen_distinct: Vec<HashSet<Option<String>>>,
}

/// Walks `expr`, replacing every aggregate `Function` node with an
/// `Identifier` referencing its rendered-text slot, and records the slot
/// (deduplicated by rendering) so the caller can build one accumulator
/// per distinct aggregate call. Subquery-bearing nodes are left alone —
/// aggregates do not nest inside `IN`/`EXISTS` subqueries here.
fn rewrite_expr(expr: &Expr, slots: &mut Vec<AggregateSlot>) -> Expr {
    if let Expr::Function {
        name,
        args,
        distinct,
        position_start,
        position_end,
    } = expr
    {
        let upper = name.to_uppercase();
        if crate::validator::functions::is_aggregate_name(&upper) {
            let key = render_expr(expr);
            if !slots.iter().any(|s| s.key == key) {
                let arg = args.first().cloned().unwrap_or(Expr::Star {
                    position_start: *position_start,
                    position_end: *position_end,
                });
                slots.push(AggregateSlot {
                    key: key.clone(),
                    func: upper,
                    arg,
                    distinct: *distinct,
                });
            }
            return Expr::Identifier {
                name: key,
                position_start: *position_start,
                position_end: *position_end,
            };
        }
    }

    match expr {
        Expr::Unary {
            op,
            argument,
            position_start,
            position_end,
        } => Expr::Unary {
            op: *op,
            argument: Box::new(rewrite_expr(argument, slots)),
            position_start: *position_start,
            position_end: *position_end,
        },
        Expr::Binary {
            op,
            left,
            right,
            position_start,
            position_end,
        } => Expr::Binary {
            op: *op,
            left: Box::new(rewrite_expr(left, slots)),
            right: Box::new(rewrite_expr(right, slots)),
            position_start: *position_start,
            position_end: *position_end,
        },
        Expr::Function {
            name,
            args,
            distinct,
            position_start,
            position_end,
        } => Expr::Function {
            name: name.clone(),
            args: args.iter().map(|a| rewrite_expr(a, slots)).collect(),
            distinct: *distinct,
            position_start: *position_start,
            position_end: *position_end,
        },
        Expr::Cast {
            expr,
            to_type,
            position_start,
            position_end,
        } => Expr::Cast {
            expr: Box::new(rewrite_expr(expr, slots)),
            to_type: to_type.clone(),
            position_start: *position_start,
            position_end: *position_end,
        },
        Expr::Case {
            case_expr,
            when_clauses,
            else_result,
            position_start,
            position_end,
        } => Expr::Case {
            case_expr: case_expr.as_deref().map(|e| Box::new(rewrite_expr(e, slots))),
            when_clauses: when_clauses
                .iter()
                .map(|w| WhenClause {
                    condition: rewrite_expr(&w.condition, slots),
                    result: rewrite_expr(&w.result, slots),
                })
                .collect(),
            else_result: else_result.as_deref().map(|e| Box::new(rewrite_expr(e, slots))),
            position_start: *position_start,
            position_end: *position_end,
        },
        other => other.clone(),
    }
}

fn rewrite_columns(columns: &[ProjectColumn], slots: &mut Vec<AggregateSlot>) -> Vec<ProjectColumn> {
    columns
        .iter()
        .map(|c| match c {
            ProjectColumn::Expr { expr, output_name } => ProjectColumn::Expr {
                expr: rewrite_expr(expr, slots),
                output_name: output_name.clone(),
            },
            other => other.clone(),
        })
        .collect()
}

fn new_accumulators(slots: &[AggregateSlot]) -> Vec<Box<dyn Accumulator>> {
    slots
        .iter()
        .map(|s| build_accumulator(&s.func, matches!(s.arg, Expr::Star { .. })))
        .collect()
}

async fn feed_slots(
    slots: &[AggregateSlot],
    accumulators: &mut [Box<dyn Accumulator>],
    seen_distinct: &mut [HashSet<Option<String>>],
    eval_ctx: &EvalContext<'_>,
) -> Result<(), ExecutorError> {
    for (i, slot) in slots.iter().enumerate() {
        let value = eval::evaluate(&slot.arg, eval_ctx).await?;
        if slot.distinct {
            let dedup_key = value.canonical_key();
            if !seen_distinct[i].insert(dedup_key) {
                continue;
            }
        }
        accumulators[i].update(&value);
    }
    Ok(())
}

async fn project_output(
    columns: &[ProjectColumn],
    row: &Row,
    ctx: &ExecutionContext,
    runner: &PlanSubqueryRunner,
) -> Result<Row, ExecutorError> {
    let mut out = Row::with_capacity(columns.len());
    for column in columns {
        match column {
            ProjectColumn::AllColumns => {
                for (name, value) in row.iter() {
                    out.push(Row::bare_name(name), value.clone());
                }
            }
            ProjectColumn::TableColumns(table) => {
                for (name, value) in row.columns_qualified_by(table) {
                    out.push(Row::bare_name(name), value.clone());
                }
            }
            ProjectColumn::Expr { expr, output_name } => {
                let eval_ctx = EvalContext {
                    row,
                    udfs: &ctx.udfs,
                    subqueries: runner,
                    config: &ctx.config,
                };
                let value = eval::evaluate(expr, &eval_ctx).await?;
                out.push(output_name.clone(), value);
            }
        }
    }
    Ok(out)
}

async fn having_keeps(
    having: &Option<Expr>,
    row: &Row,
    ctx: &ExecutionContext,
    runner: &PlanSubqueryRunner,
) -> Result<bool, ExecutorError> {
    match having {
        Some(h) => {
            let eval_ctx = EvalContext {
                row,
                udfs: &ctx.udfs,
                subqueries: runner,
                config: &ctx.config,
            };
            Ok(eval::evaluate_predicate(h, &eval_ctx).await?.is_true())
        }
        None => Ok(true),
    }
}

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn hash_aggregate(
    group_by: Vec<Expr>,
    columns: Vec<ProjectColumn>,
    having: Option<Expr>,
    input: BoxedExecutor,
    ctx: ExecutionContext,
) {
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };
    let mut slots: Vec<AggregateSlot> = Vec::new();
    let rewritten_columns = rewrite_columns(&columns, &mut slots);
    let rewritten_having = having.as_ref().map(|h| rewrite_expr(h, &mut slots));

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, GroupState> = HashMap::new();

    #[for_await]
    for row in input {
        check_cancelled(&ctx.signal)?;
        let row = row?;
        let eval_ctx = EvalContext {
            row: &row,
            udfs: &ctx.udfs,
            subqueries: &runner,
            config: &ctx.config,
        };
        let mut key_parts = Vec::with_capacity(group_by.len());
        for expr in &group_by {
            key_parts.push(eval::evaluate(expr, &eval_ctx).await?.group_key());
        }
        let key = key_parts.join("\u{1}");

        if !groups.contains_key(&key) {
            order.push(key.clone());
            groups.insert(
                key.clone(),
                GroupState {
                    representative: row.clone(),
                    accumulators: new_accumulators(&slots),
                    seen_distinct: slots.iter().map(|_| HashSet::new()).collect(),
                },
            );
        }
        let state = groups.get_mut(&key).expect("just inserted");
        feed_slots(&slots, &mut state.accumulators, &mut state.seen_distinct, &eval_ctx).await?;
    }

    for key in order {
        let state = groups.remove(&key).expect("key came from `order`");
        let mut output_row = state.representative;
        for (slot, accumulator) in slots.iter().zip(state.accumulators.iter()) {
            output_row.push(slot.key.clone(), accumulator.finish());
        }

        if !having_keeps(&rewritten_having, &output_row, &ctx, &runner).await? {
            continue;
        }
        yield project_output(&rewritten_columns, &output_row, &ctx, &runner).await?;
    }
}

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn scalar_aggregate(
    columns: Vec<ProjectColumn>,
    having: Option<Expr>,
    input: BoxedExecutor,
    ctx: ExecutionContext,
) {
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };
    let mut slots: Vec<AggregateSlot> = Vec::new();
    let rewritten_columns = rewrite_columns(&columns, &mut slots);
    let rewritten_having = having.as_ref().map(|h| rewrite_expr(h, &mut slots));

    let mut accumulators = new_accumulators(&slots);
    let mut seen_distinct: Vec<HashSet<Option<String>>> = slots.iter().map(|_| HashSet::new()).collect();
    let mut representative: Option<Row> = None;

    #[for_await]
    for row in input {
        check_cancelled(&ctx.signal)?;
        let row = row?;
        if representative.is_none() {
            representative = Some(row.clone());
        }
        let eval_ctx = EvalContext {
            row: &row,
            udfs: &ctx.udfs,
            subqueries: &runner,
            config: &ctx.config,
        };
        feed_slots(&slots, &mut accumulators, &mut seen_distinct, &eval_ctx).await?;
    }

    let mut output_row = representative.unwrap_or_default();
    for (slot, accumulator) in slots.iter().zip(accumulators.iter()) {
        output_row.push(slot.key.clone(), accumulator.finish());
    }

    if having_keeps(&rewritten_having, &output_row, &ctx, &runner).await? {
        yield project_output(&rewritten_columns, &output_row, &ctx, &runner).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::eval::UdfRegistry;
    use crate::exec::{CancelSignal, ExecutionContext, TableProvider};
    use crate::source::memory::InMemoryTable;
    use crate::source::DataSource;
    use crate::value::DataValue;
    use futures::TryStreamExt;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    fn users_rows() -> Vec<Row> {
        let mut out = Vec::new();
        for (city, name) in [("NYC", "Alice"), ("NYC", "Bob"), ("LA", "Carl")] {
            let mut row = Row::new();
            row.push("users.city", DataValue::String(city.to_string()));
            row.push("users.name", DataValue::String(name.to_string()));
            out.push(row);
        }
        out
    }

    fn ctx_with_table(name: &str, rows: Vec<Row>) -> ExecutionContext {
        let mut tables: StdHashMap<String, Arc<dyn DataSource>> = StdHashMap::new();
        tables.insert(name.to_string(), Arc::new(InMemoryTable::new(rows)));
        ExecutionContext {
            tables: Arc::new(tables),
            udfs: Arc::new(UdfRegistry::new()),
            config: Arc::new(EngineConfig::default()),
            signal: CancelSignal::inert(),
        }
    }

    #[tokio::test]
    async fn group_by_having_filters_small_groups() {
        let ctx = ctx_with_table("users", users_rows());
        let stmt = crate::parser::parse_sql(
            "SELECT city, COUNT(*) AS n FROM users GROUP BY city HAVING COUNT(*) > 1",
        )
        .unwrap();
        let plan = crate::planner::plan(&stmt);
        let rows: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("city"), Some(&DataValue::String("NYC".to_string())));
        assert_eq!(rows[0].get("n"), Some(&DataValue::Number(2.0)));
    }

    #[tokio::test]
    async fn count_star_on_empty_input_is_zero() {
        let ctx = ctx_with_table("users", Vec::new());
        let stmt = crate::parser::parse_sql("SELECT COUNT(*) AS c FROM users").unwrap();
        let plan = crate::planner::plan(&stmt);
        let rows: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("c"), Some(&DataValue::Number(0.0)));
    }

    #[tokio::test]
    async fn shared_aggregate_slot_is_computed_once() {
        let ctx = ctx_with_table("users", users_rows());
        let stmt = crate::parser::parse_sql(
            "SELECT COUNT(*) AS n FROM users HAVING COUNT(*) > 0",
        )
        .unwrap();
        let plan = crate::planner::plan(&stmt);
        let rows: Vec<Row> = crate::exec::execute(&plan, ctx).try_collect().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("n"), Some(&DataValue::Number(3.0)));
    }
}
