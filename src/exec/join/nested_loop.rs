//! NestedLoopJoin (spec.md §4.7): cartesian product filtered by an
//! optional condition (absent means "keep every pair", used for a CROSS
//! JOIN shaped `ON`-less condition). The build (right) side is
//! materialised so it can be rewound once per probe row.

use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::error::ExecutorError;
use crate::eval::{self, EvalContext};
use crate::parser::ast::{Expr, JoinType};
use crate::row::Row;
use crate::value::DataValue;
use futures_async_stream::try_stream;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn nested_loop_join(
    join_type: JoinType,
    condition: Option<Expr>,
    left: BoxedExecutor,
    right: BoxedExecutor,
    ctx: ExecutionContext,
) {
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };

    let mut right_rows: Vec<Row> = Vec::with_capacity(ctx.config.materialize_buffer_hint);
    #[for_await]
    for row in right {
        check_cancelled(&ctx.signal)?;
        right_rows.push(row?);
    }

    let right_shape: Option<Vec<String>> = right_rows.first().map(|r| r.column_names().map(str::to_string).collect());
    let mut right_matched = vec![false; right_rows.len()];
    let mut left_shape: Option<Vec<String>> = None;

    #[for_await]
    for row in left {
        check_cancelled(&ctx.signal)?;
        let left_row = row?;
        if left_shape.is_none() {
            left_shape = Some(left_row.column_names().map(str::to_string).collect());
        }

        let mut any_match = false;
        for (idx, right_row) in right_rows.iter().enumerate() {
            let keep = match &condition {
                Some(cond) => {
                    let mut combined = left_row.clone();
                    combined.extend_from(right_row);
                    let eval_ctx = EvalContext {
                        row: &combined,
                        udfs: &ctx.udfs,
                        subqueries: &runner,
                        config: &ctx.config,
                    };
                    eval::evaluate_predicate(cond, &eval_ctx).await?.is_true()
                }
                None => true,
            };
            if keep {
                any_match = true;
                right_matched[idx] = true;
                let mut joined = left_row.clone();
                joined.extend_from(right_row);
                yield joined;
            }
        }

        if !any_match && matches!(join_type, JoinType::Left | JoinType::Full) {
            let mut joined = left_row.clone();
            if let Some(shape) = &right_shape {
                for name in shape {
                    joined.push(name.clone(), DataValue::Null);
                }
            }
            yield joined;
        }
    }

    if matches!(join_type, JoinType::Right | JoinType::Full) {
        for (idx, row) in right_rows.into_iter().enumerate() {
            if right_matched[idx] {
                continue;
            }
            let mut joined = Row::new();
            if let Some(shape) = &left_shape {
                for name in shape {
                    joined.push(name.clone(), DataValue::Null);
                }
            }
            joined.extend_from(&row);
            yield joined;
        }
    }
}
