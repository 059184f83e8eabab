//! HashJoin (spec.md §4.7): materialises the right (build) side into a
//! hash table keyed by the right key's canonical value, then streams the
//! left (probe) side emitting joined rows. LEFT/FULL null-pad an unmatched
//! probe row's right-side columns; RIGHT/FULL also emit build-side rows
//! that were never probed, null-padded on the left.
//!
//! `HashJoin.left_key`/`right_key` always refer to the plan's own `left`/
//! `right` children, regardless of which side of `ON a.x = b.y` each came
//! from textually (see DESIGN.md "hash-join key placement").

use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::error::ExecutorError;
use crate::eval::{self, EvalContext};
use crate::parser::ast::{Expr, JoinType};
use crate::row::Row;
use crate::value::DataValue;
use futures_async_stream::try_stream;
use std::collections::HashMap;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn hash_join(
    join_type: JoinType,
    left_key: Expr,
    right_key: Expr,
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

    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in right_rows.iter().enumerate() {
        let eval_ctx = EvalContext {
            row,
            udfs: &ctx.udfs,
            subqueries: &runner,
            config: &ctx.config,
        };
        let value = eval::evaluate(&right_key, &eval_ctx).await?;
        if let Some(key) = value.canonical_key() {
            buckets.entry(key).or_default().push(idx);
        }
    }

    let right_shape: Option<Vec<String>> = right_rows.first().map(|r| r.column_names().map(str::to_string).collect());
    let mut matched = vec![false; right_rows.len()];
    let mut left_shape: Option<Vec<String>> = None;

    #[for_await]
    for row in left {
        check_cancelled(&ctx.signal)?;
        let left_row = row?;
        if left_shape.is_none() {
            left_shape = Some(left_row.column_names().map(str::to_string).collect());
        }

        let eval_ctx = EvalContext {
            row: &left_row,
            udfs: &ctx.udfs,
            subqueries: &runner,
            config: &ctx.config,
        };
        let key_value = eval::evaluate(&left_key, &eval_ctx).await?;
        let indices = key_value.canonical_key().and_then(|k| buckets.get(&k));

        match indices {
            Some(idxs) if !idxs.is_empty() => {
                for &idx in idxs {
                    matched[idx] = true;
                    let mut joined = left_row.clone();
                    joined.extend_from(&right_rows[idx]);
                    yield joined;
                }
            }
            _ => {
                if matches!(join_type, JoinType::Left | JoinType::Full) {
                    let mut joined = left_row.clone();
                    if let Some(shape) = &right_shape {
                        for name in shape {
                            joined.push(name.clone(), DataValue::Null);
                        }
                    }
                    yield joined;
                }
            }
        }
    }

    if matches!(join_type, JoinType::Right | JoinType::Full) {
        for (idx, row) in right_rows.into_iter().enumerate() {
            if matched[idx] {
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
