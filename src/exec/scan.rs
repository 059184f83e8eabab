//! Scan operator (spec.md §4.7): asks a `DataSource` for rows, passing the
//! scan hints, then applies whichever hints the source reports it did not
//! — WHERE as a local filter, LIMIT/OFFSET as a local window — so a plan
//! built against an uncooperative source is still correct.

use super::{check_cancelled, qualify_row, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::error::ExecutorError;
use crate::eval::{self, EvalContext};
use crate::planner::ScanHints;
use crate::row::Row;
use crate::source::DataSource;
use futures_async_stream::try_stream;
use std::sync::Arc;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn scan(source: Arc<dyn DataSource>, alias: String, hints: ScanHints, ctx: ExecutionContext) {
    let result = source.scan(&hints).await?;
    let needs_where = hints.where_clause.is_some() && !result.applied_where;
    let needs_limit_offset = (hints.limit.is_some() || hints.offset.is_some()) && !result.applied_limit_offset;
    let offset = hints.offset.unwrap_or(0);
    let mut skipped = 0u64;
    let mut emitted = 0u64;
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };

    #[for_await]
    for row in result.rows {
        check_cancelled(&ctx.signal)?;
        let row = qualify_row(row?, &alias);

        if needs_where {
            let predicate = hints.where_clause.as_ref().expect("checked by needs_where");
            let eval_ctx = EvalContext {
                row: &row,
                udfs: &ctx.udfs,
                subqueries: &runner,
                config: &ctx.config,
            };
            if !eval::evaluate_predicate(predicate, &eval_ctx).await?.is_true() {
                continue;
            }
        }

        if needs_limit_offset {
            if skipped < offset {
                skipped += 1;
                continue;
            }
            if let Some(limit) = hints.limit {
                if emitted >= limit {
                    break;
                }
            }
            emitted += 1;
        }

        yield row;
    }
}
