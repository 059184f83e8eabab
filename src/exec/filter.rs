//! Filter operator (spec.md §4.7): evaluates a predicate per row, emitting
//! only the rows it reads as TRUE.

use super::{check_cancelled, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::error::ExecutorError;
use crate::eval::{self, EvalContext};
use crate::parser::ast::Expr;
use crate::row::Row;
use futures_async_stream::try_stream;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn filter(condition: Expr, input: BoxedExecutor, ctx: ExecutionContext) {
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };

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
        if eval::evaluate_predicate(&condition, &eval_ctx).await?.is_true() {
            yield row;
        }
    }
}
