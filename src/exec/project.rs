//! Project operator (spec.md §4.7): per row, evaluates each selected
//! expression and emits a row keyed by output column name. `*` expands to
//! every column of the current row; `t.*` expands to the columns carrying
//! the `t` qualifier. Both strip the qualifier off the emitted key
//! (spec.md §3.5 — output column names read `id`, not `users.id`).

use super::{check_cancelled, BoxedExecutor, ExecutionContext, PlanSubqueryRunner};
use crate::error::ExecutorError;
use crate::eval::{self, EvalContext};
use crate::planner::ProjectColumn;
use crate::row::Row;
use futures_async_stream::try_stream;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn project(columns: Vec<ProjectColumn>, input: BoxedExecutor, ctx: ExecutionContext) {
    let runner = PlanSubqueryRunner { ctx: ctx.clone() };

    #[for_await]
    for row in input {
        check_cancelled(&ctx.signal)?;
        let row = row?;
        let mut out = Row::with_capacity(row.len());

        for column in &columns {
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
                        row: &row,
                        udfs: &ctx.udfs,
                        subqueries: &runner,
                        config: &ctx.config,
                    };
                    let value = eval::evaluate(expr, &eval_ctx).await?;
                    out.push(output_name.clone(), value);
                }
            }
        }

        yield out;
    }
}
