//! Pull-based streaming executor (spec.md §4.7): turns a `LogicalPlan`
//! into an asynchronous sequence of rows. Every operator is implemented
//! with `futures_async_stream::try_stream` exactly as the teacher's
//! `execution/executor/dml/insert.rs` implements its own `_execute` —
//! a `#[try_stream(boxed, ok = Row, error = ExecutorError)]` function with
//! a `#[for_await]` loop over its child stream(s), `?` to propagate errors,
//! and an implicit `yield` per output row.

mod aggregate;
mod distinct;
mod filter;
mod join;
mod limit;
mod project;
mod scan;
mod sort;

use crate::config::EngineConfig;
use crate::error::ExecutorError;
use crate::eval::{SubqueryRunner, UdfRegistry};
use crate::parser::ast::SelectStatement;
use crate::planner::LogicalPlan;
use crate::row::Row;
use crate::source::DataSource;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The result type of every operator constructor (spec.md §4.7 "whole-plan
/// evaluation is an asynchronous sequence exposed to the caller").
pub type BoxedExecutor = BoxStream<'static, Result<Row, ExecutorError>>;

/// Cooperative abort signal (spec.md §5 "an abort signal threaded through
/// execute context is consulted before every new row pull"). `None` means
/// the caller supplied no signal, which can never trip.
#[derive(Clone, Default)]
pub struct CancelSignal(Option<Arc<AtomicBool>>);

impl CancelSignal {
    pub fn new() -> Self {
        CancelSignal(Some(Arc::new(AtomicBool::new(false))))
    }

    /// A signal that can never be tripped — used where the caller passed
    /// no `signal` to `executeSql`.
    pub fn inert() -> Self {
        CancelSignal(None)
    }

    pub fn trip(&self) {
        if let Some(flag) = &self.0 {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.0.as_ref().map(|flag| flag.load(Ordering::SeqCst)).unwrap_or(false)
    }
}

/// Checked by every operator before each row pull (spec.md §5); on trip the
/// stream ends with `ExecutorError::Cancelled`.
pub(crate) fn check_cancelled(signal: &CancelSignal) -> Result<(), ExecutorError> {
    if signal.is_tripped() {
        Err(ExecutorError::Cancelled)
    } else {
        Ok(())
    }
}

/// Resolves a table name to a `DataSource` (spec.md §6.1 `executeSql({…,
/// tables, …})`). A plain `HashMap` satisfies this trivially; callers with
/// a catalog of their own can implement it directly.
pub trait TableProvider: Send + Sync {
    fn get(&self, table: &str) -> Option<Arc<dyn DataSource>>;
}

impl TableProvider for HashMap<String, Arc<dyn DataSource>> {
    fn get(&self, table: &str) -> Option<Arc<dyn DataSource>> {
        HashMap::get(self, table).cloned()
    }
}

/// Everything an operator constructor needs besides its own plan node:
/// table lookup, the UDF map, ambient config, and the cancellation signal.
/// Cheap to clone — every field is `Arc`-backed.
#[derive(Clone)]
pub struct ExecutionContext {
    pub tables: Arc<dyn TableProvider>,
    pub udfs: Arc<UdfRegistry>,
    pub config: Arc<EngineConfig>,
    pub signal: CancelSignal,
}

/// Closes the loop between `eval::SubqueryRunner` and this module: an
/// `IN (SELECT …)`/`EXISTS (…)` subquery is planned and executed the same
/// way any top-level statement is, then fully drained (spec.md §1 "naïve
/// execution" of subqueries — see `eval::SubqueryRunner`'s doc comment).
pub(crate) struct PlanSubqueryRunner {
    pub ctx: ExecutionContext,
}

#[async_trait]
impl SubqueryRunner for PlanSubqueryRunner {
    async fn run(&self, stmt: &SelectStatement) -> Result<Vec<Row>, ExecutorError> {
        let plan = crate::planner::plan(stmt);
        execute(&plan, self.ctx.clone()).try_collect().await
    }
}

/// Recursively lowers a `LogicalPlan` into its `BoxedExecutor` (spec.md
/// §4.7). Each arm just threads its children's already-built executors
/// into the matching operator constructor.
pub fn execute(plan: &LogicalPlan, ctx: ExecutionContext) -> BoxedExecutor {
    match plan {
        LogicalPlan::Scan { table, alias, hints } => {
            let bound_alias = alias.clone().unwrap_or_else(|| table.clone());
            match ctx.tables.get(table) {
                Some(source) => scan::scan(source, bound_alias, hints.clone(), ctx.clone()),
                None => error_stream(ExecutorError::source(format!("unknown table \"{table}\""))),
            }
        }
        LogicalPlan::SubqueryScan { subquery, alias } => {
            let inner = execute(subquery, ctx.clone());
            requalify(inner, alias.clone())
        }
        LogicalPlan::Filter { condition, child } => {
            filter::filter(condition.clone(), execute(child, ctx.clone()), ctx)
        }
        LogicalPlan::Project { columns, child } => {
            project::project(columns.clone(), execute(child, ctx.clone()), ctx)
        }
        LogicalPlan::HashJoin {
            join_type,
            left_key,
            right_key,
            left,
            right,
        } => join::hash_join(
            *join_type,
            left_key.clone(),
            right_key.clone(),
            execute(left, ctx.clone()),
            execute(right, ctx.clone()),
            ctx,
        ),
        LogicalPlan::NestedLoopJoin {
            join_type,
            condition,
            left,
            right,
        } => join::nested_loop_join(
            *join_type,
            condition.clone(),
            execute(left, ctx.clone()),
            execute(right, ctx.clone()),
            ctx,
        ),
        LogicalPlan::PositionalJoin { left, right } => {
            join::positional_join(execute(left, ctx.clone()), execute(right, ctx.clone()), ctx)
        }
        LogicalPlan::HashAggregate {
            group_by,
            columns,
            having,
            child,
        } => aggregate::hash_aggregate(
            group_by.clone(),
            columns.clone(),
            having.clone(),
            execute(child, ctx.clone()),
            ctx,
        ),
        LogicalPlan::ScalarAggregate { columns, having, child } => {
            aggregate::scalar_aggregate(columns.clone(), having.clone(), execute(child, ctx.clone()), ctx)
        }
        LogicalPlan::Sort { order_by, aliases, child } => {
            sort::sort(order_by.clone(), aliases.clone(), execute(child, ctx.clone()), ctx)
        }
        LogicalPlan::Distinct { child } => distinct::distinct(execute(child, ctx.clone()), ctx),
        LogicalPlan::Limit { limit, offset, child } => {
            limit::limit(*limit, *offset, execute(child, ctx.clone()), ctx)
        }
    }
}

fn error_stream(err: ExecutorError) -> BoxedExecutor {
    stream::once(async move { Err(err) }).boxed()
}

/// Rekeys every column of `row` under `alias.<bare name>`, discarding
/// whatever qualifier it already carried. `Scan` calls this on every row
/// it reads from a `DataSource`; `SubqueryScan` calls it on the inner
/// plan's already-bare-keyed `Project` output (spec.md §4.7 `t.*`).
pub(crate) fn qualify_row(row: Row, alias: &str) -> Row {
    row.into_iter_pairs()
        .map(|(k, v)| (format!("{alias}.{}", Row::bare_name(&k)), v))
        .collect()
}

fn requalify(input: BoxedExecutor, alias: String) -> BoxedExecutor {
    input.map(move |r| r.map(|row| qualify_row(row, &alias))).boxed()
}
