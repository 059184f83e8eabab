//! Tri-valued expression evaluator (spec.md §4.6): the library called by
//! both the planner's shape analysis (`validator::contains_aggregate`) and
//! every executor operator (`exec`).

pub mod aggregate;
pub mod functions;

use crate::config::EngineConfig;
use crate::error::ExecutorError;
use crate::parser::ast::{BinaryOp, Expr, IntervalUnit, LiteralValue, SelectStatement, UnaryOp};
use crate::row::Row;
use crate::value::{DataValue, TriBool};
use async_recursion::async_recursion;
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;

/// A caller-supplied scalar function (spec.md §4.4 "any user-supplied
/// function in the caller's function map"). Treated as synchronous and
/// pure by default (spec.md §9); `AsyncScalarUdf` is the escape hatch for
/// the rare UDF that must suspend.
pub trait ScalarUdf: Send + Sync {
    fn call(&self, args: &[DataValue]) -> Result<DataValue, ExecutorError>;
}

/// The only additional suspension point spec.md §9 allows: an async UDF
/// is awaited at its call site like any other row-producing step.
#[async_trait]
pub trait AsyncScalarUdf: Send + Sync {
    async fn call(&self, args: &[DataValue]) -> Result<DataValue, ExecutorError>;
}

#[derive(Clone, Default)]
pub struct UdfRegistry {
    sync: HashMap<String, Arc<dyn ScalarUdf>>,
    async_fns: HashMap<String, Arc<dyn AsyncScalarUdf>>,
}

impl UdfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: Arc<dyn ScalarUdf>) {
        self.sync.insert(name.into().to_uppercase(), f);
    }

    pub fn register_async(&mut self, name: impl Into<String>, f: Arc<dyn AsyncScalarUdf>) {
        self.async_fns.insert(name.into().to_uppercase(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.sync.contains_key(&upper) || self.async_fns.contains_key(&upper)
    }
}

/// Executes a subquery's `SelectStatement` and returns its materialized
/// rows. Subqueries are executed uncorrelated (see DESIGN.md's "subquery
/// correlation" entry): each `IN (SELECT ...)`/`EXISTS (...)` runs the
/// inner statement fresh against the same table/function environment,
/// without splicing outer-row columns into its scope. Spec.md §1
/// explicitly excludes "correlated subquery optimisation beyond naïve
/// execution" from scope; this is the naïve execution it refers to.
#[async_trait]
pub trait SubqueryRunner: Send + Sync {
    async fn run(&self, stmt: &SelectStatement) -> Result<Vec<Row>, ExecutorError>;
}

pub struct EvalContext<'a> {
    pub row: &'a Row,
    pub udfs: &'a UdfRegistry,
    pub subqueries: &'a (dyn SubqueryRunner + 'a),
    pub config: &'a EngineConfig,
}

impl<'a> EvalContext<'a> {
    pub fn with_row(&self, row: &'a Row) -> EvalContext<'a> {
        EvalContext {
            row,
            udfs: self.udfs,
            subqueries: self.subqueries,
            config: self.config,
        }
    }
}

#[async_recursion]
pub async fn evaluate<'a>(expr: &'a Expr, ctx: &'a EvalContext<'a>) -> Result<DataValue, ExecutorError> {
    match expr {
        Expr::Literal { value, .. } => Ok(literal_to_value(value)),
        Expr::Identifier { name, .. } => Ok(ctx.row.get(name).cloned().unwrap_or(DataValue::Null)),
        Expr::Star { .. } => Ok(DataValue::Null),
        Expr::Unary { op, argument, .. } => eval_unary(*op, argument, ctx).await,
        Expr::Binary { op, left, right, .. } => eval_binary(*op, left, right, ctx).await,
        Expr::Function { name, args, distinct, .. } => eval_function(name, args, *distinct, ctx).await,
        Expr::Cast { expr, to_type, .. } => {
            let v = evaluate(expr, ctx).await?;
            cast(&v, to_type, ctx.config)
        }
        Expr::Case {
            case_expr,
            when_clauses,
            else_result,
            ..
        } => eval_case(case_expr.as_deref(), when_clauses, else_result.as_deref(), ctx).await,
        Expr::Interval { .. } => Err(ExecutorError::runtime(
            "INTERVAL may only appear on the right-hand side of +/- against a date",
        )),
        Expr::InList { expr, values, negated, .. } => eval_in_list(expr, values, *negated, ctx).await,
        Expr::InSubquery { expr, subquery, negated, .. } => {
            eval_in_subquery(expr, subquery, *negated, ctx).await
        }
        Expr::Exists { subquery, .. } => {
            let rows = ctx.subqueries.run(subquery).await?;
            Ok(DataValue::Boolean(!rows.is_empty()))
        }
        Expr::NotExists { subquery, .. } => {
            let rows = ctx.subqueries.run(subquery).await?;
            Ok(DataValue::Boolean(rows.is_empty()))
        }
    }
}

fn literal_to_value(value: &LiteralValue) -> DataValue {
    match value {
        LiteralValue::Null => DataValue::Null,
        LiteralValue::Boolean(b) => DataValue::Boolean(*b),
        LiteralValue::Number(n) => DataValue::Number(*n),
        LiteralValue::BigInt(b) => DataValue::BigInt(b.clone()),
        LiteralValue::String(s) => DataValue::String(s.clone()),
    }
}

/// Reads a value's tri-valued predicate reading as a `DataValue` — used
/// by every predicate-evaluating site (Filter/ON/HAVING) to decide
/// row retention. A row is kept iff this evaluates to `Boolean(true)`.
pub async fn evaluate_predicate(expr: &Expr, ctx: &EvalContext<'_>) -> Result<TriBool, ExecutorError> {
    Ok(evaluate(expr, ctx).await?.truthiness())
}

async fn eval_unary(op: UnaryOp, argument: &Expr, ctx: &EvalContext<'_>) -> Result<DataValue, ExecutorError> {
    match op {
        UnaryOp::Not => {
            let v = evaluate(argument, ctx).await?;
            Ok(v.truthiness().not().to_data_value())
        }
        UnaryOp::Neg => {
            let v = evaluate(argument, ctx).await?;
            Ok(match &v {
                DataValue::Number(n) => DataValue::Number(-n),
                DataValue::BigInt(b) => DataValue::BigInt(-b.clone()),
                DataValue::Null => DataValue::Null,
                _ => DataValue::Null,
            })
        }
        UnaryOp::IsNull => {
            let v = evaluate(argument, ctx).await?;
            Ok(DataValue::Boolean(v.is_null()))
        }
        UnaryOp::IsNotNull => {
            let v = evaluate(argument, ctx).await?;
            Ok(DataValue::Boolean(!v.is_null()))
        }
    }
}

async fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &EvalContext<'_>,
) -> Result<DataValue, ExecutorError> {
    if matches!(op, BinaryOp::Add | BinaryOp::Sub) {
        if let Expr::Interval { value, unit, .. } = right {
            let base = evaluate(left, ctx).await?;
            let signed = if matches!(op, BinaryOp::Sub) { -*value } else { *value };
            return Ok(apply_interval(&base, signed, *unit));
        }
    }

    // AND/OR short-circuit per spec.md's tri-valued dominance table, but
    // both sides are still evaluated eagerly here (no side-effecting
    // expressions exist in this grammar, so eager evaluation is
    // observably identical and keeps this function uniform).
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let l = evaluate(left, ctx).await?.truthiness();
        let r = evaluate(right, ctx).await?.truthiness();
        let result = if matches!(op, BinaryOp::And) { l.and(r) } else { l.or(r) };
        return Ok(result.to_data_value());
    }

    let l = evaluate(left, ctx).await?;
    let r = evaluate(right, ctx).await?;

    if matches!(op, BinaryOp::Like) {
        return Ok(match (l.as_str(), r.as_str()) {
            (Some(value), Some(pattern)) => DataValue::Boolean(functions::like_matches(value, pattern)),
            _ if l.is_null() || r.is_null() => DataValue::Null,
            _ => DataValue::Null,
        });
    }

    if matches!(op, BinaryOp::Concat) {
        if l.is_null() || r.is_null() {
            return Ok(DataValue::Null);
        }
        return Ok(DataValue::String(format!("{}{}", l, r)));
    }

    if l.is_null() || r.is_null() {
        return Ok(DataValue::Null);
    }

    match op {
        BinaryOp::Eq => Ok(l.equals(&r).map(DataValue::Boolean).unwrap_or(DataValue::Null)),
        BinaryOp::NotEq => Ok(l.equals(&r).map(|b| DataValue::Boolean(!b)).unwrap_or(DataValue::Null)),
        BinaryOp::Lt => Ok(cmp_bool(&l, &r, |o| o.is_lt())),
        BinaryOp::LtEq => Ok(cmp_bool(&l, &r, |o| o.is_le())),
        BinaryOp::Gt => Ok(cmp_bool(&l, &r, |o| o.is_gt())),
        BinaryOp::GtEq => Ok(cmp_bool(&l, &r, |o| o.is_ge())),
        BinaryOp::Add => Ok(numeric_binop(&l, &r, |a, b| a + b)),
        BinaryOp::Sub => Ok(numeric_binop(&l, &r, |a, b| a - b)),
        BinaryOp::Mul => Ok(numeric_binop(&l, &r, |a, b| a * b)),
        BinaryOp::Div => Ok(numeric_binop(&l, &r, |a, b| a / b)),
        BinaryOp::Mod => Ok(numeric_binop(&l, &r, |a, b| a % b)),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Like | BinaryOp::Concat => unreachable!("handled above"),
    }
}

fn cmp_bool(l: &DataValue, r: &DataValue, f: impl FnOnce(std::cmp::Ordering) -> bool) -> DataValue {
    l.compare(r).map(f).map(DataValue::Boolean).unwrap_or(DataValue::Null)
}

fn numeric_binop(l: &DataValue, r: &DataValue, f: impl FnOnce(f64, f64) -> f64) -> DataValue {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => DataValue::Number(f(a, b)),
        _ => DataValue::Null,
    }
}

fn apply_interval(base: &DataValue, value: f64, unit: IntervalUnit) -> DataValue {
    match unit {
        IntervalUnit::Year => functions::add_interval_months(base, (value * 12.0).round() as i64),
        IntervalUnit::Month => functions::add_interval_months(base, value.round() as i64),
        IntervalUnit::Day => functions::add_interval_duration(base, Duration::seconds((value * 86400.0).round() as i64)),
        IntervalUnit::Hour => functions::add_interval_duration(base, Duration::seconds((value * 3600.0).round() as i64)),
        IntervalUnit::Minute => functions::add_interval_duration(base, Duration::seconds((value * 60.0).round() as i64)),
        IntervalUnit::Second => functions::add_interval_duration(base, Duration::seconds(value.round() as i64)),
    }
}

async fn eval_function(
    name: &str,
    args: &[Expr],
    _distinct: bool,
    ctx: &EvalContext<'_>,
) -> Result<DataValue, ExecutorError> {
    let upper = name.to_uppercase();
    if crate::validator::functions::is_aggregate_name(&upper) {
        return Err(ExecutorError::runtime(format!(
            "aggregate function {upper} encountered outside an aggregate plan node"
        )));
    }
    if ctx.udfs.sync.contains_key(&upper) {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(evaluate(a, ctx).await?);
        }
        return ctx.udfs.sync[&upper].call(&values);
    }
    if ctx.udfs.async_fns.contains_key(&upper) {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(evaluate(a, ctx).await?);
        }
        return ctx.udfs.async_fns[&upper].call(&values).await;
    }

    let mut values = Vec::with_capacity(args.len());
    for a in args {
        if matches!(a, Expr::Star { .. }) {
            values.push(DataValue::Null);
            continue;
        }
        values.push(evaluate(a, ctx).await?);
    }
    functions::call_scalar(&upper, &values)
}

async fn eval_case(
    case_expr: Option<&Expr>,
    when_clauses: &[crate::parser::ast::WhenClause],
    else_result: Option<&Expr>,
    ctx: &EvalContext<'_>,
) -> Result<DataValue, ExecutorError> {
    let subject = match case_expr {
        Some(e) => Some(evaluate(e, ctx).await?),
        None => None,
    };
    for clause in when_clauses {
        let matched = match &subject {
            Some(subject_val) => {
                let cond_val = evaluate(&clause.condition, ctx).await?;
                subject_val.equals(&cond_val) == Some(true)
            }
            None => evaluate_predicate(&clause.condition, ctx).await?.is_true(),
        };
        if matched {
            return evaluate(&clause.result, ctx).await;
        }
    }
    match else_result {
        Some(e) => evaluate(e, ctx).await,
        None => Ok(DataValue::Null),
    }
}

async fn eval_in_list(
    expr: &Expr,
    values: &[Expr],
    negated: bool,
    ctx: &EvalContext<'_>,
) -> Result<DataValue, ExecutorError> {
    let left = evaluate(expr, ctx).await?;
    if left.is_null() {
        return Ok(DataValue::Null);
    }
    let mut saw_null = false;
    for v in values {
        let rv = evaluate(v, ctx).await?;
        if rv.is_null() {
            saw_null = true;
            continue;
        }
        if left.equals(&rv) == Some(true) {
            return Ok(DataValue::Boolean(!negated));
        }
    }
    if saw_null {
        Ok(DataValue::Null)
    } else {
        Ok(DataValue::Boolean(negated))
    }
}

async fn eval_in_subquery(
    expr: &Expr,
    subquery: &SelectStatement,
    negated: bool,
    ctx: &EvalContext<'_>,
) -> Result<DataValue, ExecutorError> {
    let left = evaluate(expr, ctx).await?;
    if left.is_null() {
        return Ok(DataValue::Null);
    }
    let rows = ctx.subqueries.run(subquery).await?;
    let mut saw_null = false;
    for row in &rows {
        let Some((_, rv)) = row.iter().next() else { continue };
        if rv.is_null() {
            saw_null = true;
            continue;
        }
        if left.equals(rv) == Some(true) {
            return Ok(DataValue::Boolean(!negated));
        }
    }
    if saw_null {
        Ok(DataValue::Null)
    } else {
        Ok(DataValue::Boolean(negated))
    }
}

/// `CAST(x AS T)` (spec.md §4.6): a cast that cannot succeed yields NULL
/// by default; `config.strict_casts` (an ambient, spec-permitted policy
/// toggle, spec.md §7) raises instead. NULL casts to NULL regardless of
/// target type.
pub fn cast(value: &DataValue, to_type: &str, config: &EngineConfig) -> Result<DataValue, ExecutorError> {
    if value.is_null() {
        return Ok(DataValue::Null);
    }
    let result = match to_type.to_uppercase().as_str() {
        "INTEGER" => value.as_f64().map(|f| DataValue::Number(f.trunc())),
        "BIGINT" => cast_bigint(value),
        "FLOAT" | "DOUBLE" => cast_float(value),
        "STRING" => Some(DataValue::String(cast_string(value))),
        "BOOLEAN" => cast_boolean(value),
        _ => None,
    };
    match result {
        Some(v) => Ok(v),
        None if config.strict_casts => Err(ExecutorError::runtime(format!(
            "cannot CAST {value} AS {to_type}"
        ))),
        None => Ok(DataValue::Null),
    }
}

fn cast_bigint(value: &DataValue) -> Option<DataValue> {
    use num_bigint::BigInt;
    match value {
        DataValue::BigInt(b) => Some(DataValue::BigInt(b.clone())),
        DataValue::Number(n) => Some(DataValue::BigInt(BigInt::from(n.trunc() as i64))),
        DataValue::Boolean(b) => Some(DataValue::BigInt(BigInt::from(if *b { 1 } else { 0 }))),
        DataValue::String(s) => s
            .parse::<i64>()
            .map(|i| DataValue::BigInt(BigInt::from(i)))
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| DataValue::BigInt(BigInt::from(f.trunc() as i64)))),
        _ => None,
    }
}

fn cast_float(value: &DataValue) -> Option<DataValue> {
    match value {
        DataValue::String(s) => s.parse::<f64>().ok().map(DataValue::Number),
        other => other.as_f64().map(DataValue::Number),
    }
}

fn cast_string(value: &DataValue) -> String {
    match value {
        DataValue::String(s) => s.clone(),
        other => other.to_json_text(),
    }
}

fn cast_boolean(value: &DataValue) -> Option<DataValue> {
    match value {
        DataValue::Boolean(b) => Some(DataValue::Boolean(*b)),
        DataValue::Number(n) => Some(DataValue::Boolean(*n != 0.0)),
        DataValue::BigInt(b) => Some(DataValue::Boolean(!num_traits::Zero::is_zero(b))),
        DataValue::String(s) => match s.to_lowercase().as_str() {
            "true" => Some(DataValue::Boolean(true)),
            "false" => Some(DataValue::Boolean(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Deterministic textual rendering of an expression, used to key
/// aggregate accumulators: a `HashAggregate`/`ScalarAggregate` stores one
/// accumulator per distinct rendering and the enclosing `Project`/HAVING
/// evaluation looks results up by re-rendering the same subexpression
/// (see `exec::aggregate`). Not intended to be parseable SQL, only a
/// stable structural fingerprint.
pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value, .. } => format!("{:?}", value),
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Star { .. } => "*".to_string(),
        Expr::Unary { op, argument, .. } => format!("{:?}({})", op, render_expr(argument)),
        Expr::Binary { op, left, right, .. } => {
            format!("({} {:?} {})", render_expr(left), op, render_expr(right))
        }
        Expr::Function { name, args, distinct, .. } => format!(
            "{}({}{})",
            name.to_uppercase(),
            if *distinct { "DISTINCT " } else { "" },
            args.iter().map(render_expr).collect::<Vec<_>>().join(", ")
        ),
        Expr::Cast { expr, to_type, .. } => format!("CAST({} AS {})", render_expr(expr), to_type),
        Expr::Case { .. } => format!("CASE@{}", expr.position_start()),
        Expr::Interval { value, unit, .. } => format!("INTERVAL {} {:?}", value, unit),
        Expr::InList { .. } | Expr::InSubquery { .. } | Expr::Exists { .. } | Expr::NotExists { .. } => {
            format!("EXPR@{}", expr.position_start())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;

    struct NoSubqueries;
    #[async_trait]
    impl SubqueryRunner for NoSubqueries {
        async fn run(&self, _stmt: &SelectStatement) -> Result<Vec<Row>, ExecutorError> {
            Ok(Vec::new())
        }
    }

    async fn eval_where(sql: &str, row: &Row) -> DataValue {
        let stmt = parse_sql(sql).unwrap();
        let udfs = UdfRegistry::new();
        let config = EngineConfig::default();
        let runner = NoSubqueries;
        let ctx = EvalContext {
            row,
            udfs: &udfs,
            subqueries: &runner,
            config: &config,
        };
        evaluate(&stmt.where_clause.unwrap(), &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn null_equals_null_is_null() {
        let mut row = Row::new();
        row.push("x", DataValue::Null);
        let v = eval_where("SELECT * FROM t WHERE x = NULL", &row).await;
        assert_eq!(v, DataValue::Null);
    }

    #[tokio::test]
    async fn is_null_never_yields_null() {
        let mut row = Row::new();
        row.push("x", DataValue::Null);
        let v = eval_where("SELECT * FROM t WHERE x IS NULL", &row).await;
        assert_eq!(v, DataValue::Boolean(true));
    }

    #[tokio::test]
    async fn between_matches_conjunction_semantics() {
        let mut row = Row::new();
        row.push("x", DataValue::Number(5.0));
        let v = eval_where("SELECT * FROM t WHERE x BETWEEN 1 AND 10", &row).await;
        assert_eq!(v, DataValue::Boolean(true));
        let v = eval_where("SELECT * FROM t WHERE x NOT BETWEEN 1 AND 10", &row).await;
        assert_eq!(v, DataValue::Boolean(false));
    }

    #[tokio::test]
    async fn cast_string_of_object_unquotes_bigint() {
        let mut row = Row::new();
        row.push(
            "info",
            DataValue::Object(
                [
                    ("id".to_string(), serde_json::json!(1)),
                    ("name".to_string(), serde_json::json!("Alice")),
                    ("age".to_string(), serde_json::json!(30)),
                ]
                .into_iter()
                .collect(),
            ),
        );
        let v = eval_where("SELECT * FROM t WHERE CAST(info AS STRING) = '{\"id\":1,\"name\":\"Alice\",\"age\":30}'", &row).await;
        assert_eq!(v, DataValue::Boolean(true));
    }
}
