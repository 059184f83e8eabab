//! Parquet filter-pushdown adapter (spec.md §6.3): translates a WHERE
//! predicate into a MongoDB-shaped filter document, all-or-nothing. File
//! and column-chunk I/O is explicitly out of scope (spec.md §1); this
//! module owns only the AST → filter-document conversion and a thin
//! `DataSource` wrapper around an injected row collaborator.

use super::{DataSource, RowStream, ScanResult};
use crate::error::ExecutorError;
use crate::parser::ast::{BinaryOp, Expr, LiteralValue, UnaryOp};
use crate::planner::ScanHints;
use crate::row::Row;
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use serde_json::{json, Value};

/// Converts a WHERE AST into a MongoDB-shaped filter document (spec.md
/// §6.3): comparisons map to `$lt/$lte/$gt/$gte/$eq/$ne`, NOT flips the
/// comparison, AND/OR combine under `$and`/`$or` (and under negation to
/// `$or`/`$nor`), `IN`/`NOT IN` map to `$in`/`$nin`. Returns `None` the
/// moment any sub-expression isn't convertible (LIKE, CAST, a
/// non-identifier/literal pair, …) — the whole filter is discarded, not
/// partially applied.
pub fn to_mongo_filter(expr: &Expr) -> Option<Value> {
    convert(expr, false)
}

fn convert(expr: &Expr, negated: bool) -> Option<Value> {
    match expr {
        Expr::Unary {
            op: UnaryOp::Not,
            argument,
            ..
        } => convert(argument, !negated),
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
            ..
        } => combine(left, right, negated, "$and", "$or"),
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
            ..
        } => combine(left, right, negated, "$or", "$nor"),
        Expr::Binary { op, left, right, .. } if is_comparison(*op) => convert_comparison(*op, left, right, negated),
        Expr::InList { expr, values, negated: list_negated, .. } => {
            convert_in_list(expr, values, *list_negated ^ negated)
        }
        _ => None,
    }
}

fn combine(left: &Expr, right: &Expr, negated: bool, positive_op: &str, negated_op: &str) -> Option<Value> {
    let l = convert(left, negated)?;
    let r = convert(right, negated)?;
    let op = if negated { negated_op } else { positive_op };
    Some(json!({ op: [l, r] }))
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
    )
}

fn convert_comparison(op: BinaryOp, left: &Expr, right: &Expr, negated: bool) -> Option<Value> {
    let (column, literal) = identifier_literal_pair(left, right)?;
    let effective = if negated { flip(op) } else { op };
    let mongo_op = match effective {
        BinaryOp::Eq => "$eq",
        BinaryOp::NotEq => "$ne",
        BinaryOp::Lt => "$lt",
        BinaryOp::LtEq => "$lte",
        BinaryOp::Gt => "$gt",
        BinaryOp::GtEq => "$gte",
        _ => return None,
    };
    Some(json!({ column: { mongo_op: literal } }))
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Eq => BinaryOp::NotEq,
        BinaryOp::NotEq => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::GtEq,
        BinaryOp::LtEq => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::LtEq,
        BinaryOp::GtEq => BinaryOp::Lt,
        other => other,
    }
}

fn convert_in_list(expr: &Expr, values: &[Expr], negated: bool) -> Option<Value> {
    let Expr::Identifier { name, .. } = expr else {
        return None;
    };
    let literals: Option<Vec<Value>> = values.iter().map(literal_json).collect();
    let literals = literals?;
    let mongo_op = if negated { "$nin" } else { "$in" };
    Some(json!({ name: { mongo_op: literals } }))
}

fn identifier_literal_pair<'a>(left: &'a Expr, right: &'a Expr) -> Option<(&'a str, Value)> {
    match (left, right) {
        (Expr::Identifier { name, .. }, other) => literal_json(other).map(|v| (name.as_str(), v)),
        (other, Expr::Identifier { name, .. }) => literal_json(other).map(|v| (name.as_str(), v)),
        _ => None,
    }
}

fn literal_json(expr: &Expr) -> Option<Value> {
    let Expr::Literal { value, .. } = expr else {
        return None;
    };
    Some(match value {
        LiteralValue::Null => Value::Null,
        LiteralValue::Boolean(b) => json!(*b),
        LiteralValue::Number(n) => json!(*n),
        LiteralValue::BigInt(b) => json!(b.to_string()),
        LiteralValue::String(s) => json!(s),
    })
}

/// Narrow collaborator boundary for actual Parquet row access — file and
/// column-chunk I/O are out of scope (spec.md §1); this adapter only
/// owns the filter-pushdown translation above.
#[async_trait]
pub trait ParquetRowSource: Send + Sync {
    async fn rows_matching(&self, mongo_filter: Option<&Value>) -> Result<Vec<Row>, ExecutorError>;
}

pub struct ParquetFilterAdapter<R: ParquetRowSource> {
    inner: R,
}

impl<R: ParquetRowSource> ParquetFilterAdapter<R> {
    pub fn new(inner: R) -> Self {
        ParquetFilterAdapter { inner }
    }
}

#[async_trait]
impl<R: ParquetRowSource> DataSource for ParquetFilterAdapter<R> {
    async fn scan(&self, hints: &ScanHints) -> Result<ScanResult, ExecutorError> {
        let mongo_filter = hints.where_clause.as_ref().and_then(to_mongo_filter);
        let applied_where = hints.where_clause.is_some() && mongo_filter.is_some();
        let rows = self.inner.rows_matching(mongo_filter.as_ref()).await?;
        let rows: RowStream<'static> = stream::iter(rows.into_iter().map(Ok)).boxed();
        Ok(ScanResult {
            rows,
            applied_where,
            applied_limit_offset: false,
            applied_columns: false,
        })
    }
}
