//! Semantic validation: runs after parsing and before planning
//! (spec.md §4.4). Unlike the teacher's `Binder`, which resolves and
//! plans in the same pass, validation here is a separate read-only walk
//! over the AST — the planner (`crate::planner`) does the actual
//! lowering to a logical plan afterward.

pub mod functions;

pub use functions::FunctionRegistry;

use crate::error::SemanticError;
use crate::parser::ast::{Expr, FromSource, SelectColumn, SelectStatement};
use std::collections::HashSet;

/// Checks a parsed statement against the rules of spec.md §4.4:
/// - WITH-clause CTE names are unique, case-insensitively.
/// - Every function call resolves to a built-in or a name in `functions`.
/// - Built-ins with a fixed arity are called with the right number of
///   arguments.
///
/// Column resolution is best-effort: an identifier is only flagged as
/// unknown when it carries a table qualifier that matches none of the
/// aliases visible at that point in the query (spec.md §4.4 "validation
/// is best-effort ... schemas are not required inputs").
pub fn validate(stmt: &SelectStatement, functions: &FunctionRegistry) -> Result<(), SemanticError> {
    validate_ctes(stmt)?;
    validate_statement(stmt, functions)
}

fn validate_ctes(stmt: &SelectStatement) -> Result<(), SemanticError> {
    if let Some(with) = &stmt.with {
        let mut seen: HashSet<String> = HashSet::new();
        for cte in &with.ctes {
            if !seen.insert(cte.name.to_uppercase()) {
                return Err(SemanticError::DuplicateCte {
                    name: cte.name.clone(),
                });
            }
            validate_ctes(&cte.query)?;
        }
    }
    Ok(())
}

fn validate_statement(stmt: &SelectStatement, functions: &FunctionRegistry) -> Result<(), SemanticError> {
    let scope = visible_aliases(stmt);

    if let Some(with) = &stmt.with {
        for cte in &with.ctes {
            validate_statement(&cte.query, functions)?;
        }
    }

    for column in &stmt.columns {
        match column {
            SelectColumn::Derived { expr, .. } => validate_expr(expr, functions, &scope)?,
            SelectColumn::Aggregate { arg: Some(arg), .. } => validate_expr(arg, functions, &scope)?,
            SelectColumn::Aggregate { .. } | SelectColumn::Star { .. } => {}
        }
    }

    if let FromSource::Subquery { query, .. } = &stmt.from {
        validate_statement(query, functions)?;
    }
    for join in &stmt.joins {
        if let Some(on) = &join.on {
            validate_expr(on, functions, &scope)?;
        }
    }
    if let Some(where_clause) = &stmt.where_clause {
        validate_expr(where_clause, functions, &scope)?;
    }
    for expr in &stmt.group_by {
        validate_expr(expr, functions, &scope)?;
    }
    if let Some(having) = &stmt.having {
        validate_expr(having, functions, &scope)?;
    }
    for item in &stmt.order_by {
        validate_expr(&item.expr, functions, &scope)?;
    }
    Ok(())
}

/// The set of table names/aliases a WHERE/SELECT/ON/etc. expression may
/// qualify a column with at this nesting level.
fn visible_aliases(stmt: &SelectStatement) -> HashSet<String> {
    let mut aliases = HashSet::new();
    match &stmt.from {
        FromSource::Table { table, alias } => {
            aliases.insert(alias.clone().unwrap_or_else(|| table.clone()));
        }
        FromSource::Subquery { alias, .. } => {
            aliases.insert(alias.clone());
        }
    }
    for join in &stmt.joins {
        aliases.insert(join.alias.clone().unwrap_or_else(|| join.table.clone()));
    }
    if let Some(with) = &stmt.with {
        for cte in &with.ctes {
            aliases.insert(cte.name.clone());
        }
    }
    aliases
}

fn validate_expr(expr: &Expr, functions: &FunctionRegistry, scope: &HashSet<String>) -> Result<(), SemanticError> {
    match expr {
        Expr::Literal { .. } | Expr::Star { .. } => Ok(()),
        Expr::Identifier { name, .. } => validate_identifier(name, scope),
        Expr::Unary { argument, .. } => validate_expr(argument, functions, scope),
        Expr::Binary { left, right, .. } => {
            validate_expr(left, functions, scope)?;
            validate_expr(right, functions, scope)
        }
        Expr::Function {
            name,
            args,
            position_start,
            ..
        } => {
            validate_function_call(name, args.len(), *position_start, functions)?;
            for arg in args {
                validate_expr(arg, functions, scope)?;
            }
            Ok(())
        }
        Expr::Cast { expr, .. } => validate_expr(expr, functions, scope),
        Expr::Case {
            case_expr,
            when_clauses,
            else_result,
            ..
        } => {
            if let Some(case_expr) = case_expr {
                validate_expr(case_expr, functions, scope)?;
            }
            for when in when_clauses {
                validate_expr(&when.condition, functions, scope)?;
                validate_expr(&when.result, functions, scope)?;
            }
            if let Some(else_result) = else_result {
                validate_expr(else_result, functions, scope)?;
            }
            Ok(())
        }
        Expr::Interval { .. } => Ok(()),
        Expr::InSubquery { expr, .. } | Expr::InList { expr, .. } => validate_expr(expr, functions, scope),
        Expr::Exists { .. } | Expr::NotExists { .. } => Ok(()),
    }
}

fn validate_identifier(name: &str, scope: &HashSet<String>) -> Result<(), SemanticError> {
    if scope.is_empty() {
        return Ok(());
    }
    if let Some((qualifier, _)) = name.split_once('.') {
        if !scope.contains(qualifier) {
            return Err(SemanticError::UnknownColumn { name: name.to_string() });
        }
    }
    Ok(())
}

fn validate_function_call(
    name: &str,
    arg_count: usize,
    position: usize,
    functions: &FunctionRegistry,
) -> Result<(), SemanticError> {
    let upper = name.to_uppercase();
    if let Some(arity) = functions::fixed_arity(&upper) {
        if !arity.contains(&arg_count) {
            return Err(SemanticError::arity(upper, *arity.start(), arg_count));
        }
        return Ok(());
    }
    if functions::is_known_builtin(&upper) || functions.contains(&upper) || functions.contains(name) {
        return Ok(());
    }
    Err(SemanticError::UnknownFunction {
        name: name.to_string(),
        position,
    })
}

/// True when any SELECT/HAVING expression in `stmt` contains an aggregate
/// call, used by the planner (spec.md §4.5 step 6) to choose between
/// `HashAggregate`/`ScalarAggregate` and a plain `Project`.
pub fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function { name, .. } if functions::is_aggregate_name(&name.to_uppercase()) => true,
        Expr::Function { args, .. } => args.iter().any(contains_aggregate),
        Expr::Unary { argument, .. } => contains_aggregate(argument),
        Expr::Binary { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        Expr::Cast { expr, .. } => contains_aggregate(expr),
        Expr::Case {
            case_expr,
            when_clauses,
            else_result,
            ..
        } => {
            case_expr.as_deref().map(contains_aggregate).unwrap_or(false)
                || when_clauses
                    .iter()
                    .any(|w| contains_aggregate(&w.condition) || contains_aggregate(&w.result))
                || else_result.as_deref().map(contains_aggregate).unwrap_or(false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;

    #[test]
    fn rejects_duplicate_cte_names() {
        let stmt = parse_sql("WITH a AS (SELECT 1 FROM t), a AS (SELECT 2 FROM t) SELECT * FROM a").unwrap();
        let err = validate(&stmt, &FunctionRegistry::empty()).unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateCte { name } if name == "a"));
    }

    #[test]
    fn rejects_unknown_function() {
        let stmt = parse_sql("SELECT FROBNICATE(x) FROM t").unwrap();
        let err = validate(&stmt, &FunctionRegistry::empty()).unwrap_err();
        assert!(matches!(err, SemanticError::UnknownFunction { name, .. } if name == "FROBNICATE"));
    }

    #[test]
    fn rejects_wrong_arity() {
        let stmt = parse_sql("SELECT UPPER(x, y) FROM t").unwrap();
        let err = validate(&stmt, &FunctionRegistry::empty()).unwrap_err();
        assert!(matches!(err, SemanticError::Arity { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn accepts_caller_supplied_function() {
        let stmt = parse_sql("SELECT MY_UDF(x) FROM t").unwrap();
        let functions = FunctionRegistry::from_names(["MY_UDF"]);
        validate(&stmt, &functions).unwrap();
    }

    #[test]
    fn substring_accepts_two_or_three_args() {
        let stmt = parse_sql("SELECT SUBSTRING(x, 1) FROM t").unwrap();
        validate(&stmt, &FunctionRegistry::empty()).unwrap();
        let stmt = parse_sql("SELECT SUBSTRING(x, 1, 3) FROM t").unwrap();
        validate(&stmt, &FunctionRegistry::empty()).unwrap();
        let stmt = parse_sql("SELECT SUBSTRING(x) FROM t").unwrap();
        validate(&stmt, &FunctionRegistry::empty()).unwrap_err();
    }

    #[test]
    fn unknown_column_qualifier_is_rejected() {
        let stmt = parse_sql("SELECT missing.x FROM t").unwrap();
        let err = validate(&stmt, &FunctionRegistry::empty()).unwrap_err();
        assert!(matches!(err, SemanticError::UnknownColumn { .. }));
    }

    #[test]
    fn contains_aggregate_detects_nested_call() {
        let stmt = parse_sql("SELECT city, COUNT(*) AS n FROM users GROUP BY city HAVING COUNT(*) > 1").unwrap();
        let having = stmt.having.unwrap();
        assert!(contains_aggregate(&having));
    }
}
