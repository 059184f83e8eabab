//! Logical planner (spec.md §4.5): rewrites a validated `SelectStatement`
//! into a `LogicalPlan` tree bottom-up. Unlike the teacher's `HepOptimizer`
//! (a pattern-matching rewrite engine applied to an already-built plan),
//! this planner is a single fixed pass — spec.md describes one ordered
//! sequence of construction steps, not an extensible rule set, so the
//! Hep graph/pattern/rule machinery has no counterpart here (see
//! DESIGN.md).

pub mod cost;

use crate::parser::ast::{
    BinaryOp, Expr, FromSource, JoinClause, JoinType, OrderByItem, SelectColumn, SelectStatement,
};
use crate::validator::contains_aggregate;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanHints {
    /// `None` means "all columns"; spec.md §3.4.
    pub columns: Option<Vec<String>>,
    pub where_clause: Option<Expr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Option<Vec<OrderByItem>>,
}

/// One output column of a `Project`/aggregate node: the expression to
/// evaluate and the name it is emitted under. `AllColumns`/`TableColumns`
/// carry no single expression — they expand against the row at
/// execution time (spec.md §4.7 Project contract).
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectColumn {
    AllColumns,
    TableColumns(String),
    Expr { expr: Expr, output_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    Scan {
        table: String,
        alias: Option<String>,
        hints: ScanHints,
    },
    SubqueryScan {
        subquery: Box<LogicalPlan>,
        alias: String,
    },
    Filter {
        condition: Expr,
        child: Box<LogicalPlan>,
    },
    Project {
        columns: Vec<ProjectColumn>,
        child: Box<LogicalPlan>,
    },
    HashJoin {
        join_type: JoinType,
        left_key: Expr,
        right_key: Expr,
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    NestedLoopJoin {
        join_type: JoinType,
        condition: Option<Expr>,
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    PositionalJoin {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    HashAggregate {
        group_by: Vec<Expr>,
        columns: Vec<ProjectColumn>,
        having: Option<Expr>,
        child: Box<LogicalPlan>,
    },
    ScalarAggregate {
        columns: Vec<ProjectColumn>,
        having: Option<Expr>,
        child: Box<LogicalPlan>,
    },
    Sort {
        order_by: Vec<OrderByItem>,
        aliases: HashMap<String, Expr>,
        child: Box<LogicalPlan>,
    },
    Distinct {
        child: Box<LogicalPlan>,
    },
    Limit {
        limit: Option<u64>,
        offset: Option<u64>,
        child: Box<LogicalPlan>,
    },
}

impl LogicalPlan {
    pub fn child(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::Filter { child, .. }
            | LogicalPlan::Project { child, .. }
            | LogicalPlan::HashAggregate { child, .. }
            | LogicalPlan::ScalarAggregate { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Distinct { child }
            | LogicalPlan::Limit { child, .. } => Some(child),
            _ => None,
        }
    }
}

/// Plans a top-level statement (spec.md §6.1 `queryPlan`). CTEs bound by
/// an outer `WITH` are resolved against `FROM`/join table references by
/// case-insensitive name (spec.md §4.5 step 2); nested WITH clauses on
/// subqueries are resolved independently when that subquery is planned.
pub fn plan(stmt: &SelectStatement) -> LogicalPlan {
    let ctes = collect_ctes(stmt);
    plan_select(stmt, &ctes)
}

fn collect_ctes(stmt: &SelectStatement) -> HashMap<String, SelectStatement> {
    let mut map = HashMap::new();
    if let Some(with) = &stmt.with {
        for cte in &with.ctes {
            map.insert(cte.name.to_uppercase(), (*cte.query).clone());
        }
    }
    map
}

fn plan_select(stmt: &SelectStatement, ctes: &HashMap<String, SelectStatement>) -> LogicalPlan {
    // Step 1 + 2: FROM source, resolving CTE references.
    let (mut plan, mut aliases) = plan_from(&stmt.from, ctes);

    // Step 3: joins.
    for join in &stmt.joins {
        let (next_plan, next_aliases) = plan_join(plan, &aliases, join, ctes);
        plan = next_plan;
        aliases = next_aliases;
    }

    // Step 4: WHERE pushdown.
    if let Some(where_clause) = &stmt.where_clause {
        plan = push_where(plan, where_clause.clone());
    }

    // Step 5: column pruning (scan hint only; Project is added after
    // aggregation is decided, since an aggregate node supplies its own
    // final projection — see DESIGN.md "no redundant Project over
    // Aggregate").
    let referenced = referenced_columns(stmt);
    plan = prune_scan_columns(plan, &referenced, is_select_star(stmt));

    // Step 6: aggregation.
    let is_aggregated = !stmt.group_by.is_empty() || select_has_aggregate(stmt);
    let project_columns = build_project_columns(stmt);
    if is_aggregated {
        plan = if !stmt.group_by.is_empty() {
            LogicalPlan::HashAggregate {
                group_by: stmt.group_by.clone(),
                columns: project_columns,
                having: stmt.having.clone(),
                child: Box::new(plan),
            }
        } else {
            LogicalPlan::ScalarAggregate {
                columns: project_columns,
                having: stmt.having.clone(),
                child: Box::new(plan),
            }
        };
    } else {
        plan = LogicalPlan::Project {
            columns: project_columns,
            child: Box::new(plan),
        };
    }

    // Step 7: ORDER BY / DISTINCT / LIMIT.
    if !stmt.order_by.is_empty() {
        let aliases_map = alias_map(stmt);
        let sort_needs_aliases = stmt
            .order_by
            .iter()
            .any(|item| order_by_references_alias(&item.expr, &aliases_map));
        let sort = LogicalPlan::Sort {
            order_by: stmt.order_by.clone(),
            aliases: aliases_map,
            child: Box::new(plan),
        };
        plan = if sort_needs_aliases {
            sort
        } else {
            place_sort_below_project(sort)
        };
    }

    if stmt.distinct {
        plan = LogicalPlan::Distinct { child: Box::new(plan) };
    }

    if stmt.limit.is_some() || stmt.offset.is_some() {
        plan = push_limit(plan, stmt.limit, stmt.offset, !stmt.order_by.is_empty());
    }

    plan
}

fn plan_from(from: &FromSource, ctes: &HashMap<String, SelectStatement>) -> (LogicalPlan, Vec<String>) {
    match from {
        FromSource::Table { table, alias } => {
            if let Some(cte_stmt) = ctes.get(&table.to_uppercase()) {
                let inner = plan_select(cte_stmt, ctes);
                let bound_alias = alias.clone().unwrap_or_else(|| table.clone());
                (
                    LogicalPlan::SubqueryScan {
                        subquery: Box::new(inner),
                        alias: bound_alias.clone(),
                    },
                    vec![bound_alias],
                )
            } else {
                let bound_alias = alias.clone().unwrap_or_else(|| table.clone());
                (
                    LogicalPlan::Scan {
                        table: table.clone(),
                        alias: alias.clone(),
                        hints: ScanHints::default(),
                    },
                    vec![bound_alias],
                )
            }
        }
        FromSource::Subquery { query, alias } => {
            let inner = plan_select(query, ctes);
            (
                LogicalPlan::SubqueryScan {
                    subquery: Box::new(inner),
                    alias: alias.clone(),
                },
                vec![alias.clone()],
            )
        }
    }
}

/// Picks `HashJoin` when the ON condition is a single equality between two
/// identifiers that each unambiguously reference one side (spec.md §4.5
/// step 3); falls back to `NestedLoopJoin` whenever a side can't be
/// determined, e.g. an unqualified column name (a conservative choice,
/// recorded in DESIGN.md, since the spec's "side-of-reference" rule
/// presumes a qualifier to test against).
fn plan_join(
    left: LogicalPlan,
    left_aliases: &[String],
    join: &JoinClause,
    ctes: &HashMap<String, SelectStatement>,
) -> (LogicalPlan, Vec<String>) {
    let (right, right_aliases) = plan_from(
        &FromSource::Table {
            table: join.table.clone(),
            alias: join.alias.clone(),
        },
        ctes,
    );

    if join.join_type == JoinType::Positional {
        let mut combined = left_aliases.to_vec();
        combined.extend(right_aliases);
        return (
            LogicalPlan::PositionalJoin {
                left: Box::new(left),
                right: Box::new(right),
            },
            combined,
        );
    }

    let mut combined = left_aliases.to_vec();
    combined.extend(right_aliases.clone());

    if let Some(on) = &join.on {
        if let Some((left_key, right_key)) = equality_join_keys(on, left_aliases, &right_aliases) {
            return (
                LogicalPlan::HashJoin {
                    join_type: join.join_type,
                    left_key,
                    right_key,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                combined,
            );
        }
    }

    combined.dedup();
    (
        LogicalPlan::NestedLoopJoin {
            join_type: join.join_type,
            condition: join.on.clone(),
            left: Box::new(left),
            right: Box::new(right),
        },
        combined,
    )
}

fn equality_join_keys(on: &Expr, left_aliases: &[String], right_aliases: &[String]) -> Option<(Expr, Expr)> {
    let Expr::Binary {
        op: BinaryOp::Eq,
        left,
        right,
        ..
    } = on
    else {
        return None;
    };
    let (Expr::Identifier { name: a, .. }, Expr::Identifier { name: b, .. }) = (left.as_ref(), right.as_ref()) else {
        return None;
    };
    let qual_a = qualifier(a);
    let qual_b = qualifier(b);
    let a_is_left = qual_a.map(|q| left_aliases.iter().any(|al| al == q)).unwrap_or(false);
    let a_is_right = qual_a.map(|q| right_aliases.iter().any(|al| al == q)).unwrap_or(false);
    let b_is_left = qual_b.map(|q| left_aliases.iter().any(|al| al == q)).unwrap_or(false);
    let b_is_right = qual_b.map(|q| right_aliases.iter().any(|al| al == q)).unwrap_or(false);

    if a_is_left && b_is_right {
        Some((left.as_ref().clone(), right.as_ref().clone()))
    } else if a_is_right && b_is_left {
        Some((right.as_ref().clone(), left.as_ref().clone()))
    } else {
        None
    }
}

fn qualifier(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(q, _)| q)
}

/// Step 4: attach `WHERE` to a bare `Scan`'s hints, else wrap in `Filter`.
fn push_where(plan: LogicalPlan, condition: Expr) -> LogicalPlan {
    match plan {
        LogicalPlan::Scan { table, alias, mut hints } => {
            hints.where_clause = Some(condition);
            LogicalPlan::Scan { table, alias, hints }
        }
        other => LogicalPlan::Filter {
            condition,
            child: Box::new(other),
        },
    }
}

/// Step 5: pushes the column-pruning set into a bare `Scan`'s hints.
fn prune_scan_columns(plan: LogicalPlan, referenced: &[String], is_star: bool) -> LogicalPlan {
    match plan {
        LogicalPlan::Scan { table, alias, mut hints } if !is_star => {
            hints.columns = Some(referenced.to_vec());
            LogicalPlan::Scan { table, alias, hints }
        }
        other => other,
    }
}

/// True when any output column is a `*`/`t.*` expansion, full or
/// table-qualified — either way the full set of source columns is needed
/// downstream, so column pruning (step 5) must not run at all.
fn is_select_star(stmt: &SelectStatement) -> bool {
    stmt.columns.iter().any(|c| matches!(c, SelectColumn::Star { .. }))
}

fn select_has_aggregate(stmt: &SelectStatement) -> bool {
    let in_columns = stmt.columns.iter().any(|c| match c {
        SelectColumn::Derived { expr, .. } => contains_aggregate(expr),
        SelectColumn::Aggregate { .. } => true,
        SelectColumn::Star { .. } => false,
    });
    let in_having = stmt.having.as_ref().map(contains_aggregate).unwrap_or(false);
    in_columns || in_having
}

/// Every column referenced anywhere in the statement (spec.md §4.5 step
/// 5): SELECT, WHERE, GROUP BY, HAVING, ORDER BY, join keys. Also reused
/// by `planner::cost` as the "accessed columns" set of spec.md §4.9.
pub(crate) fn referenced_columns(stmt: &SelectStatement) -> Vec<String> {
    let mut names = Vec::new();
    for col in &stmt.columns {
        match col {
            SelectColumn::Star { .. } => {}
            SelectColumn::Derived { expr, .. } => collect_identifiers(expr, &mut names),
            SelectColumn::Aggregate { arg, .. } => {
                if let Some(e) = arg {
                    collect_identifiers(e, &mut names);
                }
            }
        }
    }
    if let Some(e) = &stmt.where_clause {
        collect_identifiers(e, &mut names);
    }
    for e in &stmt.group_by {
        collect_identifiers(e, &mut names);
    }
    if let Some(e) = &stmt.having {
        collect_identifiers(e, &mut names);
    }
    for item in &stmt.order_by {
        collect_identifiers(&item.expr, &mut names);
    }
    for join in &stmt.joins {
        if let Some(on) = &join.on {
            collect_identifiers(on, &mut names);
        }
    }
    names.sort();
    names.dedup();
    names
}

fn collect_identifiers(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Identifier { name, .. } => out.push(name.clone()),
        Expr::Unary { argument, .. } => collect_identifiers(argument, out),
        Expr::Binary { left, right, .. } => {
            collect_identifiers(left, out);
            collect_identifiers(right, out);
        }
        Expr::Function { args, .. } => args.iter().for_each(|a| collect_identifiers(a, out)),
        Expr::Cast { expr, .. } => collect_identifiers(expr, out),
        Expr::Case {
            case_expr,
            when_clauses,
            else_result,
            ..
        } => {
            if let Some(e) = case_expr.as_deref() {
                collect_identifiers(e, out);
            }
            for clause in when_clauses {
                collect_identifiers(&clause.condition, out);
                collect_identifiers(&clause.result, out);
            }
            if let Some(e) = else_result.as_deref() {
                collect_identifiers(e, out);
            }
        }
        Expr::InList { expr, values, .. } => {
            collect_identifiers(expr, out);
            values.iter().for_each(|v| collect_identifiers(v, out));
        }
        Expr::InSubquery { expr, .. } => collect_identifiers(expr, out),
        Expr::Literal { .. } | Expr::Star { .. } | Expr::Interval { .. } | Expr::Exists { .. } | Expr::NotExists { .. } => {}
    }
}

fn build_project_columns(stmt: &SelectStatement) -> Vec<ProjectColumn> {
    stmt.columns
        .iter()
        .map(|col| match col {
            SelectColumn::Star { table: None } => ProjectColumn::AllColumns,
            SelectColumn::Star { table: Some(t) } => ProjectColumn::TableColumns(t.clone()),
            SelectColumn::Derived { expr, alias } => {
                let output_name = alias.clone().unwrap_or_else(|| default_column_name(expr));
                ProjectColumn::Expr {
                    expr: expr.clone(),
                    output_name,
                }
            }
            SelectColumn::Aggregate { func, arg, alias } => {
                let args = match arg {
                    Some(e) => vec![e.clone()],
                    None => vec![Expr::Star {
                        position_start: 0,
                        position_end: 0,
                    }],
                };
                let synthetic_expr = Expr::Function {
                    name: func.clone(),
                    args,
                    distinct: false,
                    position_start: 0,
                    position_end: 0,
                };
                let output_name = alias.clone().unwrap_or_else(|| func.clone());
                ProjectColumn::Expr {
                    expr: synthetic_expr,
                    output_name,
                }
            }
        })
        .collect()
}

/// Output column name for an unaliased SELECT item: the bare identifier
/// name, or the function name for a call, matching the teacher's
/// convention of naming derived columns after their syntax.
fn default_column_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier { name, .. } => crate::row::Row::bare_name(name).to_string(),
        Expr::Function { name, .. } => name.clone(),
        _ => crate::eval::render_expr(expr),
    }
}

fn alias_map(stmt: &SelectStatement) -> HashMap<String, Expr> {
    let mut map = HashMap::new();
    for col in &stmt.columns {
        if let SelectColumn::Derived { expr, alias: Some(alias) } = col {
            map.insert(alias.clone(), expr.clone());
        }
    }
    map
}

fn order_by_references_alias(expr: &Expr, aliases: &HashMap<String, Expr>) -> bool {
    match expr {
        Expr::Identifier { name, .. } => aliases.contains_key(name),
        _ => false,
    }
}

/// Re-roots a freshly built `Sort { child: Project { .. } }` so `Sort`
/// sits under `Project` instead (spec.md §4.5 step 7, "otherwise place
/// Sort below Project so pruning applies").
fn place_sort_below_project(sort: LogicalPlan) -> LogicalPlan {
    let LogicalPlan::Sort { order_by, aliases, child } = sort else {
        return sort;
    };
    match *child {
        LogicalPlan::Project { columns, child: inner } => LogicalPlan::Project {
            columns,
            child: Box::new(LogicalPlan::Sort {
                order_by,
                aliases,
                child: inner,
            }),
        },
        other => LogicalPlan::Sort {
            order_by,
            aliases,
            child: Box::new(other),
        },
    }
}

/// Step 7 LIMIT placement: pushed into a bare `Scan`'s hints only when
/// there is no `ORDER BY` above it and the plan is a plain `Scan`, one
/// `Project` away from one. By the time this runs, step 6 has already
/// wrapped every non-aggregated query in a `Project`, so `plan` itself is
/// never a bare `Scan` here — this needs to dig one level into `Project`'s
/// `child` first, the same way `place_sort_below_project` digs through
/// `Project` to re-root `Sort` underneath it. Anything else (DISTINCT,
/// HashAggregate/ScalarAggregate, a join, …) wraps the whole plan in
/// `Limit` instead.
fn push_limit(plan: LogicalPlan, limit: Option<u64>, offset: Option<u64>, has_order_by: bool) -> LogicalPlan {
    if has_order_by {
        return LogicalPlan::Limit {
            limit,
            offset,
            child: Box::new(plan),
        };
    }
    match plan {
        LogicalPlan::Scan { table, alias, mut hints } => {
            hints.limit = limit;
            hints.offset = offset;
            LogicalPlan::Scan { table, alias, hints }
        }
        LogicalPlan::Project { columns, child } => match *child {
            LogicalPlan::Scan { table, alias, mut hints } => {
                hints.limit = limit;
                hints.offset = offset;
                LogicalPlan::Project {
                    columns,
                    child: Box::new(LogicalPlan::Scan { table, alias, hints }),
                }
            }
            other => LogicalPlan::Limit {
                limit,
                offset,
                child: Box::new(LogicalPlan::Project {
                    columns,
                    child: Box::new(other),
                }),
            },
        },
        other => LogicalPlan::Limit {
            limit,
            offset,
            child: Box::new(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;

    #[test]
    fn where_pushes_into_bare_scan() {
        let stmt = parse_sql("SELECT name FROM users WHERE age > 28").unwrap();
        let plan = plan(&stmt);
        match plan {
            LogicalPlan::Project { child, .. } => match *child {
                LogicalPlan::Scan { hints, .. } => assert!(hints.where_clause.is_some()),
                other => panic!("expected scan, got {other:?}"),
            },
            other => panic!("expected project, got {other:?}"),
        }
    }

    #[test]
    fn equi_join_on_qualified_columns_becomes_hash_join() {
        let stmt = parse_sql("SELECT * FROM orders o JOIN users u ON o.user_id = u.id").unwrap();
        let plan = plan(&stmt);
        let LogicalPlan::Project { child, .. } = plan else {
            panic!("expected project");
        };
        assert!(matches!(*child, LogicalPlan::HashJoin { .. }));
    }

    #[test]
    fn group_by_produces_hash_aggregate_without_extra_project() {
        let stmt = parse_sql("SELECT city, COUNT(*) AS n FROM users GROUP BY city").unwrap();
        let plan = plan(&stmt);
        assert!(matches!(plan, LogicalPlan::HashAggregate { .. }));
    }

    #[test]
    fn limit_with_no_order_by_pushes_into_scan() {
        let stmt = parse_sql("SELECT * FROM users LIMIT 5").unwrap();
        let plan = plan(&stmt);
        let LogicalPlan::Project { child, .. } = plan else {
            panic!("expected project");
        };
        match *child {
            LogicalPlan::Scan { hints, .. } => assert_eq!(hints.limit, Some(5)),
            other => panic!("expected scan, got {other:?}"),
        }
    }

    #[test]
    fn limit_with_order_by_wraps_in_limit_node() {
        let stmt = parse_sql("SELECT * FROM users ORDER BY age LIMIT 5").unwrap();
        let plan = plan(&stmt);
        assert!(matches!(plan, LogicalPlan::Limit { .. }));
    }
}
