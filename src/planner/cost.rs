//! Advisory cost estimator (spec.md §4.9): a heuristic byte-cost over a
//! query and a per-table statistics map, never consulted by the planner
//! itself — callers use it to choose between equivalent queries or
//! sources, not the other way around.

use crate::parser::ast::{FromSource, SelectStatement};
use std::collections::HashMap;

/// Per-source advisory statistics (spec.md §4.9 "the `statistics`
/// optional field on each source"): row count and a per-column byte
/// weight used to price SELECT/WHERE/GROUP BY/ORDER BY/JOIN-key access.
#[derive(Debug, Clone, Default)]
pub struct TableStatistics {
    pub row_count: u64,
    pub column_weights: HashMap<String, u64>,
}

/// `estimateCost({query, tables})` (spec.md §6.1/§4.9): `None`
/// ("UNDEFINED") when any table participating in the query — named
/// directly in `FROM`/`JOIN`, not a subquery or CTE alias, since those
/// carry no statistics of their own — is missing from `tables`.
pub fn estimate_cost(stmt: &SelectStatement, tables: &HashMap<String, TableStatistics>) -> Option<f64> {
    let mut participating = Vec::new();
    collect_participating_tables(stmt, &mut participating)?;

    let accessed = super::referenced_columns(stmt);
    let single_table_limit_pushed = stmt.joins.is_empty() && stmt.order_by.is_empty() && stmt.where_clause.is_none();

    let mut total = 0.0f64;
    for table in &participating {
        let stats = tables.get(table)?;
        let mut row_count = stats.row_count as f64;
        if single_table_limit_pushed {
            if let Some(limit) = stmt.limit {
                row_count = row_count.min(limit as f64);
            }
        }
        let column_cost: u64 = accessed
            .iter()
            .filter_map(|col| {
                let bare = crate::row::Row::bare_name(col);
                stats.column_weights.get(col).or_else(|| stats.column_weights.get(bare))
            })
            .sum();
        total += row_count * column_cost as f64;
    }
    Some(total)
}

fn collect_participating_tables(stmt: &SelectStatement, out: &mut Vec<String>) -> Option<()> {
    match &stmt.from {
        FromSource::Table { table, .. } => out.push(table.clone()),
        FromSource::Subquery { .. } => return None,
    }
    for join in &stmt.joins {
        out.push(join.table.clone());
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;

    #[test]
    fn undefined_cost_without_statistics() {
        let stmt = parse_sql("SELECT name FROM users").unwrap();
        let tables = HashMap::new();
        assert_eq!(estimate_cost(&stmt, &tables), None);
    }

    #[test]
    fn cost_scales_with_row_count_and_column_weight() {
        let stmt = parse_sql("SELECT name FROM users").unwrap();
        let mut tables = HashMap::new();
        tables.insert(
            "users".to_string(),
            TableStatistics {
                row_count: 1000,
                column_weights: [("name".to_string(), 8)].into_iter().collect(),
            },
        );
        assert_eq!(estimate_cost(&stmt, &tables), Some(8000.0));
    }

    #[test]
    fn limit_reduces_row_count_when_no_order_by_or_where() {
        let stmt = parse_sql("SELECT name FROM users LIMIT 10").unwrap();
        let mut tables = HashMap::new();
        tables.insert(
            "users".to_string(),
            TableStatistics {
                row_count: 1000,
                column_weights: [("name".to_string(), 8)].into_iter().collect(),
            },
        );
        assert_eq!(estimate_cost(&stmt, &tables), Some(80.0));
    }

    #[test]
    fn subquery_from_source_is_undefined() {
        let stmt = parse_sql("SELECT name FROM (SELECT name FROM users) t").unwrap();
        let tables = HashMap::new();
        assert_eq!(estimate_cost(&stmt, &tables), None);
    }
}
