//! Statement-level recogniser: optional `WITH`, `SELECT` skeleton, joins,
//! and the trailing clauses (spec.md §4.3).

use super::ast::*;
use super::Parser;
use crate::error::ParseError;
use crate::lexer::{NumberValue, TokenKind};
use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Keywords excluded from implicit/`AS`-introduced aliasing
    /// (spec.md §4.3).
    static ref ALIAS_RESERVED: HashSet<&'static str> =
        ["FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET"]
            .into_iter()
            .collect();
}

impl Parser {
    pub(super) fn parse_statement(&mut self) -> Result<SelectStatement, ParseError> {
        let start = self.current().start;
        let with = self.parse_with()?;
        self.expect_keyword("SELECT")?;
        let distinct = self.eat_keyword("DISTINCT");
        let columns = self.parse_select_columns()?;
        self.expect_keyword("FROM")?;
        let from = self.parse_from_source()?;
        let joins = self.parse_joins()?;

        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };

        let having = if self.eat_keyword("HAVING") {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let (limit, offset) = self.parse_limit_offset()?;
        let end = self.previous().unwrap().end;

        Ok(SelectStatement {
            with,
            distinct,
            columns,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
            position_start: start,
            position_end: end,
        })
    }

    fn parse_with(&mut self) -> Result<Option<With>, ParseError> {
        if !self.eat_keyword("WITH") {
            return Ok(None);
        }
        let mut ctes = Vec::new();
        loop {
            // Duplicate CTE names are a semantic, not syntactic, rejection
            // (validator::validate -> SemanticError::DuplicateCte); the
            // parser accepts and records every binding as written.
            let name = self.expect_identifier("CTE name")?;
            self.expect_keyword("AS")?;
            self.expect_lparen()?;
            let query = self.parse_statement()?;
            self.expect_rparen()?;
            ctes.push(Cte {
                name,
                query: Box::new(query),
            });
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Some(With { ctes }))
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>, ParseError> {
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_select_column()?);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_select_column(&mut self) -> Result<SelectColumn, ParseError> {
        if self.check_operator("*") {
            self.advance();
            return Ok(SelectColumn::Star { table: None });
        }

        if let TokenKind::Identifier { name, .. } = self.current().kind.clone() {
            if matches!(self.tokens.get(self.cursor + 1).map(|t| &t.kind), Some(TokenKind::Dot))
                && matches!(
                    self.tokens.get(self.cursor + 2).map(|t| &t.kind),
                    Some(TokenKind::Operator(op)) if op == "*"
                )
            {
                self.advance();
                self.advance();
                self.advance();
                return Ok(SelectColumn::Star { table: Some(name) });
            }
        }

        let expr = self.parse_expr()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.parse_alias_after_as()?)
        } else if matches!(self.current().kind, TokenKind::Identifier { .. }) {
            Some(self.parse_alias_after_as()?)
        } else {
            None
        };
        Ok(SelectColumn::Derived { expr, alias })
    }

    fn parse_alias_after_as(&mut self) -> Result<String, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Identifier { name, .. } => {
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword { normalized, original } => {
                if ALIAS_RESERVED.contains(normalized.as_str()) {
                    Err(self.error_after("alias"))
                } else {
                    self.advance();
                    Ok(original)
                }
            }
            _ => Err(self.error_after("alias")),
        }
    }

    fn parse_from_source(&mut self) -> Result<FromSource, ParseError> {
        if matches!(self.current().kind, TokenKind::LParen) {
            self.advance();
            let query = self.parse_statement()?;
            self.expect_rparen()?;
            self.expect_keyword("AS")?;
            let alias = self.expect_identifier("subquery alias")?;
            return Ok(FromSource::Subquery {
                query: Box::new(query),
                alias,
            });
        }
        // A bare subquery alias (no AS) is also accepted: `(SELECT ..) t`.
        let table = self.expect_identifier("table name")?;
        let alias = self.parse_optional_table_alias()?;
        Ok(FromSource::Table { table, alias })
    }

    fn parse_optional_table_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat_keyword("AS") {
            return Ok(Some(self.expect_identifier("alias")?));
        }
        if matches!(self.current().kind, TokenKind::Identifier { .. }) {
            return Ok(Some(self.expect_identifier("alias")?));
        }
        Ok(None)
    }

    fn parse_joins(&mut self) -> Result<Vec<JoinClause>, ParseError> {
        let mut joins = Vec::new();
        loop {
            let join_type = if self.eat_keyword("INNER") {
                self.expect_keyword("JOIN")?;
                JoinType::Inner
            } else if self.eat_keyword("LEFT") {
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinType::Left
            } else if self.eat_keyword("RIGHT") {
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinType::Right
            } else if self.eat_keyword("FULL") {
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinType::Full
            } else if self.eat_keyword("POSITIONAL") {
                self.expect_keyword("JOIN")?;
                JoinType::Positional
            } else if self.eat_keyword("JOIN") {
                JoinType::Inner
            } else {
                break;
            };

            let table = self.expect_identifier("table name")?;
            let alias = self.parse_optional_table_alias()?;
            let on = if join_type == JoinType::Positional {
                None
            } else {
                self.expect_keyword("ON")?;
                Some(self.parse_expr()?)
            };
            joins.push(JoinClause {
                join_type,
                table,
                alias,
                on,
            });
        }
        Ok(joins)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat_punct(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let direction = if self.eat_keyword("DESC") {
                Direction::Desc
            } else {
                self.eat_keyword("ASC");
                Direction::Asc
            };
            let nulls = if self.eat_keyword("NULLS") {
                if self.eat_keyword("FIRST") {
                    Some(NullsOrder::First)
                } else {
                    self.expect_keyword("LAST")?;
                    Some(NullsOrder::Last)
                }
            } else {
                None
            };
            items.push(OrderByItem {
                expr,
                direction,
                nulls,
            });
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_limit_offset(&mut self) -> Result<(Option<u64>, Option<u64>), ParseError> {
        let limit = if self.eat_keyword("LIMIT") {
            Some(self.parse_numeric_as_u64()?)
        } else {
            None
        };
        let offset = if self.eat_keyword("OFFSET") {
            Some(self.parse_numeric_as_u64()?)
        } else {
            None
        };
        Ok((limit, offset))
    }

    fn parse_numeric_as_u64(&mut self) -> Result<u64, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Number { value, .. } => {
                self.advance();
                match value {
                    NumberValue::Float(f) if f >= 0.0 => Ok(f as u64),
                    NumberValue::BigInt(b) => {
                        use num_traits::ToPrimitive;
                        b.to_u64()
                            .ok_or_else(|| ParseError::at("Expected numeric LIMIT/OFFSET", self.previous().unwrap().start))
                    }
                    _ => Err(ParseError::at(
                        "Expected numeric LIMIT/OFFSET",
                        self.previous().unwrap().start,
                    )),
                }
            }
            _ => Err(ParseError::at(
                "Expected numeric LIMIT/OFFSET",
                self.current().start,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_sql;
    use super::*;

    #[test]
    fn with_clause_allows_duplicate_names_at_parse_time() {
        // Rejected later by validator::validate as SemanticError::DuplicateCte.
        let stmt = parse_sql(
            "WITH a AS (SELECT 1 FROM t), a AS (SELECT 2 FROM t) SELECT * FROM a",
        )
        .unwrap();
        assert_eq!(stmt.with.unwrap().ctes.len(), 2);
    }

    #[test]
    fn implicit_alias_without_as() {
        let stmt = parse_sql("SELECT name alias_name FROM t").unwrap();
        match &stmt.columns[0] {
            SelectColumn::Derived { alias, .. } => assert_eq!(alias.as_deref(), Some("alias_name")),
            _ => panic!("expected derived"),
        }
    }

    #[test]
    fn keyword_alias_after_as_preserves_casing() {
        let stmt = parse_sql("SELECT x AS Count FROM t").unwrap();
        match &stmt.columns[0] {
            SelectColumn::Derived { alias, .. } => assert_eq!(alias.as_deref(), Some("Count")),
            _ => panic!("expected derived"),
        }
    }

    #[test]
    fn qualified_star() {
        let stmt = parse_sql("SELECT t.* FROM t").unwrap();
        assert!(matches!(&stmt.columns[0], SelectColumn::Star { table: Some(t) } if t == "t"));
    }

    #[test]
    fn limit_offset_either_order_supported_forms() {
        let stmt = parse_sql("SELECT * FROM t LIMIT 5 OFFSET 10").unwrap();
        assert_eq!(stmt.limit, Some(5));
        assert_eq!(stmt.offset, Some(10));

        let stmt = parse_sql("SELECT * FROM t OFFSET 3").unwrap();
        assert_eq!(stmt.limit, None);
        assert_eq!(stmt.offset, Some(3));
    }

    #[test]
    fn positional_join_has_no_on() {
        let stmt = parse_sql("SELECT * FROM t POSITIONAL JOIN u").unwrap();
        assert_eq!(stmt.joins[0].join_type, JoinType::Positional);
        assert!(stmt.joins[0].on.is_none());
    }

    #[test]
    fn left_outer_join() {
        let stmt = parse_sql("SELECT * FROM t LEFT OUTER JOIN u ON t.id = u.id").unwrap();
        assert_eq!(stmt.joins[0].join_type, JoinType::Left);
    }

    #[test]
    fn subquery_from_requires_alias() {
        let err = parse_sql("SELECT * FROM (SELECT 1 FROM t)").unwrap_err();
        assert!(err.message.contains("AS"));
    }
}
