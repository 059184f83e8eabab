//! Pratt-style expression parser (spec.md §4.2). Precedence, low to high:
//! `OR`, `AND`, `NOT` (prefix), comparison (`= != <> < <= > >= LIKE IS
//! BETWEEN IN`), additive (`+ -  ||`), multiplicative (`* / %`), unary `-`,
//! primary.

use super::ast::*;
use super::Parser;
use crate::error::ParseError;
use crate::lexer::{NumberValue, TokenKind};

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            let start = left.position_start();
            let end = right.position_end();
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                position_start: start,
                position_end: end,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            let start = left.position_start();
            let end = right.position_end();
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                position_start: start,
                position_end: end,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check_keyword("NOT") {
            if self.peek_is_keyword_at(1, "EXISTS") {
                let not_start = self.current().start;
                self.advance(); // NOT
                self.advance(); // EXISTS
                self.expect_lparen()?;
                let subquery = self.parse_statement()?;
                let end_tok_end = self.current().end;
                self.expect_rparen()?;
                return Ok(Expr::NotExists {
                    subquery: Box::new(subquery),
                    position_start: not_start,
                    position_end: end_tok_end,
                });
            }
            let not_start = self.current().start;
            self.advance();
            let argument = self.parse_not()?;
            let end = argument.position_end();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                argument: Box::new(argument),
                position_start: not_start,
                position_end: end,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        if let Some(op) = self.peek_comparison_operator() {
            self.advance();
            let right = self.parse_additive()?;
            let start = left.position_start();
            let end = right.position_end();
            return Ok(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position_start: start,
                position_end: end,
            });
        }

        if self.check_keyword("LIKE") {
            self.advance();
            let right = self.parse_additive()?;
            let start = left.position_start();
            let end = right.position_end();
            return Ok(Expr::Binary {
                op: BinaryOp::Like,
                left: Box::new(left),
                right: Box::new(right),
                position_start: start,
                position_end: end,
            });
        }

        if self.check_keyword("IS") {
            self.advance();
            let is_not = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            let end = self.previous().unwrap().end;
            let start = left.position_start();
            return Ok(Expr::Unary {
                op: if is_not { UnaryOp::IsNotNull } else { UnaryOp::IsNull },
                argument: Box::new(left),
                position_start: start,
                position_end: end,
            });
        }

        if self.check_keyword("BETWEEN") {
            let start = left.position_start();
            self.advance();
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            let end = high.position_end();
            // x BETWEEN a AND b -> (x >= a) AND (x <= b)
            return Ok(Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::GtEq,
                    left: Box::new(left.clone()),
                    right: Box::new(low),
                    position_start: start,
                    position_end: end,
                }),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::LtEq,
                    left: Box::new(left),
                    right: Box::new(high),
                    position_start: start,
                    position_end: end,
                }),
                position_start: start,
                position_end: end,
            });
        }

        if self.check_keyword("NOT") && self.peek_is_keyword_at(1, "BETWEEN") {
            self.advance(); // NOT
            // Deliberately preserved quirk (spec.md §9): the outer node's
            // positionStart is the BETWEEN keyword's start, not `left`'s.
            let between_start = self.current().start;
            self.advance(); // BETWEEN
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            let end = high.position_end();
            // x NOT BETWEEN a AND b -> (x < a) OR (x > b)
            return Ok(Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Lt,
                    left: Box::new(left.clone()),
                    right: Box::new(low),
                    position_start: between_start,
                    position_end: end,
                }),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Gt,
                    left: Box::new(left),
                    right: Box::new(high),
                    position_start: between_start,
                    position_end: end,
                }),
                position_start: between_start,
                position_end: end,
            });
        }

        if self.check_keyword("IN") || (self.check_keyword("NOT") && self.peek_is_keyword_at(1, "IN")) {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("IN")?;
            return self.parse_in_rhs(left, negated);
        }

        Ok(left)
    }

    fn parse_in_rhs(&mut self, expr: Expr, negated: bool) -> Result<Expr, ParseError> {
        let start = expr.position_start();
        self.expect_lparen()?;
        if self.check_keyword("SELECT") {
            let subquery = self.parse_statement()?;
            let end = self.current().end;
            self.expect_rparen()?;
            return Ok(Expr::InSubquery {
                expr: Box::new(expr),
                subquery: Box::new(subquery),
                negated,
                position_start: start,
                position_end: end,
            });
        }

        let mut values = Vec::new();
        if !matches!(self.current().kind, TokenKind::RParen) {
            loop {
                values.push(self.parse_literal()?);
                if !self.eat_punct(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = self.current().end;
        self.expect_rparen()?;
        Ok(Expr::InList {
            expr: Box::new(expr),
            values,
            negated,
            position_start: start,
            position_end: end,
        })
    }

    fn peek_comparison_operator(&self) -> Option<BinaryOp> {
        match &self.current().kind {
            TokenKind::Operator(op) => match op.as_str() {
                "=" => Some(BinaryOp::Eq),
                "!=" | "<>" => Some(BinaryOp::NotEq),
                "<" => Some(BinaryOp::Lt),
                "<=" => Some(BinaryOp::LtEq),
                ">" => Some(BinaryOp::Gt),
                ">=" => Some(BinaryOp::GtEq),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Operator(op) if op == "+" => Some(BinaryOp::Add),
                TokenKind::Operator(op) if op == "-" => Some(BinaryOp::Sub),
                TokenKind::Operator(op) if op == "||" => Some(BinaryOp::Concat),
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let right = self.parse_multiplicative()?;
            let start = left.position_start();
            let end = right.position_end();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position_start: start,
                position_end: end,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Operator(op) if op == "*" => Some(BinaryOp::Mul),
                TokenKind::Operator(op) if op == "/" => Some(BinaryOp::Div),
                TokenKind::Operator(op) if op == "%" => Some(BinaryOp::Mod),
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let right = self.parse_unary()?;
            let start = left.position_start();
            let end = right.position_end();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position_start: start,
                position_end: end,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check_operator("-") {
            let start = self.current().start;
            self.advance();
            let argument = self.parse_unary()?;
            let end = argument.position_end();
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                argument: Box::new(argument),
                position_start: start,
                position_end: end,
            });
        }
        self.parse_primary()
    }

    fn parse_literal(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_unary()?;
        match &expr {
            Expr::Literal { .. } => Ok(expr),
            _ => Err(ParseError::new(
                "Expected literal in IN value list",
                expr.position_start(),
                expr.position_end(),
            )),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().start;

        match self.current().kind.clone() {
            TokenKind::Number { value, .. } => {
                self.advance();
                let end = self.previous().unwrap().end;
                let lit = match value {
                    NumberValue::Float(f) => LiteralValue::Number(f),
                    NumberValue::BigInt(b) => LiteralValue::BigInt(b),
                };
                Ok(Expr::Literal {
                    value: lit,
                    position_start: start,
                    position_end: end,
                })
            }
            TokenKind::String(s) => {
                self.advance();
                let end = self.previous().unwrap().end;
                Ok(Expr::Literal {
                    value: LiteralValue::String(s),
                    position_start: start,
                    position_end: end,
                })
            }
            TokenKind::Operator(op) if op == "*" => {
                self.advance();
                let end = self.previous().unwrap().end;
                Ok(Expr::Star {
                    position_start: start,
                    position_end: end,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            TokenKind::Keyword { normalized, .. } => self.parse_keyword_primary(&normalized, start),
            TokenKind::Identifier { name, .. } => {
                self.advance();
                self.parse_identifier_or_call(name, start)
            }
            _ => Err(self.error_after("expression")),
        }
    }

    fn parse_keyword_primary(&mut self, normalized: &str, start: usize) -> Result<Expr, ParseError> {
        match normalized {
            "NULL" => {
                self.advance();
                let end = self.previous().unwrap().end;
                Ok(Expr::Literal {
                    value: LiteralValue::Null,
                    position_start: start,
                    position_end: end,
                })
            }
            "TRUE" => {
                self.advance();
                let end = self.previous().unwrap().end;
                Ok(Expr::Literal {
                    value: LiteralValue::Boolean(true),
                    position_start: start,
                    position_end: end,
                })
            }
            "FALSE" => {
                self.advance();
                let end = self.previous().unwrap().end;
                Ok(Expr::Literal {
                    value: LiteralValue::Boolean(false),
                    position_start: start,
                    position_end: end,
                })
            }
            "CASE" => self.parse_case(start),
            "CAST" => self.parse_cast(start),
            "INTERVAL" => self.parse_interval(start),
            "EXISTS" => {
                self.advance();
                self.expect_lparen()?;
                let subquery = self.parse_statement()?;
                let end = self.current().end;
                self.expect_rparen()?;
                Ok(Expr::Exists {
                    subquery: Box::new(subquery),
                    position_start: start,
                    position_end: end,
                })
            }
            // Keywords not reserved for alias purposes may still denote a
            // built-in scalar/date function invoked like `CURRENT_DATE` or
            // `CURRENT_DATE()`; none of our keyword set collides with a
            // function name, so falling through to an error is correct.
            _ => Err(self.error_after("expression")),
        }
    }

    fn parse_identifier_or_call(&mut self, first: String, start: usize) -> Result<Expr, ParseError> {
        if matches!(self.current().kind, TokenKind::LParen) {
            self.advance();
            let distinct = self.eat_keyword("DISTINCT");
            let mut args = Vec::new();
            if !matches!(self.current().kind, TokenKind::RParen) {
                loop {
                    if self.check_operator("*") {
                        let star_start = self.current().start;
                        self.advance();
                        let star_end = self.previous().unwrap().end;
                        args.push(Expr::Star {
                            position_start: star_start,
                            position_end: star_end,
                        });
                    } else {
                        args.push(self.parse_expr()?);
                    }
                    if !self.eat_punct(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            let end = self.current().end;
            self.expect_rparen()?;
            return Ok(Expr::Function {
                name: first,
                args,
                distinct,
                position_start: start,
                position_end: end,
            });
        }

        let mut name = first;
        let mut end = self.previous().unwrap().end;
        if matches!(self.current().kind, TokenKind::Dot) {
            self.advance();
            let tail = self.expect_identifier("identifier after \".\"")?;
            end = self.previous().unwrap().end;
            name = format!("{}.{}", name, tail);
            // Further chaining is not permitted (spec.md §4.2).
            if matches!(self.current().kind, TokenKind::Dot) {
                return Err(self.error_after("end of qualified identifier"));
            }
        }
        Ok(Expr::Identifier {
            name,
            position_start: start,
            position_end: end,
        })
    }

    fn parse_case(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.advance(); // CASE
        let case_expr = if self.check_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut when_clauses = Vec::new();
        while self.eat_keyword("WHEN") {
            let condition = self.parse_expr()?;
            self.expect_keyword("THEN")?;
            let result = self.parse_expr()?;
            when_clauses.push(WhenClause { condition, result });
        }
        if when_clauses.is_empty() {
            return Err(self.error_after("WHEN"));
        }
        let else_result = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;
        let end = self.previous().unwrap().end;
        Ok(Expr::Case {
            case_expr,
            when_clauses,
            else_result,
            position_start: start,
            position_end: end,
        })
    }

    fn parse_cast(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.advance(); // CAST
        self.expect_lparen()?;
        let expr = self.parse_expr()?;
        self.expect_keyword("AS")?;
        let to_type = self.parse_type_name()?;
        let end = self.current().end;
        self.expect_rparen()?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            to_type,
            position_start: start,
            position_end: end,
        })
    }

    fn parse_type_name(&mut self) -> Result<String, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Identifier { name, .. } => {
                self.advance();
                Ok(name.to_uppercase())
            }
            TokenKind::Keyword { normalized, .. } => {
                self.advance();
                Ok(normalized)
            }
            _ => Err(self.error_after("type name")),
        }
    }

    fn parse_interval(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.advance(); // INTERVAL
        let negative = self.eat_operator("-");
        let value = match self.current().kind.clone() {
            TokenKind::Number { value, .. } => {
                self.advance();
                match value {
                    NumberValue::Float(f) => f,
                    NumberValue::BigInt(b) => {
                        use num_traits::ToPrimitive;
                        b.to_f64().unwrap_or(0.0)
                    }
                }
            }
            _ => return Err(self.error_after("interval value")),
        };
        let value = if negative { -value } else { value };
        let unit = match &self.current().kind {
            TokenKind::Keyword { normalized, .. } => match normalized.as_str() {
                "YEAR" => IntervalUnit::Year,
                "MONTH" => IntervalUnit::Month,
                "DAY" => IntervalUnit::Day,
                "HOUR" => IntervalUnit::Hour,
                "MINUTE" => IntervalUnit::Minute,
                "SECOND" => IntervalUnit::Second,
                _ => return Err(self.error_after("interval unit")),
            },
            _ => return Err(self.error_after("interval unit")),
        };
        self.advance();
        let end = self.previous().unwrap().end;
        Ok(Expr::Interval {
            value,
            unit,
            position_start: start,
            position_end: end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sql;

    fn where_expr(sql: &str) -> Expr {
        parse_sql(sql).unwrap().where_clause.unwrap()
    }

    #[test]
    fn between_rewrites_to_conjunction() {
        let e = where_expr("SELECT * FROM t WHERE x BETWEEN 1 AND 10");
        match e {
            Expr::Binary { op: BinaryOp::And, left, right, .. } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::GtEq, .. }));
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::LtEq, .. }));
            }
            _ => panic!("expected AND"),
        }
    }

    #[test]
    fn not_between_rewrites_to_disjunction_with_between_keyword_start() {
        let sql = "SELECT * FROM t WHERE x NOT BETWEEN 1 AND 10";
        let stmt = parse_sql(sql).unwrap();
        let e = stmt.where_clause.unwrap();
        let between_pos = sql.find("BETWEEN").unwrap();
        match &e {
            Expr::Binary { op: BinaryOp::Or, left, right, position_start, .. } => {
                assert_eq!(*position_start, between_pos);
                assert!(matches!(**left, Expr::Binary { op: BinaryOp::Lt, .. }));
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Gt, .. }));
            }
            _ => panic!("expected OR"),
        }
    }

    #[test]
    fn is_null_and_is_not_null() {
        let e = where_expr("SELECT * FROM t WHERE x IS NULL");
        assert!(matches!(e, Expr::Unary { op: UnaryOp::IsNull, .. }));
        let e = where_expr("SELECT * FROM t WHERE x IS NOT NULL");
        assert!(matches!(e, Expr::Unary { op: UnaryOp::IsNotNull, .. }));
    }

    #[test]
    fn not_exists_is_its_own_variant() {
        let e = where_expr("SELECT * FROM t WHERE NOT EXISTS (SELECT 1 FROM u)");
        assert!(matches!(e, Expr::NotExists { .. }));
    }

    #[test]
    fn dot_chaining_is_single_level() {
        let e = where_expr("SELECT * FROM t WHERE users.id = 1");
        match e {
            Expr::Binary { left, .. } => match *left {
                Expr::Identifier { name, .. } => assert_eq!(name, "users.id"),
                _ => panic!("expected identifier"),
            },
            _ => panic!("expected binary"),
        }
    }

    #[test]
    fn in_valuelist_vs_subquery() {
        let e = where_expr("SELECT * FROM t WHERE x IN (1, 2, 3)");
        assert!(matches!(e, Expr::InList { .. }));
        let e = where_expr("SELECT * FROM t WHERE x IN (SELECT y FROM u)");
        assert!(matches!(e, Expr::InSubquery { .. }));
    }
}
