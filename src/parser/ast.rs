//! AST node shapes (spec.md §3.2, §3.3). Every expression node carries a
//! `position_start`/`position_end` half-open byte range over the source
//! (spec.md §9 "positions on every node"); consumers match exhaustively
//! rather than walking a visitor-pattern class tree.

use num_bigint::BigInt;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Like,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

/// Expression AST node (spec.md §3.2). `left`/`right` of a `Binary` node are
/// themselves `Expr`; identifiers retain their table-qualifier embedded with
/// a dot (`"users.id"`) to keep resolution unambiguous during planning.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: LiteralValue,
        position_start: usize,
        position_end: usize,
    },
    Identifier {
        name: String,
        position_start: usize,
        position_end: usize,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
        position_start: usize,
        position_end: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position_start: usize,
        position_end: usize,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
        position_start: usize,
        position_end: usize,
    },
    Cast {
        expr: Box<Expr>,
        to_type: String,
        position_start: usize,
        position_end: usize,
    },
    Case {
        case_expr: Option<Box<Expr>>,
        when_clauses: Vec<WhenClause>,
        else_result: Option<Box<Expr>>,
        position_start: usize,
        position_end: usize,
    },
    Interval {
        value: f64,
        unit: IntervalUnit,
        position_start: usize,
        position_end: usize,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<SelectStatement>,
        negated: bool,
        position_start: usize,
        position_end: usize,
    },
    InList {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
        position_start: usize,
        position_end: usize,
    },
    Exists {
        subquery: Box<SelectStatement>,
        position_start: usize,
        position_end: usize,
    },
    NotExists {
        subquery: Box<SelectStatement>,
        position_start: usize,
        position_end: usize,
    },
    /// Only valid as a function argument or SELECT item.
    Star {
        position_start: usize,
        position_end: usize,
    },
}

impl Expr {
    pub fn position_start(&self) -> usize {
        match self {
            Expr::Literal { position_start, .. }
            | Expr::Identifier { position_start, .. }
            | Expr::Unary { position_start, .. }
            | Expr::Binary { position_start, .. }
            | Expr::Function { position_start, .. }
            | Expr::Cast { position_start, .. }
            | Expr::Case { position_start, .. }
            | Expr::Interval { position_start, .. }
            | Expr::InSubquery { position_start, .. }
            | Expr::InList { position_start, .. }
            | Expr::Exists { position_start, .. }
            | Expr::NotExists { position_start, .. }
            | Expr::Star { position_start, .. } => *position_start,
        }
    }

    pub fn position_end(&self) -> usize {
        match self {
            Expr::Literal { position_end, .. }
            | Expr::Identifier { position_end, .. }
            | Expr::Unary { position_end, .. }
            | Expr::Binary { position_end, .. }
            | Expr::Function { position_end, .. }
            | Expr::Cast { position_end, .. }
            | Expr::Case { position_end, .. }
            | Expr::Interval { position_end, .. }
            | Expr::InSubquery { position_end, .. }
            | Expr::InList { position_end, .. }
            | Expr::Exists { position_end, .. }
            | Expr::NotExists { position_end, .. }
            | Expr::Star { position_end, .. } => *position_end,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Star {
        table: Option<String>,
    },
    Derived {
        expr: Expr,
        alias: Option<String>,
    },
    /// Produced by an older parser dialect; the planner accepts both this
    /// and an equivalent `Derived { expr: Function { .. } }` shape
    /// (spec.md §3.3).
    Aggregate {
        func: String,
        arg: Option<Expr>,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Table {
        table: String,
        alias: Option<String>,
    },
    Subquery {
        query: Box<SelectStatement>,
        alias: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Positional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub alias: Option<String>,
    /// Absent for POSITIONAL joins.
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub direction: Direction,
    pub nulls: Option<NullsOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Box<SelectStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub ctes: Vec<Cte>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub with: Option<With>,
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: FromSource,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub position_start: usize,
    pub position_end: usize,
}
