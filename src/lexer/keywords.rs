//! The reserved keyword set recognised by the lexer (spec.md §4.1). Not
//! every keyword here is *reserved against use as an alias* — that smaller
//! exclusion set lives in `parser::stmt::ALIAS_RESERVED` (spec.md §4.3).

use lazy_static::lazy_static;
use std::collections::HashSet;

/// Defines a `&'static [&'static str]` of upper-case keyword spellings,
/// mirroring the `define_keywords!` table shape used by `sqlparser-rs`
/// (see the retrieval pack's `dialect::keywords`), trimmed to exactly the
/// surface this dialect's grammar needs (spec.md §6.2).
macro_rules! keyword_list {
    ($($kw:ident),* $(,)?) => {
        pub const ALL_KEYWORDS: &[&str] = &[$(stringify!($kw)),*];
    };
}

keyword_list!(
    SELECT, FROM, WHERE, AND, OR, NOT, AS, DISTINCT, WITH, GROUP, BY, HAVING,
    ORDER, ASC, DESC, NULLS, FIRST, LAST, LIMIT, OFFSET, JOIN, INNER, LEFT,
    RIGHT, FULL, OUTER, ON, POSITIONAL, CASE, WHEN, THEN, ELSE, END, CAST,
    IS, NULL, TRUE, FALSE, BETWEEN, LIKE, IN, EXISTS, INTERVAL, YEAR, MONTH,
    DAY, HOUR, MINUTE, SECOND,
);

lazy_static! {
    static ref KEYWORD_SET: HashSet<&'static str> = ALL_KEYWORDS.iter().copied().collect();
}

pub fn is_reserved_keyword(upper: &str) -> bool {
    KEYWORD_SET.contains(upper)
}
