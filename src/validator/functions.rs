//! The built-in function tables referenced by `validate` (spec.md §4.4)
//! and by `eval::functions` at execution time; kept here so both layers
//! agree on exactly which names exist without importing each other.

use lazy_static::lazy_static;
use std::collections::HashSet;
use std::ops::RangeInclusive;

lazy_static! {
    static ref AGGREGATE_NAMES: HashSet<&'static str> =
        ["COUNT", "SUM", "AVG", "MIN", "MAX"].into_iter().collect();

    static ref SCALAR_NAMES: HashSet<&'static str> = [
        "UPPER", "LOWER", "LENGTH", "TRIM", "CONCAT", "SUBSTRING", "CAST",
        "ARRAY_LENGTH", "ARRAY_POSITION", "ARRAY_SORT", "CARDINALITY",
        "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
        "DATE_ADD", "DATE_SUB", "DATE_DIFF",
    ]
    .into_iter()
    .collect();
}

pub fn is_aggregate_name(upper: &str) -> bool {
    AGGREGATE_NAMES.contains(upper)
}

pub fn is_known_builtin(upper: &str) -> bool {
    SCALAR_NAMES.contains(upper) || AGGREGATE_NAMES.contains(upper)
}

/// `None` means variadic or otherwise unconstrained (e.g. `CONCAT`).
pub fn fixed_arity(upper: &str) -> Option<RangeInclusive<usize>> {
    match upper {
        "UPPER" | "LOWER" | "LENGTH" | "TRIM" | "ARRAY_LENGTH" | "ARRAY_SORT" | "CARDINALITY" => Some(1..=1),
        "ARRAY_POSITION" | "DATE_ADD" | "DATE_SUB" | "DATE_DIFF" => Some(2..=2),
        "SUBSTRING" => Some(2..=3),
        "CURRENT_DATE" | "CURRENT_TIME" | "CURRENT_TIMESTAMP" => Some(0..=0),
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" => Some(1..=1),
        _ => None,
    }
}

/// Caller-supplied function names (spec.md §4.4 "any user-supplied
/// function in the caller's function map"; spec.md §6's ambient
/// `FunctionRegistry`). Case folded to upper-case on insertion so lookups
/// are case-insensitive, matching built-in name resolution.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    names: HashSet<String>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry { names: HashSet::new() }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FunctionRegistry {
            names: names.into_iter().map(|s| s.into().to_uppercase()).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into().to_uppercase());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_uppercase())
    }
}
