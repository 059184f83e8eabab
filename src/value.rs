//! The runtime value type behind a row cell (spec.md §3.5): `null |
//! boolean | number | bigint | string | array | nested object`.
//!
//! Kept as a single tagged enum rather than a trait-object value, matching
//! the teacher's own `types::value::DataValue` shape — consumers match
//! exhaustively instead of downcasting.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    Array(Vec<DataValue>),
    /// Nested object values are carried as plain `serde_json` values; only
    /// the top-level `DataValue::BigInt` needs the unquoted-digit rendering
    /// rule of spec.md §4.6, since a caller constructing nested object data
    /// already hands it over JSON-shaped.
    Object(serde_json::Map<String, serde_json::Value>),
}

/// Three-valued predicate algebra (spec.md §4.6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriBool {
    True,
    False,
    Unknown,
}

impl TriBool {
    pub fn from_bool(b: bool) -> Self {
        if b {
            TriBool::True
        } else {
            TriBool::False
        }
    }

    pub fn is_true(self) -> bool {
        matches!(self, TriBool::True)
    }

    pub fn and(self, other: TriBool) -> TriBool {
        use TriBool::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Unknown,
        }
    }

    pub fn or(self, other: TriBool) -> TriBool {
        use TriBool::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (False, False) => False,
            _ => Unknown,
        }
    }

    pub fn not(self) -> TriBool {
        match self {
            TriBool::True => TriBool::False,
            TriBool::False => TriBool::True,
            TriBool::Unknown => TriBool::Unknown,
        }
    }

    pub fn to_data_value(self) -> DataValue {
        match self {
            TriBool::True => DataValue::Boolean(true),
            TriBool::False => DataValue::Boolean(false),
            TriBool::Unknown => DataValue::Null,
        }
    }
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// The tri-valued reading of a value used as a predicate (spec.md
    /// §4.6): a boolean reads as itself, NULL reads as UNKNOWN, and any
    /// other (non-boolean) value is treated defensively as UNKNOWN rather
    /// than panicking — the grammar never produces a non-boolean predicate
    /// from well-typed SQL, but a user-defined function might.
    pub fn truthiness(&self) -> TriBool {
        match self {
            DataValue::Boolean(b) => TriBool::from_bool(*b),
            DataValue::Null => TriBool::Unknown,
            _ => TriBool::Unknown,
        }
    }

    /// Numeric coercion used for arithmetic and numeric comparisons:
    /// numbers pass through, bigints narrow to `f64`, booleans coerce to
    /// `{0, 1}` (spec.md §4.6). Anything else is not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Number(n) => Some(*n),
            DataValue::BigInt(b) => b.to_f64(),
            DataValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Ordering used by comparisons (`< <= > >=`), equality, and `ORDER
    /// BY`. `None` means the two values are not comparable and any
    /// comparison between them reads as NULL (spec.md §4.6 "everything
    /// else yields NULL"). NULL operands are handled by the caller before
    /// reaching here — NULL propagation is a property of the operator, not
    /// of this ordering.
    pub fn compare(&self, other: &DataValue) -> Option<Ordering> {
        match (self, other) {
            (DataValue::String(a), DataValue::String(b)) => Some(a.cmp(b)),
            (DataValue::BigInt(a), DataValue::BigInt(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Value equality with the coercions of spec.md §4.6. Returns `None`
    /// (NULL) rather than `false` for incomparable types, since equality
    /// of mismatched types is UNKNOWN, not FALSE.
    pub fn equals(&self, other: &DataValue) -> Option<bool> {
        self.compare(other).map(|ord| ord == Ordering::Equal)
    }

    /// Serialized form used to bucket rows by value in `HashJoin` (spec.md
    /// §4.7): `None` for `Null`, since NULL never matches another NULL as a
    /// join key. Numbers and bigints that are numerically equal render to
    /// the same key, keeping this consistent with `compare`'s cross-type
    /// numeric coercion.
    pub fn canonical_key(&self) -> Option<String> {
        match self {
            DataValue::Null => None,
            other => Some(other.group_key()),
        }
    }

    /// Serialized form used to bucket rows by value in `HashAggregate`
    /// (spec.md §4.7): unlike `canonical_key`, NULL is its own group rather
    /// than excluded, since `GROUP BY` puts all NULL rows together. Each
    /// variant is tagged so that, say, the string `"true"` can never
    /// collide with the boolean `true`.
    pub fn group_key(&self) -> String {
        match self {
            DataValue::Null => "null".to_string(),
            DataValue::Number(n) => format!("n:{}", canonical_number(*n)),
            DataValue::BigInt(b) => format!("n:{b}"),
            DataValue::Boolean(b) => format!("b:{b}"),
            DataValue::String(s) => format!("s:{s}"),
            DataValue::Array(_) | DataValue::Object(_) => format!("j:{}", self.to_json_text()),
        }
    }

    /// JSON rendering used by `CAST(x AS STRING)` (spec.md §4.6). Bigints
    /// are rendered as bare decimal digits, never quoted, even nested
    /// inside an array.
    pub fn to_json_text(&self) -> String {
        match self {
            DataValue::Null => "null".to_string(),
            DataValue::Boolean(b) => b.to_string(),
            DataValue::Number(n) => format_number(*n),
            DataValue::BigInt(b) => b.to_string(),
            DataValue::String(s) => serde_json::to_string(s).unwrap_or_default(),
            DataValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(DataValue::to_json_text).collect();
                format!("[{}]", parts.join(","))
            }
            DataValue::Object(map) => serde_json::to_string(map).unwrap_or_default(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Normalizes a whole-valued float to the same digit string a same-valued
/// `BigInt` would render, so `Number(3.0)` and `BigInt(3)` land in the same
/// hash bucket.
fn canonical_number(n: f64) -> String {
    format_number(n)
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::Number(n) => write!(f, "{}", format_number(*n)),
            DataValue::BigInt(b) => write!(f, "{}", b),
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Array(_) | DataValue::Object(_) => write!(f, "{}", self.to_json_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_mixed_comparison_coerces_bigint() {
        let a = DataValue::Number(3.0);
        let b = DataValue::BigInt(BigInt::from(3));
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn string_vs_number_is_incomparable() {
        let a = DataValue::String("3".to_string());
        let b = DataValue::Number(3.0);
        assert_eq!(a.compare(&b), None);
    }

    #[test]
    fn bigint_renders_unquoted_in_json_text() {
        let v = DataValue::Object(
            [
                ("id".to_string(), serde_json::json!(1)),
                ("name".to_string(), serde_json::json!("Alice")),
                ("age".to_string(), serde_json::json!(30)),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(v.to_json_text(), r#"{"id":1,"name":"Alice","age":30}"#);
    }

    #[test]
    fn canonical_key_is_none_for_null() {
        assert_eq!(DataValue::Null.canonical_key(), None);
    }

    #[test]
    fn canonical_key_unifies_number_and_bigint() {
        let a = DataValue::Number(3.0);
        let b = DataValue::BigInt(BigInt::from(3));
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn group_key_separates_boolean_from_its_string_form() {
        let b = DataValue::Boolean(true);
        let s = DataValue::String("true".to_string());
        assert_ne!(b.group_key(), s.group_key());
    }

    #[test]
    fn group_key_gives_null_its_own_bucket() {
        assert_eq!(DataValue::Null.group_key(), "null");
    }

    #[test]
    fn tri_bool_and_or_dominance() {
        use TriBool::*;
        assert_eq!(True.and(Unknown), Unknown);
        assert_eq!(False.and(Unknown), False);
        assert_eq!(True.or(Unknown), True);
        assert_eq!(False.or(Unknown), Unknown);
    }
}
