//! Runtime row (spec.md §3.5): an ordered mapping from column name to
//! value. Kept as an ordered `Vec` of pairs rather than a `HashMap` so that
//! `Project`'s `*`-expansion output order is preserved and duplicate
//! column names (permitted only as a `*`-expansion artifact over joined
//! tables) can coexist; downstream readers take the first occurrence on
//! ambiguity (spec.md §3.5).

use crate::value::DataValue;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, DataValue)>,
}

impl Row {
    pub fn new() -> Self {
        Row { columns: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Row {
            columns: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: DataValue) {
        self.columns.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, DataValue)> {
        self.columns.iter()
    }

    pub fn into_iter_pairs(self) -> impl Iterator<Item = (String, DataValue)> {
        self.columns.into_iter()
    }

    /// Looks a column up by name. An exact match wins; otherwise, since
    /// scans qualify every column with their source alias (`"users.id"`),
    /// a bare or mismatched-qualifier reference falls back to matching the
    /// unqualified suffix, first occurrence wins (spec.md §3.5).
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        if let Some((_, v)) = self.columns.iter().find(|(k, _)| k == name) {
            return Some(v);
        }
        let suffix = name.rsplit('.').next().unwrap_or(name);
        self.columns
            .iter()
            .find(|(k, _)| k.rsplit('.').next() == Some(suffix))
            .map(|(_, v)| v)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    /// All columns whose qualifier (the part before the last `.`) equals
    /// `table`, used by `t.*` expansion (spec.md §4.7).
    pub fn columns_qualified_by(&self, table: &str) -> impl Iterator<Item = &(String, DataValue)> {
        self.columns.iter().filter(move |(k, _)| match k.rsplit_once('.') {
            Some((qualifier, _)) => qualifier == table,
            None => false,
        })
    }

    pub fn extend_from(&mut self, other: &Row) {
        self.columns.extend(other.columns.iter().cloned());
    }

    /// Strips the table qualifier off a column name, used when projecting
    /// `*`/`t.*` so output keys read `id` rather than `users.id`.
    pub fn bare_name(name: &str) -> &str {
        name.rsplit('.').next().unwrap_or(name)
    }

    pub fn into_map(self) -> Vec<(String, DataValue)> {
        self.columns
    }
}

impl FromIterator<(String, DataValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, DataValue)>>(iter: I) -> Self {
        Row {
            columns: iter.into_iter().collect(),
        }
    }
}
