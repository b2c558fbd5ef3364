use std::collections::HashMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::types::RowValues;

/// Column names for one result, shared by every row of that result.
///
/// The name-to-index cache is built once. When the server reports the same
/// name twice the cache points at the last occurrence, which gives rows the
/// mapping semantics callers expect (`get` sees the last value).
#[derive(Debug, Clone, PartialEq)]
pub struct RowShape {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl RowShape {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self { names, index }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the last column carrying `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// A row from a query result
///
/// Values keep their arrival order; lookups by name follow mapping semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    shape: Arc<RowShape>,
    values: Vec<RowValues>,
}

impl Row {
    /// Create a row over a shared shape.
    ///
    /// Missing trailing values read as absent; extra values are kept but are
    /// only reachable by index.
    #[must_use]
    pub fn new(shape: Arc<RowShape>, values: Vec<RowValues>) -> Self {
        Self { shape, values }
    }

    /// Build a standalone row from `(name, value)` pairs.
    pub fn from_pairs<N, V, I>(pairs: I) -> Self
    where
        N: Into<String>,
        V: Into<RowValues>,
        I: IntoIterator<Item = (N, V)>,
    {
        let (names, values): (Vec<String>, Vec<RowValues>) = pairs
            .into_iter()
            .map(|(n, v)| (n.into(), v.into()))
            .unzip();
        Self::new(Arc::new(RowShape::new(names)), values)
    }

    #[must_use]
    pub fn shape(&self) -> &Arc<RowShape> {
        &self.shape
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.shape.names()
    }

    /// Get a value from the row by column name (last one wins for duplicates)
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.shape
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every `(name, value)` pair in column order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.shape
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// JSON object view of the row; duplicate names collapse to the last value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.values.len());
        for (name, value) in self.iter() {
            let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            map.insert(name.to_string(), json);
        }
        serde_json::Value::Object(map)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_resolve_to_last_value() {
        let row = Row::from_pairs([("a", 1), ("b", 2), ("a", 3)]);
        assert_eq!(row.get("a"), Some(&RowValues::Int(3)));
        assert_eq!(row.len(), 3);
        let pairs: Vec<_> = row.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
        assert_eq!(pairs[0], ("a".to_string(), RowValues::Int(1)));
        assert_eq!(row.to_json(), serde_json::json!({"a": 3, "b": 2}));
    }

    #[test]
    fn lookups_by_name_and_index() {
        let row = Row::from_pairs([("id", RowValues::Int(1)), ("name", RowValues::from("x"))]);
        assert_eq!(row.get("name").and_then(RowValues::as_text), Some("x"));
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(1)));
        assert!(row.get("missing").is_none());
        assert!(row.get_by_index(5).is_none());
    }

    #[test]
    fn rows_share_one_shape() {
        let shape = Arc::new(RowShape::new(vec!["x".into()]));
        let a = Row::new(Arc::clone(&shape), vec![RowValues::Int(1)]);
        let b = Row::new(Arc::clone(&shape), vec![RowValues::Int(2)]);
        assert!(Arc::ptr_eq(a.shape(), b.shape()));
    }
}
