use serde::Serialize;

use super::ColumnDescriptor;
use super::row::Row;

/// Options accepted by [`Database::query`](crate::Database::query).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Return column metadata alongside the rows.
    pub columns: bool,
}

impl QueryOptions {
    #[must_use]
    pub fn with_columns() -> Self {
        Self { columns: true }
    }
}

/// A buffered query result: rows alone, or rows plus the column metadata
/// reported before the first row when it was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Rows(Vec<Row>),
    WithColumns {
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Row>,
    },
}

impl QueryResult {
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryResult::Rows(rows) | QueryResult::WithColumns { rows, .. } => rows,
        }
    }

    /// Column metadata, present only when it was requested.
    #[must_use]
    pub fn columns(&self) -> Option<&[ColumnDescriptor]> {
        match self {
            QueryResult::Rows(_) => None,
            QueryResult::WithColumns { columns, .. } => Some(columns),
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryResult::Rows(rows) | QueryResult::WithColumns { rows, .. } => rows,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_cover_both_shapes() {
        let rows = vec![Row::from_pairs([("x", 1)])];
        let plain = QueryResult::Rows(rows.clone());
        assert_eq!(plain.len(), 1);
        assert!(plain.columns().is_none());

        let with_cols = QueryResult::WithColumns {
            columns: vec![ColumnDescriptor::new("x", Some(4), 0x38, "Int4")],
            rows,
        };
        assert_eq!(with_cols.columns().map(<[_]>::len), Some(1));
        assert_eq!(with_cols.into_rows().len(), 1);
    }

    #[test]
    fn serializes_like_the_wire_shape() {
        let result = QueryResult::WithColumns {
            columns: vec![ColumnDescriptor::new("x", Some(4), 0x38, "Int4")],
            rows: vec![Row::from_pairs([("x", 1)])],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rows"][0]["x"], 1);
        assert_eq!(json["columns"][0]["typeName"], "Int4");
        assert_eq!(json["columns"][0]["dataLength"], 4);
    }
}
