//! Bulk-load session description handed to the driver.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::MssqlMiddlewareError;
use crate::registry::TypeTag;
use crate::types::RowValues;

/// Session-level switches, named as the server's bulk-copy hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkLoadOptions {
    pub check_constraints: bool,
    pub fire_triggers: bool,
    pub keep_nulls: bool,
    pub lock_table: bool,
}

impl BulkLoadOptions {
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkColumnOptions {
    pub nullable: bool,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

impl Default for BulkColumnOptions {
    fn default() -> Self {
        Self {
            nullable: true,
            length: None,
            precision: None,
            scale: None,
        }
    }
}

/// One declared column: `(name, type, options)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkColumn {
    pub name: String,
    pub type_tag: TypeTag,
    #[serde(default)]
    pub options: BulkColumnOptions,
}

impl BulkColumn {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            options: BulkColumnOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: BulkColumnOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.options.nullable = false;
        self
    }
}

impl<N: Into<String>> From<(N, TypeTag, BulkColumnOptions)> for BulkColumn {
    fn from((name, type_tag, options): (N, TypeTag, BulkColumnOptions)) -> Self {
        BulkColumn::new(name, type_tag).with_options(options)
    }
}

/// A row to append, keyed by column name. Keys that are not declared columns
/// are ignored; declared columns missing from the row are sent as NULL.
pub type BulkRow = HashMap<String, RowValues>;

/// Build a [`BulkRow`] from `(name, value)` pairs.
pub fn bulk_row<N, V, I>(pairs: I) -> BulkRow
where
    N: Into<String>,
    V: Into<RowValues>,
    I: IntoIterator<Item = (N, V)>,
{
    pairs
        .into_iter()
        .map(|(n, v)| (n.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoad {
    pub table: String,
    pub options: BulkLoadOptions,
    pub columns: Vec<BulkColumn>,
    pub rows: Vec<BulkRow>,
}

static NULL: RowValues = RowValues::Null;

impl BulkLoad {
    /// Describe a bulk load. Checks only what the caller controls: a table
    /// name and a non-empty list of uniquely named columns.
    ///
    /// # Errors
    /// Returns `MssqlMiddlewareError::ContractViolation` when those checks fail.
    pub fn new(
        table: impl Into<String>,
        options: BulkLoadOptions,
        columns: &[BulkColumn],
        rows: &[BulkRow],
    ) -> Result<Self, MssqlMiddlewareError> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(MssqlMiddlewareError::ContractViolation(
                "bulk load needs a table name".into(),
            ));
        }
        if columns.is_empty() {
            return Err(MssqlMiddlewareError::ContractViolation(format!(
                "bulk load into {table} declares no columns"
            )));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in columns {
            if !seen.insert(column.name.as_str()) {
                return Err(MssqlMiddlewareError::ContractViolation(format!(
                    "bulk load into {table} declares column {} twice",
                    column.name
                )));
            }
        }
        Ok(Self {
            table,
            options,
            columns: columns.to_vec(),
            rows: rows.to_vec(),
        })
    }

    /// Values of `row` in declared column order.
    pub fn ordered_values<'a>(
        &'a self,
        row: &'a BulkRow,
    ) -> impl Iterator<Item = (&'a BulkColumn, &'a RowValues)> + 'a {
        self.columns
            .iter()
            .map(move |column| (column, row.get(&column.name).unwrap_or(&NULL)))
    }

    /// Check every row against the declared columns before anything is sent.
    ///
    /// # Errors
    /// Returns `MssqlMiddlewareError::BulkLoadError` naming the first offending row and column.
    pub fn validate_rows(&self) -> Result<(), MssqlMiddlewareError> {
        for (index, row) in self.rows.iter().enumerate() {
            for (column, value) in self.ordered_values(row) {
                if value.is_null() && !column.options.nullable {
                    return Err(MssqlMiddlewareError::BulkLoadError(format!(
                        "row {index}: column {} does not allow NULL",
                        column.name
                    )));
                }
                if !column.type_tag.accepts(value) {
                    return Err(MssqlMiddlewareError::BulkLoadError(format!(
                        "row {index}: column {} ({}) cannot take a {} value",
                        column.name,
                        column.type_tag,
                        value.kind()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_column() -> Vec<BulkColumn> {
        vec![BulkColumn::new("id", TypeTag::Int).not_null()]
    }

    #[test]
    fn rejects_empty_and_duplicate_columns() {
        let err = BulkLoad::new("T", BulkLoadOptions::default(), &[], &[]).unwrap_err();
        assert!(err.is_contract_violation());

        let cols = vec![
            BulkColumn::new("id", TypeTag::Int),
            BulkColumn::new("id", TypeTag::BigInt),
        ];
        let err = BulkLoad::new("T", BulkLoadOptions::default(), &cols, &[]).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn missing_values_read_as_null() {
        let cols = vec![
            BulkColumn::new("id", TypeTag::Int),
            BulkColumn::new("name", TypeTag::NVarChar),
        ];
        let rows = vec![bulk_row([("id", 1)])];
        let load = BulkLoad::new("T", BulkLoadOptions::default(), &cols, &rows).unwrap();
        let values: Vec<_> = load.ordered_values(&load.rows[0]).map(|(_, v)| v.clone()).collect();
        assert_eq!(values, vec![RowValues::Int(1), RowValues::Null]);
        assert!(load.validate_rows().is_ok());
    }

    #[test]
    fn validation_names_the_bad_row() {
        let rows = vec![bulk_row([("id", 1)]), bulk_row([("other", 2)])];
        let load = BulkLoad::new("T", BulkLoadOptions::default(), &id_column(), &rows).unwrap();
        let err = load.validate_rows().unwrap_err();
        assert!(err.to_string().contains("row 1"));

        let rows = vec![bulk_row([("id", "one")])];
        let load = BulkLoad::new("T", BulkLoadOptions::default(), &id_column(), &rows).unwrap();
        assert!(load.validate_rows().unwrap_err().to_string().contains("string"));
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let opts: BulkLoadOptions =
            serde_json::from_str(r#"{"keepNulls": true, "lockTable": true}"#).unwrap();
        assert!(opts.keep_nulls && opts.lock_table && !opts.fire_triggers);
        assert!(BulkLoadOptions::default().is_default());
        let col: BulkColumn = serde_json::from_str(r#"{"name":"id","typeTag":"Int"}"#).unwrap();
        assert!(col.options.nullable);
    }
}
