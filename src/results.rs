pub mod result_set;
pub mod row;

use serde::Serialize;

pub use result_set::{QueryOptions, QueryResult};
pub use row::{Row, RowShape};

/// Column metadata reported once per statement, before any row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    #[serde(rename = "colName")]
    pub name: String,
    /// Fixed storage size in bytes; `None` for variable-length types.
    #[serde(rename = "dataLength")]
    pub byte_length: Option<u32>,
    #[serde(rename = "type")]
    pub type_id: u8,
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        byte_length: Option<u32>,
        type_id: u8,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            byte_length,
            type_id,
            type_name: type_name.into(),
        }
    }
}
