//! Type registry: the driver-native type tags callers attach to parameters and
//! bulk-load columns. Tags use the SQL Server type names (`Int`, `NVarChar`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MssqlMiddlewareError;
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Char,
    VarChar,
    Text,
    NChar,
    NVarChar,
    NText,
    Date,
    Time,
    SmallDateTime,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Binary,
    VarBinary,
    Image,
    UniqueIdentifier,
    Xml,
}

impl TypeTag {
    pub const ALL: &'static [TypeTag] = &[
        TypeTag::Bit,
        TypeTag::TinyInt,
        TypeTag::SmallInt,
        TypeTag::Int,
        TypeTag::BigInt,
        TypeTag::Real,
        TypeTag::Float,
        TypeTag::Decimal,
        TypeTag::Numeric,
        TypeTag::Money,
        TypeTag::SmallMoney,
        TypeTag::Char,
        TypeTag::VarChar,
        TypeTag::Text,
        TypeTag::NChar,
        TypeTag::NVarChar,
        TypeTag::NText,
        TypeTag::Date,
        TypeTag::Time,
        TypeTag::SmallDateTime,
        TypeTag::DateTime,
        TypeTag::DateTime2,
        TypeTag::DateTimeOffset,
        TypeTag::Binary,
        TypeTag::VarBinary,
        TypeTag::Image,
        TypeTag::UniqueIdentifier,
        TypeTag::Xml,
    ];

    /// The tag's name as callers write it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Bit => "Bit",
            TypeTag::TinyInt => "TinyInt",
            TypeTag::SmallInt => "SmallInt",
            TypeTag::Int => "Int",
            TypeTag::BigInt => "BigInt",
            TypeTag::Real => "Real",
            TypeTag::Float => "Float",
            TypeTag::Decimal => "Decimal",
            TypeTag::Numeric => "Numeric",
            TypeTag::Money => "Money",
            TypeTag::SmallMoney => "SmallMoney",
            TypeTag::Char => "Char",
            TypeTag::VarChar => "VarChar",
            TypeTag::Text => "Text",
            TypeTag::NChar => "NChar",
            TypeTag::NVarChar => "NVarChar",
            TypeTag::NText => "NText",
            TypeTag::Date => "Date",
            TypeTag::Time => "Time",
            TypeTag::SmallDateTime => "SmallDateTime",
            TypeTag::DateTime => "DateTime",
            TypeTag::DateTime2 => "DateTime2",
            TypeTag::DateTimeOffset => "DateTimeOffset",
            TypeTag::Binary => "Binary",
            TypeTag::VarBinary => "VarBinary",
            TypeTag::Image => "Image",
            TypeTag::UniqueIdentifier => "UniqueIdentifier",
            TypeTag::Xml => "Xml",
        }
    }

    /// Declaration used when the parameter is declared to the server
    /// (`@name <declaration>`). Legacy LOB types map onto their `max` successors.
    #[must_use]
    pub fn declaration(self) -> &'static str {
        match self {
            TypeTag::Bit => "bit",
            TypeTag::TinyInt => "tinyint",
            TypeTag::SmallInt => "smallint",
            TypeTag::Int => "int",
            TypeTag::BigInt => "bigint",
            TypeTag::Real => "real",
            TypeTag::Float => "float",
            TypeTag::Decimal => "decimal(38, 10)",
            TypeTag::Numeric => "numeric(38, 10)",
            TypeTag::Money => "money",
            TypeTag::SmallMoney => "smallmoney",
            TypeTag::Char | TypeTag::VarChar | TypeTag::Text => "varchar(max)",
            TypeTag::NChar | TypeTag::NVarChar | TypeTag::NText => "nvarchar(max)",
            TypeTag::Date => "date",
            TypeTag::Time => "time(7)",
            TypeTag::SmallDateTime => "smalldatetime",
            TypeTag::DateTime => "datetime",
            TypeTag::DateTime2 => "datetime2(7)",
            TypeTag::DateTimeOffset => "datetimeoffset(7)",
            TypeTag::Binary | TypeTag::VarBinary | TypeTag::Image => "varbinary(max)",
            TypeTag::UniqueIdentifier => "uniqueidentifier",
            TypeTag::Xml => "xml",
        }
    }

    /// Whether a value of this kind can be sent for a column or parameter of this type.
    /// NULL is accepted everywhere; nullability is the server's concern.
    #[must_use]
    pub fn accepts(self, value: &RowValues) -> bool {
        match (self, value) {
            (_, RowValues::Null) => true,
            (TypeTag::Bit, RowValues::Bool(_)) => true,
            (TypeTag::Bit, RowValues::Int(i)) => *i == 0 || *i == 1,
            (
                TypeTag::TinyInt | TypeTag::SmallInt | TypeTag::Int | TypeTag::BigInt,
                RowValues::Int(_),
            ) => true,
            (
                TypeTag::Real
                | TypeTag::Float
                | TypeTag::Decimal
                | TypeTag::Numeric
                | TypeTag::Money
                | TypeTag::SmallMoney,
                RowValues::Float(_) | RowValues::Int(_),
            ) => true,
            (
                TypeTag::Char
                | TypeTag::VarChar
                | TypeTag::Text
                | TypeTag::NChar
                | TypeTag::NVarChar
                | TypeTag::NText
                | TypeTag::UniqueIdentifier
                | TypeTag::Xml,
                RowValues::Text(_),
            ) => true,
            (
                TypeTag::Date
                | TypeTag::Time
                | TypeTag::SmallDateTime
                | TypeTag::DateTime
                | TypeTag::DateTime2
                | TypeTag::DateTimeOffset,
                RowValues::Timestamp(_) | RowValues::Date(_) | RowValues::Text(_),
            ) => true,
            (TypeTag::Binary | TypeTag::VarBinary | TypeTag::Image, RowValues::Blob(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeTag {
    type Err = MssqlMiddlewareError;

    /// Case-insensitive lookup by tag name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| MssqlMiddlewareError::ParameterError(format!("unknown type tag: {s}")))
    }
}
