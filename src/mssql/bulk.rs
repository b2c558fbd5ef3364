use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, IntoSql, TokenRow};

use super::client::TdsClient;
use crate::bulk::{BulkColumn, BulkLoad};
use crate::error::MssqlMiddlewareError;
use crate::registry::TypeTag;
use crate::types::RowValues;

/// Run a bulk insert session and return the server's inserted-row total.
///
/// Every row is validated before the session opens, so a bad row never leaves
/// a partial load behind.
pub(crate) async fn bulk_insert(
    client: &mut TdsClient,
    bulk: &BulkLoad,
) -> Result<u64, MssqlMiddlewareError> {
    bulk.validate_rows()?;
    let mut encoded = Vec::with_capacity(bulk.rows.len());
    for (index, row) in bulk.rows.iter().enumerate() {
        let mut token = TokenRow::new();
        for (column, value) in bulk.ordered_values(row) {
            token.push(column_data(column, value).map_err(|detail| {
                MssqlMiddlewareError::BulkLoadError(format!(
                    "row {index}: column {}: {detail}",
                    column.name
                ))
            })?);
        }
        encoded.push(token);
    }

    if !bulk.options.is_default() {
        tracing::warn!(
            table = %bulk.table,
            options = ?bulk.options,
            "bulk copy hints are not supported by this driver and were ignored"
        );
    }

    let mut request = client
        .bulk_insert(&bulk.table)
        .await
        .map_err(|e| MssqlMiddlewareError::BulkLoadError(format!("{}: {e}", bulk.table)))?;
    for token in encoded {
        request
            .send(token)
            .await
            .map_err(|e| MssqlMiddlewareError::BulkLoadError(format!("{}: {e}", bulk.table)))?;
    }
    let result = request
        .finalize()
        .await
        .map_err(|e| MssqlMiddlewareError::BulkLoadError(format!("{}: {e}", bulk.table)))?;
    Ok(result.rows_affected().iter().sum())
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| format!("{text:?} is not a date/time"))
}

fn as_timestamp(value: &RowValues) -> Result<NaiveDateTime, String> {
    match value {
        RowValues::Text(text) => parse_timestamp(text),
        other => other
            .as_timestamp()
            .ok_or_else(|| format!("cannot read a {} value as a date/time", other.kind())),
    }
}

fn int<T: TryFrom<i64>>(value: i64) -> Result<T, String> {
    T::try_from(value).map_err(|_| format!("{value} is out of range"))
}

fn float(value: &RowValues) -> Result<f64, String> {
    value
        .as_float()
        .ok_or_else(|| format!("cannot read a {} value as a number", value.kind()))
}

fn null_for(tag: TypeTag) -> ColumnData<'static> {
    match tag {
        TypeTag::Bit => ColumnData::Bit(None),
        TypeTag::TinyInt => ColumnData::U8(None),
        TypeTag::SmallInt => ColumnData::I16(None),
        TypeTag::Int => ColumnData::I32(None),
        TypeTag::BigInt => ColumnData::I64(None),
        TypeTag::Real => ColumnData::F32(None),
        TypeTag::Float | TypeTag::Money | TypeTag::SmallMoney => ColumnData::F64(None),
        TypeTag::Decimal | TypeTag::Numeric => ColumnData::Numeric(None),
        TypeTag::Date => ColumnData::Date(None),
        TypeTag::Time => ColumnData::Time(None),
        TypeTag::SmallDateTime => ColumnData::SmallDateTime(None),
        TypeTag::DateTime => ColumnData::DateTime(None),
        TypeTag::DateTime2 => ColumnData::DateTime2(None),
        TypeTag::DateTimeOffset => ColumnData::DateTimeOffset(None),
        TypeTag::Binary | TypeTag::VarBinary | TypeTag::Image => ColumnData::Binary(None),
        TypeTag::Char
        | TypeTag::VarChar
        | TypeTag::Text
        | TypeTag::NChar
        | TypeTag::NVarChar
        | TypeTag::NText
        | TypeTag::UniqueIdentifier
        | TypeTag::Xml => ColumnData::String(None),
    }
}

/// Encode one cell for the declared column type.
fn column_data(column: &BulkColumn, value: &RowValues) -> Result<ColumnData<'static>, String> {
    if value.is_null() {
        return Ok(null_for(column.type_tag));
    }
    let data = match (column.type_tag, value) {
        (TypeTag::Bit, v) => ColumnData::Bit(v.as_bool().copied()),
        (TypeTag::TinyInt, RowValues::Int(i)) => ColumnData::U8(Some(int(*i)?)),
        (TypeTag::SmallInt, RowValues::Int(i)) => ColumnData::I16(Some(int(*i)?)),
        (TypeTag::Int, RowValues::Int(i)) => ColumnData::I32(Some(int(*i)?)),
        (TypeTag::BigInt, RowValues::Int(i)) => ColumnData::I64(Some(*i)),
        #[allow(clippy::cast_possible_truncation)]
        (TypeTag::Real, v) => ColumnData::F32(Some(float(v)? as f32)),
        (TypeTag::Float | TypeTag::Money | TypeTag::SmallMoney, v) => {
            ColumnData::F64(Some(float(v)?))
        }
        (TypeTag::Decimal | TypeTag::Numeric, v) => {
            let scale = column.options.scale.unwrap_or(0);
            #[allow(clippy::cast_possible_truncation)]
            let scaled = (float(v)? * 10f64.powi(i32::from(scale))).round() as i128;
            ColumnData::Numeric(Some(Numeric::new_with_scale(scaled, scale)))
        }
        (TypeTag::Date, v) => as_timestamp(v)?.date().into_sql(),
        (TypeTag::Time, v) => as_timestamp(v)?.time().into_sql(),
        (TypeTag::SmallDateTime | TypeTag::DateTime | TypeTag::DateTime2, v) => {
            as_timestamp(v)?.into_sql()
        }
        (TypeTag::DateTimeOffset, v) => {
            DateTime::<Utc>::from_naive_utc_and_offset(as_timestamp(v)?, Utc).into_sql()
        }
        (TypeTag::Binary | TypeTag::VarBinary | TypeTag::Image, RowValues::Blob(bytes)) => {
            ColumnData::Binary(Some(Cow::Owned(bytes.clone())))
        }
        (_, RowValues::Text(text)) => ColumnData::String(Some(Cow::Owned(text.clone()))),
        (tag, other) => return Err(format!("{tag} cannot take a {} value", other.kind())),
    };
    Ok(data)
}
