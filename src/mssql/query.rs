use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{Column, ColumnData, ColumnType, FromSql, QueryItem, QueryStream};

use crate::driver::{DriverEvent, EventSink};
use crate::results::{ColumnDescriptor, Row, RowShape};
use crate::types::RowValues;

/// Drain a tiberius result stream into driver events, ending with exactly one
/// `RequestCompleted` whose count is the number of rows seen.
pub(crate) async fn forward_stream(mut stream: QueryStream<'_>, sink: &mut dyn EventSink) {
    let mut shape: Option<Arc<RowShape>> = None;
    let mut rows = 0u64;
    loop {
        match stream.try_next().await {
            Ok(Some(QueryItem::Metadata(meta))) => {
                let columns: Vec<ColumnDescriptor> =
                    meta.columns().iter().map(describe_column).collect();
                shape = Some(Arc::new(RowShape::new(
                    columns.iter().map(|c| c.name.clone()).collect(),
                )));
                sink.on_event(DriverEvent::ColumnMetadata(columns));
            }
            Ok(Some(QueryItem::Row(row))) => {
                let shape = Arc::clone(shape.get_or_insert_with(|| {
                    Arc::new(RowShape::new(
                        row.columns().iter().map(|c| c.name().to_string()).collect(),
                    ))
                }));
                let values = row.into_iter().map(convert_column_data).collect();
                rows += 1;
                sink.on_event(DriverEvent::Row(Row::new(shape, values)));
            }
            Ok(None) => break,
            Err(e) => {
                sink.on_event(DriverEvent::Error(e.to_string()));
                break;
            }
        }
    }
    sink.on_event(DriverEvent::RequestCompleted { row_count: rows });
}

/// TDS type byte and fixed storage size for a column type.
fn wire_type(ty: ColumnType) -> (u8, Option<u32>) {
    #[allow(unreachable_patterns)]
    match ty {
        ColumnType::Null => (0x1F, None),
        ColumnType::Bit => (0x32, Some(1)),
        ColumnType::Int1 => (0x30, Some(1)),
        ColumnType::Int2 => (0x34, Some(2)),
        ColumnType::Int4 => (0x38, Some(4)),
        ColumnType::Int8 => (0x7F, Some(8)),
        ColumnType::Datetime4 => (0x3A, Some(4)),
        ColumnType::Float4 => (0x3B, Some(4)),
        ColumnType::Float8 => (0x3E, Some(8)),
        ColumnType::Money => (0x3C, Some(8)),
        ColumnType::Datetime => (0x3D, Some(8)),
        ColumnType::Money4 => (0x7A, Some(4)),
        ColumnType::Guid => (0x24, Some(16)),
        ColumnType::Decimaln => (0x6A, None),
        ColumnType::Numericn => (0x6C, None),
        ColumnType::Bitn => (0x68, None),
        ColumnType::Intn => (0x26, None),
        ColumnType::Floatn => (0x6D, None),
        ColumnType::Datetimen => (0x6F, None),
        ColumnType::Daten => (0x28, Some(3)),
        ColumnType::Timen => (0x29, None),
        ColumnType::Datetime2 => (0x2A, None),
        ColumnType::DatetimeOffsetn => (0x2B, None),
        ColumnType::BigVarBin => (0xA5, None),
        ColumnType::BigVarChar => (0xA7, None),
        ColumnType::BigBinary => (0xAD, None),
        ColumnType::BigChar => (0xAF, None),
        ColumnType::NVarchar => (0xE7, None),
        ColumnType::NChar => (0xEF, None),
        ColumnType::Xml => (0xF1, None),
        ColumnType::Udt => (0xF0, None),
        ColumnType::Text => (0x23, None),
        ColumnType::Image => (0x22, None),
        ColumnType::NText => (0x63, None),
        ColumnType::SSVariant => (0x62, None),
        _ => (0, None),
    }
}

pub(crate) fn describe_column(column: &Column) -> ColumnDescriptor {
    let ty = column.column_type();
    let (type_id, byte_length) = wire_type(ty);
    ColumnDescriptor::new(column.name(), byte_length, type_id, format!("{ty:?}"))
}

fn from_sql<T>(data: &ColumnData<'static>, wrap: impl FnOnce(T) -> RowValues) -> RowValues
where
    T: for<'a> FromSql<'a>,
{
    match T::from_sql(data) {
        Ok(Some(value)) => wrap(value),
        Ok(None) => RowValues::Null,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable temporal value; returned as NULL");
            RowValues::Null
        }
    }
}

fn numeric_value(n: Numeric) -> RowValues {
    if n.scale() == 0 {
        if let Ok(v) = i64::try_from(n.value()) {
            return RowValues::Int(v);
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let value = n.value() as f64 / 10f64.powi(i32::from(n.scale()));
    RowValues::Float(value)
}

/// Map a wire value to the crate's value set.
///
/// Temporal types without a zone become `Timestamp`/`Date`; `datetimeoffset`
/// is normalized to UTC; `time` is rendered as text.
pub(crate) fn convert_column_data(data: ColumnData<'static>) -> RowValues {
    #[allow(unreachable_patterns)]
    match data {
        ColumnData::U8(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map_or(RowValues::Null, RowValues::Int),
        ColumnData::F32(v) => v.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map_or(RowValues::Null, RowValues::Float),
        ColumnData::Bit(v) => v.map_or(RowValues::Null, RowValues::Bool),
        ColumnData::String(v) => v.map_or(RowValues::Null, |s| RowValues::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(RowValues::Null, |g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v.map_or(RowValues::Null, |b| RowValues::Blob(b.into_owned())),
        ColumnData::Numeric(v) => v.map_or(RowValues::Null, numeric_value),
        ColumnData::Xml(v) => {
            v.map_or(RowValues::Null, |x| RowValues::Text(x.into_owned().into_string()))
        }
        ColumnData::Date(_) => from_sql::<NaiveDate>(&data, RowValues::Date),
        ColumnData::Time(_) => from_sql::<NaiveTime>(&data, |t| RowValues::Text(t.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            from_sql::<NaiveDateTime>(&data, RowValues::Timestamp)
        }
        ColumnData::DateTimeOffset(_) => {
            from_sql::<DateTime<Utc>>(&data, |dt| RowValues::Timestamp(dt.naive_utc()))
        }
        _ => RowValues::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use tiberius::IntoSql;

    #[test]
    fn integers_widen_and_nulls_stay_null() {
        assert_eq!(convert_column_data(ColumnData::U8(Some(7))), RowValues::Int(7));
        assert_eq!(convert_column_data(ColumnData::I32(Some(-3))), RowValues::Int(-3));
        assert_eq!(convert_column_data(ColumnData::I32(None)), RowValues::Null);
        assert_eq!(convert_column_data(ColumnData::Bit(Some(true))), RowValues::Bool(true));
    }

    #[test]
    fn strings_and_binaries_are_owned() {
        assert_eq!(
            convert_column_data(ColumnData::String(Some(Cow::Owned("héllo".into())))),
            RowValues::Text("héllo".into())
        );
        assert_eq!(
            convert_column_data(ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))),
            RowValues::Blob(vec![1, 2])
        );
    }

    #[test]
    fn numerics_keep_integers_exact() {
        assert_eq!(
            convert_column_data(ColumnData::Numeric(Some(Numeric::new_with_scale(42, 0)))),
            RowValues::Int(42)
        );
        assert_eq!(
            convert_column_data(ColumnData::Numeric(Some(Numeric::new_with_scale(1250, 2)))),
            RowValues::Float(12.5)
        );
    }

    #[test]
    fn temporal_values_round_through_chrono() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(convert_column_data(dt.into_sql()), RowValues::Timestamp(dt));
        assert_eq!(
            convert_column_data(dt.date().into_sql()),
            RowValues::Date(dt.date())
        );
    }

    #[test]
    fn fixed_types_report_their_size() {
        assert_eq!(wire_type(ColumnType::Int4), (0x38, Some(4)));
        assert_eq!(wire_type(ColumnType::NVarchar), (0xE7, None));
    }
}
