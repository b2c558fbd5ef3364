use std::fmt::Write;

use chrono::{NaiveDate, NaiveDateTime};
use tiberius::Query;

use crate::driver::StatementRequest;
use crate::error::MssqlMiddlewareError;
use crate::registry::TypeTag;
use crate::types::{Parameter, RowValues};

/// `@name decl, @name decl` for the `sp_executesql` parameter list.
#[must_use]
pub fn declaration_list(params: &[Parameter]) -> String {
    let mut out = String::new();
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "@{} {}", param.name, param.type_tag.declaration());
    }
    out
}

/// Prepare a request for submission.
///
/// Without parameters the SQL goes out as-is. With parameters it is wrapped in
/// `sp_executesql` so the statement text can refer to them by name:
/// `EXEC sp_executesql @P1, @P2, @P3, ...` where `@P1` is the statement,
/// `@P2` the declaration list and `@P3..` the values in declaration order.
///
/// # Errors
/// Returns `MssqlMiddlewareError::ParameterError` when a value does not fit its declared type.
pub fn bind_statement(request: &StatementRequest) -> Result<Query<'_>, MssqlMiddlewareError> {
    if request.parameters.is_empty() {
        return Ok(Query::new(request.sql.as_str()));
    }

    let mut text = String::from("EXEC sp_executesql @P1, @P2");
    for i in 0..request.parameters.len() {
        let _ = write!(text, ", @P{}", i + 3);
    }

    let mut query = Query::new(text);
    query.bind(request.sql.as_str());
    query.bind(declaration_list(&request.parameters));
    for param in &request.parameters {
        bind_value(&mut query, param)?;
    }
    Ok(query)
}

fn binding_error(param: &Parameter, detail: &str) -> MssqlMiddlewareError {
    MssqlMiddlewareError::ParameterError(format!(
        "@{} ({}): {detail}",
        param.name, param.type_tag
    ))
}

fn checked_int<T: TryFrom<i64>>(param: &Parameter, value: i64) -> Result<T, MssqlMiddlewareError> {
    T::try_from(value).map_err(|_| binding_error(param, &format!("{value} is out of range")))
}

fn bind_value<'a>(query: &mut Query<'a>, param: &'a Parameter) -> Result<(), MssqlMiddlewareError> {
    if !param.type_tag.accepts(&param.value) {
        return Err(binding_error(
            param,
            &format!("cannot take a {} value", param.value.kind()),
        ));
    }

    match (&param.value, param.type_tag) {
        (RowValues::Null, tag) => bind_null(query, tag),
        (RowValues::Int(i), TypeTag::Bit) => query.bind(*i == 1),
        (RowValues::Int(i), TypeTag::TinyInt) => query.bind(checked_int::<u8>(param, *i)?),
        (RowValues::Int(i), TypeTag::SmallInt) => query.bind(checked_int::<i16>(param, *i)?),
        (RowValues::Int(i), TypeTag::Int) => query.bind(checked_int::<i32>(param, *i)?),
        (RowValues::Int(i), _) => query.bind(*i),
        (RowValues::Float(f), TypeTag::Real) => {
            #[allow(clippy::cast_possible_truncation)]
            query.bind(*f as f32);
        }
        (RowValues::Float(f), _) => query.bind(*f),
        (RowValues::Bool(b), _) => query.bind(*b),
        (RowValues::Text(s), _) => query.bind(s.as_str()),
        (RowValues::Timestamp(dt), TypeTag::Date) => query.bind(dt.date()),
        (RowValues::Timestamp(dt), TypeTag::Time) => query.bind(dt.time()),
        (RowValues::Timestamp(dt), _) => query.bind(*dt),
        (RowValues::Date(d), _) => query.bind(*d),
        (RowValues::Blob(bytes), _) => query.bind(bytes.as_slice()),
    }
    Ok(())
}

// NULLs still need a wire type the server can convert to the declared one
fn bind_null(query: &mut Query<'_>, tag: TypeTag) {
    match tag {
        TypeTag::Bit => query.bind(Option::<bool>::None),
        TypeTag::TinyInt | TypeTag::SmallInt | TypeTag::Int | TypeTag::BigInt => {
            query.bind(Option::<i64>::None);
        }
        TypeTag::Real
        | TypeTag::Float
        | TypeTag::Decimal
        | TypeTag::Numeric
        | TypeTag::Money
        | TypeTag::SmallMoney => query.bind(Option::<f64>::None),
        TypeTag::Date => query.bind(Option::<NaiveDate>::None),
        TypeTag::SmallDateTime
        | TypeTag::DateTime
        | TypeTag::DateTime2
        | TypeTag::DateTimeOffset => query.bind(Option::<NaiveDateTime>::None),
        TypeTag::Binary | TypeTag::VarBinary | TypeTag::Image => {
            query.bind(Option::<Vec<u8>>::None);
        }
        TypeTag::Time
        | TypeTag::Char
        | TypeTag::VarChar
        | TypeTag::Text
        | TypeTag::NChar
        | TypeTag::NVarChar
        | TypeTag::NText
        | TypeTag::UniqueIdentifier
        | TypeTag::Xml => query.bind(Option::<String>::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ResultShape;

    #[test]
    fn declarations_follow_parameter_order() {
        let params = vec![
            Parameter::new("id", TypeTag::Int, 1),
            Parameter::new("@name", TypeTag::NVarChar, "x"),
            Parameter::new("at", TypeTag::DateTime2, RowValues::Null),
        ];
        assert_eq!(
            declaration_list(&params),
            "@id int, @name nvarchar(max), @at datetime2(7)"
        );
    }

    #[test]
    fn out_of_range_ints_are_rejected_before_sending() {
        let request = StatementRequest::new(
            "select @v",
            &[Parameter::new("v", TypeTag::TinyInt, 300)],
            ResultShape::Rows,
        );
        let err = bind_statement(&request).err().unwrap();
        assert!(matches!(err, MssqlMiddlewareError::ParameterError(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        let request = StatementRequest::new(
            "select @v",
            &[Parameter::new("v", TypeTag::Int, "seven")],
            ResultShape::Rows,
        );
        assert!(bind_statement(&request).is_err());
    }

    #[test]
    fn plain_sql_binds_nothing() {
        let request = StatementRequest::new("select 1", &[], ResultShape::Rows);
        assert!(bind_statement(&request).is_ok());
    }
}
