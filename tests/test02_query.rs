use chrono::NaiveDate;
use mssql_middleware::test_utils::{Reply, ScriptedDriver, SubmissionPath};
use mssql_middleware::{
    ColumnDescriptor, ConnectionConfig, Database, MssqlMiddlewareError, Parameter, QueryOptions,
    Row, RowValues, TypeTag,
};

fn config() -> ConnectionConfig {
    ConnectionConfig::builder("scripted")
        .credentials("u", "p")
        .database("app")
        .finish()
}

async fn connected(driver: &ScriptedDriver) -> Database {
    let db = Database::new(config(), driver.clone());
    db.connect().await.unwrap();
    db
}

fn numbered(values: &[i64]) -> Vec<Row> {
    values
        .iter()
        .map(|v| Row::from_pairs([("n", RowValues::Int(*v)), ("label", format!("row {v}").into())]))
        .collect()
}

#[tokio::test]
async fn rows_keep_arrival_order() -> Result<(), MssqlMiddlewareError> {
    let driver =
        ScriptedDriver::new().on("select n, label from nums", Reply::rows(numbered(&[3, 1, 2])));
    let db = connected(&driver).await;

    let result = db
        .query("select n, label from nums", &[], QueryOptions::default())
        .await?;
    assert!(result.columns().is_none());
    let got: Vec<i64> = result
        .rows()
        .iter()
        .map(|r| *r.get("n").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(got, vec![3, 1, 2]);
    assert_eq!(result.rows()[1].get("label").unwrap().as_text(), Some("row 1"));
    Ok(())
}

#[tokio::test]
async fn column_metadata_on_request() -> Result<(), MssqlMiddlewareError> {
    let columns = vec![
        ColumnDescriptor::new("n", Some(4), 0x38, "Int4"),
        ColumnDescriptor::new("label", None, 0xE7, "NVarchar"),
    ];
    let driver = ScriptedDriver::new().on(
        "select n, label from nums",
        Reply::Rows {
            columns: columns.clone(),
            rows: numbered(&[1]),
        },
    );
    let db = connected(&driver).await;

    let result = db
        .query("select n, label from nums", &[], QueryOptions::with_columns())
        .await?;
    assert_eq!(result.columns(), Some(columns.as_slice()));
    assert_eq!(result.len(), 1);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["columns"][0]["colName"], "n");
    assert_eq!(json["columns"][0]["dataLength"], 4);
    assert_eq!(json["rows"][0]["n"], 1);
    Ok(())
}

#[tokio::test]
async fn empty_result_is_an_empty_row_list() -> Result<(), MssqlMiddlewareError> {
    let driver = ScriptedDriver::new().on("select * from empty", Reply::rows(Vec::new()));
    let db = connected(&driver).await;
    let result = db
        .query("select * from empty", &[], QueryOptions::default())
        .await?;
    assert!(result.is_empty());
    Ok(())
}

#[tokio::test]
async fn mid_stream_error_discards_buffered_rows() {
    let driver = ScriptedDriver::new().on(
        "select 1/0 from nums",
        Reply::RowsThenFail {
            rows: numbered(&[1, 2]),
            message: "Divide by zero error encountered.".into(),
        },
    );
    let db = connected(&driver).await;

    let err = db
        .query("select 1/0 from nums", &[], QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MssqlMiddlewareError::ExecutionError(_)));
    assert!(err.to_string().contains("Divide by zero"));

    // the connection is still usable afterwards
    let driver = driver.on("select 2", Reply::rows(numbered(&[2])));
    let result = db.query("select 2", &[], QueryOptions::default()).await;
    assert_eq!(result.unwrap().len(), 1);
    assert_eq!(driver.submissions().len(), 2);
}

#[tokio::test]
async fn query_int_binds_one_int_named_id() -> Result<(), MssqlMiddlewareError> {
    let sql = "select * from tbl where id_primary=@id";
    let driver = ScriptedDriver::new().on(sql, Reply::EchoParams);
    let db = connected(&driver).await;

    let result = db.query_int(sql, 7).await?;
    assert_eq!(result.rows()[0].get("id"), Some(&RowValues::Int(7)));

    let submitted = driver.submissions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].path, SubmissionPath::Statement);
    assert_eq!(submitted[0].parameters, vec![Parameter::new("id", TypeTag::Int, 7)]);
    Ok(())
}

#[tokio::test]
async fn parameters_round_trip_through_an_echo() -> Result<(), MssqlMiddlewareError> {
    let sql = "select @i as i, @s as s, @d as d, @n as n";
    let driver = ScriptedDriver::new().on(sql, Reply::EchoParams);
    let db = connected(&driver).await;

    let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let params = vec![
        Parameter::new("i", TypeTag::Int, 42),
        Parameter::new("@s", TypeTag::NVarChar, "snow ☃"),
        Parameter::new("d", TypeTag::Date, date),
        Parameter::new("n", TypeTag::VarChar, RowValues::Null),
    ];
    let result = db.query(sql, &params, QueryOptions::default()).await?;
    let row = &result.rows()[0];
    assert_eq!(row.get("i"), Some(&RowValues::Int(42)));
    assert_eq!(row.get("s"), Some(&RowValues::Text("snow ☃".into())));
    assert_eq!(row.get("d"), Some(&RowValues::Date(date)));
    assert_eq!(row.get("n"), Some(&RowValues::Null));
    assert_eq!(driver.submissions()[0].parameters, params);
    Ok(())
}

#[tokio::test]
async fn binding_rejections_come_from_the_driver() {
    let driver = ScriptedDriver::new().on(
        "select @a",
        Reply::RejectBinding("missing value for @a".into()),
    );
    let db = connected(&driver).await;
    let err = db
        .query("select @a", &[], QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MssqlMiddlewareError::ParameterError(_)));
    assert!(!err.is_contract_violation());
    assert_eq!(driver.submissions().len(), 1);
}

#[tokio::test]
async fn duplicate_column_names_keep_every_pair() -> Result<(), MssqlMiddlewareError> {
    let driver = ScriptedDriver::new().on(
        "select 1 as x, 2 as x",
        Reply::rows(vec![Row::from_pairs([("x", 1), ("x", 2)])]),
    );
    let db = connected(&driver).await;
    let result = db
        .query("select 1 as x, 2 as x", &[], QueryOptions::default())
        .await?;
    let row = &result.rows()[0];
    assert_eq!(row.get("x"), Some(&RowValues::Int(2)));
    assert_eq!(row.len(), 2);
    let pairs: Vec<_> = row.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
    assert_eq!(
        pairs,
        vec![
            ("x".to_string(), RowValues::Int(1)),
            ("x".to_string(), RowValues::Int(2))
        ]
    );
    Ok(())
}

#[tokio::test]
async fn query_lm_calls_consumer_once_per_row_in_order() -> Result<(), MssqlMiddlewareError> {
    let driver = ScriptedDriver::new().on("select n from big", Reply::rows(numbered(&[10, 20, 30, 40])));
    let db = connected(&driver).await;

    let mut seen = Vec::new();
    let count = db
        .query_lm("select n from big", &[], |row| {
            seen.push(*row.get("n").unwrap().as_int().unwrap());
        })
        .await?;
    assert_eq!(seen, vec![10, 20, 30, 40]);
    assert_eq!(count, seen.len() as u64);
    Ok(())
}

#[tokio::test]
async fn query_lm_keeps_rows_delivered_before_a_failure() {
    let driver = ScriptedDriver::new().on(
        "select n from flaky",
        Reply::RowsThenFail {
            rows: numbered(&[1, 2]),
            message: "Transport-level error".into(),
        },
    );
    let db = connected(&driver).await;

    let mut seen = 0;
    let result = db.query_lm("select n from flaky", &[], |_| seen += 1).await;
    assert!(result.is_err());
    assert_eq!(seen, 2);
}
