#![cfg(feature = "mssql")]
//! Runs against a real SQL Server when `MSSQL_TEST_CONFIG` points at a JSON
//! connection config; returns early otherwise.

use chrono::NaiveDate;
use mssql_middleware::prelude::*;

fn live_config() -> Option<ConnectionConfig> {
    let path = std::env::var_os("MSSQL_TEST_CONFIG")?;
    Some(ConnectionConfig::from_path(path).expect("MSSQL_TEST_CONFIG is not a valid config"))
}

#[tokio::test]
async fn live_round_trip() -> Result<(), MssqlMiddlewareError> {
    let Some(config) = live_config() else {
        eprintln!("MSSQL_TEST_CONFIG not set; skipping live test");
        return Ok(());
    };
    let db = Database::mssql(config);
    db.connect().await?;

    db.execute_batch(
        "create table #people (id int identity(1,1) primary key, name nvarchar(50), born date null)",
    )
    .await?;

    let date = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();
    let inserted = db
        .execute(
            "insert into #people (name, born) values (@name, @born)",
            &[
                Parameter::new("name", TypeTag::NVarChar, "Ada"),
                Parameter::new("born", TypeTag::Date, date),
            ],
        )
        .await?;
    assert_eq!(inserted, 1);
    assert_eq!(db.identity().await?, RowValues::Int(1));

    // temp tables created on the parameterized path vanish with its scope
    db.execute("create table #gone (id int)", &[]).await?;
    assert!(db.execute_batch("select * from #gone").await.is_err());

    let echoed = db
        .query(
            "select @i as i, @s as s, @d as d, @n as n",
            &[
                Parameter::new("i", TypeTag::Int, 42),
                Parameter::new("s", TypeTag::NVarChar, "snow ☃"),
                Parameter::new("d", TypeTag::Date, date),
                Parameter::new("n", TypeTag::Int, RowValues::Null),
            ],
            QueryOptions::with_columns(),
        )
        .await?;
    let row = &echoed.rows()[0];
    assert_eq!(row.get("i"), Some(&RowValues::Int(42)));
    assert_eq!(row.get("s"), Some(&RowValues::Text("snow ☃".into())));
    assert_eq!(row.get("d"), Some(&RowValues::Date(date)));
    assert_eq!(row.get("n"), Some(&RowValues::Null));
    assert_eq!(echoed.columns().map(<[_]>::len), Some(4));

    let outcomes = db
        .batch_sql(&["select 1", "select * from no_such_table", "select 2"])
        .await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success() && !outcomes[1].is_success() && outcomes[2].is_success());

    db.begin_transaction().await?;
    db.rollback_transaction().await?;

    db.disconnect().await;
    db.disconnect().await;
    Ok(())
}
