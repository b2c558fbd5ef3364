use mssql_middleware::test_utils::{Reply, ScriptedDriver, SubmissionPath};
use mssql_middleware::{
    BatchOutcome, ConnectionConfig, Database, MssqlMiddlewareError, Parameter, TypeTag,
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

#[tokio::test]
async fn execute_reports_the_completion_count() -> Result<(), MssqlMiddlewareError> {
    // a trigger makes the server report 1 and then 4 before the request completes with 5
    let sql = "update accounts set active = 0 where region = @region";
    let driver = ScriptedDriver::new().on(sql, Reply::Count(vec![1, 4]));
    let db = connected(&driver).await;

    let params = [Parameter::new("region", TypeTag::VarChar, "emea")];
    assert_eq!(db.execute(sql, &params).await?, 5);
    assert_eq!(driver.submissions()[0].parameters, params.to_vec());
    Ok(())
}

#[tokio::test]
async fn execute_int_binds_id() -> Result<(), MssqlMiddlewareError> {
    let sql = "delete from tbl where id_primary=@id";
    let driver = ScriptedDriver::new().on(sql, Reply::count(1));
    let db = connected(&driver).await;

    assert_eq!(db.execute_int(sql, 99).await?, 1);
    assert_eq!(driver.submissions()[0].parameters, vec![Parameter::int_id(99)]);
    Ok(())
}

#[tokio::test]
async fn execute_failure_is_an_execution_error() {
    let driver = ScriptedDriver::new().on(
        "insert into t values (1)",
        Reply::fail("Violation of PRIMARY KEY constraint 'PK_t'."),
    );
    let db = connected(&driver).await;
    let err = db.execute("insert into t values (1)", &[]).await.unwrap_err();
    assert!(matches!(err, MssqlMiddlewareError::ExecutionError(_)));
    assert!(err.to_string().contains("PK_t"));
}

#[tokio::test]
async fn execute_batch_uses_the_batch_path() -> Result<(), MssqlMiddlewareError> {
    let create = "create table #scratch (id int); insert into #scratch values (1), (2)";
    let driver = ScriptedDriver::new()
        .on(create, Reply::Count(vec![0, 2]))
        .on("select count(*) from #scratch", Reply::count(0));
    let db = connected(&driver).await;

    assert_eq!(db.execute_batch(create).await?, 2);
    let submitted = driver.submissions();
    assert_eq!(submitted[0].path, SubmissionPath::Batch);
    assert!(submitted[0].parameters.is_empty());
    Ok(())
}

#[tokio::test]
async fn batch_keeps_going_after_a_failure() {
    let statements = [
        "update a set x = 1",
        "update missing set x = 1",
        "update c set x = 1",
    ];
    let driver = ScriptedDriver::new()
        .on(statements[0], Reply::count(3))
        .on(statements[1], Reply::fail("Invalid object name 'missing'."))
        .on(statements[2], Reply::count(7));
    let db = connected(&driver).await;

    let outcomes = db.batch_sql(&statements).await;
    assert_eq!(outcomes.len(), statements.len());
    for (outcome, statement) in outcomes.iter().zip(statements) {
        assert_eq!(outcome.statement(), statement);
    }
    assert_eq!(outcomes[0].count(), Some(3));
    assert!(!outcomes[1].is_success());
    assert!(outcomes[1].error().unwrap().contains("Invalid object name"));
    assert_eq!(outcomes[2].count(), Some(7));

    // every statement ran, one at a time, in order, on the execute path
    assert_eq!(driver.submitted_sql(), statements.to_vec());
    assert!(
        driver
            .submissions()
            .iter()
            .all(|s| s.path == SubmissionPath::Statement)
    );
    assert_eq!(driver.max_in_flight(), 1);
}

#[tokio::test]
async fn batch_outcomes_serialize_as_statement_records() {
    let driver = ScriptedDriver::new().on("update a set x = 1", Reply::count(2));
    let db = connected(&driver).await;

    let outcomes = db
        .batch_sql(&["update a set x = 1".to_string(), "oops".to_string()])
        .await;
    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0], serde_json::json!({"statement": "update a set x = 1", "count": 2}));
    assert_eq!(json[1]["statement"], "oops");
    assert!(json[1]["error"].as_str().unwrap().contains("oops"));
}

#[tokio::test]
async fn empty_batch_and_unconnected_batch() {
    let driver = ScriptedDriver::new();
    let db = Database::new(config(), driver.clone());

    let empty: [&str; 0] = [];
    assert!(db.batch_sql(&empty).await.is_empty());

    let outcomes = db.batch_sql(&["select 1", "select 2"]).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| matches!(o, BatchOutcome::Failure { .. })));
    assert!(driver.submissions().is_empty());
}
