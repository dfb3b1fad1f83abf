#![cfg(feature = "sqlite")]

mod common;

use chrono::{TimeZone, Timelike, Utc};
use common::{TestDb, collect, count_rows};
use spanner_bridge::prelude::*;

const FOO: &str = "CREATE TABLE foo (f1 INT64 NOT NULL PRIMARY KEY)";

#[test]
fn transaction_commit_isolation() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;
    let other = db.open()?;

    let tx = conn.begin()?;
    tx.exec("INSERT INTO foo (f1) VALUES (1)", &[])?;
    assert_eq!(collect(tx.query("SELECT f1 FROM foo", &[])?)?.len(), 2);
    assert_eq!(count_rows(&other, "SELECT f1 FROM foo")?, 1);
    tx.commit()?;

    assert_eq!(count_rows(&other, "SELECT f1 FROM foo")?, 2);
    assert_eq!(count_rows(&db.open()?, "SELECT f1 FROM foo")?, 2);
    Ok(())
}

#[test]
fn transaction_rollback() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    tx.exec("INSERT INTO foo (f1) VALUES (1)", &[])?;
    tx.rollback()?;

    assert!(!conn.in_transaction());
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 1);
    Ok(())
}

#[test]
fn commit_in_failed_transaction() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    let err = tx.exec("INSERT INTO foo (f1) VALUES (0)", &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    assert!(tx.failed());
    assert_eq!(
        tx.exec("INSERT INTO foo (f1) VALUES (5)", &[]).unwrap_err(),
        DriverError::TxnFailed
    );
    assert_eq!(tx.commit().unwrap_err(), DriverError::TxnFailed);
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 1);
    Ok(())
}

#[test]
fn exec_reports_rows_affected() -> Result<(), DriverError> {
    let db = TestDb::new(&["CREATE TABLE temp (id INT64 NOT NULL PRIMARY KEY)"])?;
    let conn = db.open()?;

    let res = conn.exec("INSERT INTO temp (id) VALUES (0)", &[])?;
    assert_eq!(res.rows_affected()?, 1);
    assert_eq!(res.last_insert_id().unwrap_err(), DriverError::Unsupported);

    let res = conn.exec(
        "INSERT INTO temp (id) VALUES ($1), ($2), ($3)",
        &[1.into(), 2.into(), 3.into()],
    )?;
    assert_eq!(res.rows_affected()?, 3);
    Ok(())
}

#[test]
fn simple_query() -> Result<(), DriverError> {
    let db = TestDb::new(&[])?;
    let conn = db.open()?;
    let mut rows = conn.query("select 1", &[])?;
    assert_eq!(rows.next_row()?, Some(vec![Value::Int(1)]));
    assert_eq!(rows.next_row()?, None);
    Ok(())
}

#[test]
fn prepared_statements_interleave() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;

    let st = conn.prepare("SELECT 1 from foo")?;
    let st1 = conn.prepare("SELECT 2 from foo")?;
    assert_eq!(st.num_input(), 0);

    let mut r = st.query(&[])?;
    let mut r1 = st1.query(&[])?;
    let mut dest = [Value::Null];
    assert!(r.next_into(&mut dest)?);
    assert_eq!(dest[0].as_int(), Some(1));
    assert!(r1.next_into(&mut dest)?);
    assert_eq!(dest[0].as_int(), Some(2));
    r.close()?;
    r1.close()?;
    st.close()?;
    st1.close()?;
    Ok(())
}

#[test]
fn rows_close_before_done() -> Result<(), DriverError> {
    let db = TestDb::new(&[
        FOO,
        "INSERT INTO foo (f1) VALUES (0), (1), (2)",
    ])?;
    let conn = db.open()?;

    let mut rows = conn.query("SELECT f1 FROM foo", &[])?;
    rows.close()?;
    let mut dest = [Value::Null];
    assert!(!rows.next_into(&mut dest)?);
    assert!(!rows.next_into(&mut dest)?);
    Ok(())
}

#[test]
fn parameter_count_mismatch() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;

    let err = conn.query("SELECT false FROM foo", &[1.into()]).unwrap_err();
    assert_eq!(err, DriverError::ParameterCount { expected: 0, got: 1 });
    assert_eq!(count_rows(&conn, "SELECT 1 FROM foo")?, 1);

    let err = conn.query("SELECT $1 FROM foo", &[]).unwrap_err();
    assert_eq!(err, DriverError::ParameterCount { expected: 1, got: 0 });
    assert_eq!(count_rows(&conn, "SELECT 1 FROM foo")?, 1);
    Ok(())
}

#[test]
fn encode_decode() -> Result<(), DriverError> {
    let db = TestDb::new(&["CREATE TABLE encode_decode (
        id INT64 NOT NULL PRIMARY KEY,
        b BOOL,
        bs BYTES(MAX),
        f64 FLOAT64,
        int0 INT64,
        int1 INT64,
        int2 INT64,
        str STRING(MAX),
        ts TIMESTAMP,
        d DATE
    )"])?;
    let conn = db.open()?;
    let ts = Utc
        .with_ymd_and_hms(2000, 1, 1, 2, 3, 4)
        .unwrap()
        .with_nanosecond(5)
        .unwrap();
    conn.exec(
        "INSERT INTO encode_decode (id,int0,str,f64,b,ts,bs,int1,int2,d) VALUES (?,?,?,?,?,?,?,?,?,?)",
        &[
            1.into(),
            Option::<i64>::None.into(),
            "foobar".into(),
            2.5.into(),
            false.into(),
            ts.into(),
            vec![0_u8, 1, 2].into(),
            123_i64.into(),
            (-321_i64).into(),
            "2021-06-30".into(),
        ],
    )?;

    let stmt = conn.prepare(
        "SELECT bs,str,int0,ts,b,int1,int2,f64,d FROM encode_decode \
         WHERE bs = $1 AND str = $2 AND int0 IS NULL",
    )?;
    let mut rows = stmt.query(&[vec![0_u8, 1, 2].into(), "foobar".into()])?;
    assert_eq!(
        rows.columns(),
        ["bs", "str", "int0", "ts", "b", "int1", "int2", "f64", "d"]
    );
    let row = rows.next_row()?.expect("expected row");
    assert_eq!(row[0], Value::Bytes(vec![0, 1, 2]));
    assert_eq!(row[1], Value::Text("foobar".into()));
    assert_eq!(row[2], Value::Null);
    assert_eq!(row[3], Value::Timestamp(ts));
    assert_eq!(row[4], Value::Bool(false));
    assert_eq!(row[5], Value::Int(123));
    assert_eq!(row[6], Value::Int(-321));
    assert_eq!(row[7], Value::Float(2.5));
    assert_eq!(
        row[8],
        Value::Timestamp(Utc.with_ymd_and_hms(2021, 6, 30, 0, 0, 0).unwrap())
    );
    assert!(rows.next_row()?.is_none());
    Ok(())
}

#[test]
fn null_columns_decode_to_null_for_every_type() -> Result<(), DriverError> {
    let db = TestDb::new(&["CREATE TABLE nulls (
        id INT64 NOT NULL PRIMARY KEY,
        b BOOL, bs BYTES(MAX), f FLOAT64, i INT64, s STRING(MAX), ts TIMESTAMP, d DATE
    )"])?;
    let conn = db.open()?;
    conn.exec("INSERT INTO nulls (id) VALUES (1)", &[])?;
    let row = conn
        .query("SELECT b, bs, f, i, s, ts, d FROM nulls", &[])?
        .next_row()?
        .expect("expected row");
    assert!(row.iter().all(Value::is_null), "{row:?}");
    Ok(())
}

#[test]
fn string_columns_keep_numeric_looking_text() -> Result<(), DriverError> {
    let db = TestDb::new(&["CREATE TABLE s (id INT64 NOT NULL PRIMARY KEY, v STRING(1024))"])?;
    let conn = db.open()?;
    let texts = ["007", "1.50", "1e3", "12"];
    for (id, text) in (0_i64..).zip(texts) {
        conn.exec("INSERT INTO s (id, v) VALUES ($1, $2)", &[id.into(), text.into()])?;
    }
    let rows = collect(conn.query("SELECT v FROM s ORDER BY id", &[])?)?;
    let expected: Vec<Vec<Value>> = texts.iter().map(|t| vec![Value::Text((*t).into())]).collect();
    assert_eq!(rows, expected);
    Ok(())
}

#[test]
fn date_read_back_can_be_written_again() -> Result<(), DriverError> {
    let db = TestDb::new(&[
        "CREATE TABLE days (id INT64 NOT NULL PRIMARY KEY, d DATE)",
        "INSERT INTO days (id, d) VALUES (1, '2021-06-30')",
    ])?;
    let conn = db.open()?;
    let midnight = Value::Timestamp(Utc.with_ymd_and_hms(2021, 6, 30, 0, 0, 0).unwrap());

    let read = conn
        .query("SELECT d FROM days WHERE id = 1", &[])?
        .next_row()?
        .expect("expected row");
    assert_eq!(read[0], midnight);
    conn.exec("INSERT INTO days (id, d) VALUES (2, ?)", &[read[0].clone()])?;

    let rows = collect(conn.query("SELECT d FROM days ORDER BY id", &[])?)?;
    assert_eq!(rows, [vec![midnight.clone()], vec![midnight]]);
    Ok(())
}

#[test]
fn syntax_error_is_invalid_argument() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;
    assert_eq!(conn.query("SELEC 1", &[]).unwrap_err().code(), ErrorCode::InvalidArgument);
    assert_eq!(
        conn.exec("INSERT INTO foo VALUES 1", &[]).unwrap_err().code(),
        ErrorCode::InvalidArgument
    );
    Ok(())
}

#[test]
fn no_data() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;

    let st = conn.prepare("SELECT 1 FROM foo WHERE 1 = 0")?;
    let mut rows = st.query(&[])?;
    assert!(rows.columns().is_empty());
    assert!(rows.next_row()?.is_none());

    let err = conn
        .query("SELECT * FROM nonexistenttable WHERE age=$1", &[20.into()])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(conn.query("SELECT * FROM nonexistenttable", &[]).is_err());
    Ok(())
}

#[test]
fn error_on_exec_in_transaction() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    let err = tx.exec("INSERT INTO foo (f1) VALUES (0), (0)", &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    // The command failure is the terminal outcome, so rollback reports it.
    assert_eq!(tx.rollback().unwrap_err().code(), ErrorCode::AlreadyExists);
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 0);
    Ok(())
}

#[test]
fn error_on_query_in_transaction() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    let err = tx.query("INSERT INTO foo (f1) VALUES (0), (0)", &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    assert_eq!(
        tx.query("SELECT f1 FROM foo", &[]).unwrap_err(),
        DriverError::TxnFailed
    );
    Ok(())
}

#[test]
fn unique_index_violation() -> Result<(), DriverError> {
    let db = TestDb::new(&[
        "CREATE TABLE foo (f1 INT64 NOT NULL PRIMARY KEY, f2 INT64)",
        "CREATE UNIQUE INDEX ukey ON foo (f2)",
        "INSERT INTO foo (f1, f2) VALUES (0, 0), (1, 1)",
    ])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    let err = tx.query("INSERT INTO foo (f1,f2) VALUES (2,0)", &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    drop(tx);
    assert!(!conn.in_transaction());
    Ok(())
}

#[test]
fn begin_while_running_fails_until_finished() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    assert_eq!(conn.begin().unwrap_err(), DriverError::TxnStarted);
    assert!(tx.exec("INSERT INTO foo (f1) VALUES (0)", &[]).is_err());
    assert_eq!(conn.begin().unwrap_err(), DriverError::TxnStarted);
    let _ = tx.rollback();

    let tx = conn.begin()?;
    tx.exec("INSERT INTO foo (f1) VALUES (1)", &[])?;
    tx.commit()?;
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 2);
    Ok(())
}

#[test]
fn connection_routes_through_active_transaction() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;

    let tx = conn.begin()?;
    conn.exec("INSERT INTO foo (f1) VALUES (?)", &[7.into()])?;
    assert!(conn.in_transaction());
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 1);
    tx.rollback()?;
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 0);
    Ok(())
}

#[test]
fn read_only_transaction_rejects_writes() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO, "INSERT INTO foo (f1) VALUES (0)"])?;
    let conn = db.open()?;

    let tx = conn.begin_tx(TxOptions::read_only())?;
    assert!(tx.read_only());
    assert_eq!(
        tx.exec("INSERT INTO foo (f1) VALUES (1)", &[]).unwrap_err(),
        DriverError::TxnReadOnly
    );
    assert!(!tx.failed());
    assert_eq!(collect(tx.query("SELECT f1 FROM foo", &[])?)?.len(), 1);
    tx.commit()?;
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 1);
    Ok(())
}

#[test]
fn dropped_transaction_rolls_back() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;
    {
        let tx = conn.begin()?;
        tx.exec("INSERT INTO foo (f1) VALUES (1)", &[])?;
    }
    assert!(!conn.in_transaction());
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 0);
    conn.begin()?.commit()?;
    Ok(())
}

#[test]
fn direct_queries_run_on_read_only_snapshot() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;
    let err = conn.query("INSERT INTO foo (f1) VALUES (1)", &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FailedPrecondition);
    assert_eq!(count_rows(&conn, "SELECT f1 FROM foo")?, 0);
    Ok(())
}

#[test]
fn closed_connection_rejects_work() -> Result<(), DriverError> {
    let db = TestDb::new(&[FOO])?;
    let conn = db.open()?;
    conn.close()?;
    conn.close()?;
    assert!(matches!(
        conn.prepare("SELECT 1"),
        Err(DriverError::ConnectionError(_))
    ));
    assert!(matches!(conn.begin(), Err(DriverError::ConnectionError(_))));
    Ok(())
}

#[test]
fn options_from_connection_string() -> Result<(), DriverError> {
    let db = TestDb::new(&[])?;
    let uri = format!("{}?busy_timeout_ms=100&max_retries=0", common::URI);
    let conn = db.registry.open(DRIVER_NAME, &uri)?;
    assert_eq!(conn.dsn().to_string(), "projects/test-project/instances/test-instance/databases/testdb");
    assert!(matches!(
        db.registry.open(DRIVER_NAME, &format!("{}?max_retries=lots", common::URI)),
        Err(DriverError::ConfigError(_))
    ));
    Ok(())
}
