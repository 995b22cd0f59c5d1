//! End-to-end execution against the bundled SQLite driver.

use porta_core::config::DbConfig;
use porta_core::errors::ErrorKind;
use porta_core::params;
use porta_core::value::{Params, Value};
use porta_db::row::QueryOne;
use porta_db::{connect, Connection};

fn setup() -> Connection {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut db = connect(&DbConfig::new("sqlite")).unwrap();
    db.execute(
        "CREATE TABLE [:table schema=ident name=account_info] (
            account_id INTEGER NOT NULL PRIMARY KEY,
            account_name CHAR(16) NOT NULL UNIQUE,
            owner_type INTEGER NOT NULL,
            expire_date DATE,
            active [:boolean default=true]
        )",
        &Params::default(),
    )
    .unwrap();
    for (id, name, owner) in [(1, "bootsie", 101), (2, "mortimer", 101), (3, "zaphod", 202)] {
        db.execute(
            "INSERT INTO [:table schema=ident name=account_info]
               (account_id, account_name, owner_type)
             VALUES (:id, :name, :owner)",
            &params! { "id" => id, "name" => name, "owner" => Value::Code(owner) },
        )
        .unwrap();
    }
    db
}

#[test]
fn query_returns_wrapped_rows_with_lowercase_names() {
    let mut db = setup();
    let rows = db
        .query(
            "SELECT account_id AS ID, account_name AS NAME
             FROM [:table schema=ident name=account_info]
             ORDER BY account_id",
            &Params::default(),
        )
        .unwrap()
        .expect("select produces a result set");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].columns(), ["id", "name"]);
    assert_eq!(rows[0].get("name"), Some(&Value::Text("bootsie".into())));
    assert_eq!(rows[2][0], Value::Int(3));
    let names: Vec<&str> = rows[0].iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["id", "name"]);
}

#[test]
fn ddl_and_dml_produce_no_result_set() {
    let mut db = setup();
    let result = db
        .query(
            "UPDATE [:table schema=ident name=account_info]
             SET owner_type = :t WHERE account_id = :id",
            &params! { "t" => 303, "id" => 1 },
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn query_1_cardinality_and_collapse() {
    let mut db = setup();

    // one row, one column → scalar
    let got = db
        .query_1(
            "SELECT account_name FROM [:table schema=ident name=account_info]
             WHERE account_id = :id",
            &params! { "id" => 2 },
        )
        .unwrap();
    assert_eq!(got, QueryOne::Scalar(Value::Text("mortimer".into())));

    // one row, two columns → row
    let got = db
        .query_1(
            "SELECT account_id, account_name
             FROM [:table schema=ident name=account_info] WHERE account_id = :id",
            &params! { "id" => 2 },
        )
        .unwrap();
    let row = got.row().expect("two columns stay a row");
    assert_eq!(row.len(), 2);
    assert_eq!(row.get("account_name"), Some(&Value::Text("mortimer".into())));

    // zero rows → NotFound
    let err = db
        .query_1(
            "SELECT account_id FROM [:table schema=ident name=account_info]
             WHERE account_id = :id",
            &params! { "id" => 999 },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // several rows → TooManyRows
    let err = db
        .query_1(
            "SELECT account_id FROM [:table schema=ident name=account_info]
             WHERE owner_type = :owner",
            &params! { "owner" => 101 },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManyRows);
}

#[test]
fn missing_bind_fails_before_reaching_the_driver() {
    let mut db = setup();
    let err = db
        .execute(
            "DELETE FROM [:table schema=ident name=account_info] WHERE account_id = :id",
            &Params::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert!(err.message().contains("id"));

    // Nothing was deleted.
    let QueryOne::Scalar(count) = db
        .query_1(
            "SELECT COUNT(*) FROM [:table schema=ident name=account_info]",
            &Params::default(),
        )
        .unwrap()
    else {
        panic!("count is a scalar");
    };
    assert_eq!(count, Value::Int(3));
}

#[test]
fn integrity_errors_carry_kind_and_sql_context() {
    let mut db = setup();
    let err = db
        .execute(
            "INSERT INTO [:table schema=ident name=account_info]
               (account_id, account_name, owner_type)
             VALUES (:id, :name, :owner)",
            &params! { "id" => 4, "name" => "bootsie", "owner" => 1 },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    let ctx = err.context().expect("execution errors carry context");
    assert!(ctx.sql.as_deref().unwrap().contains("INSERT INTO account_info"));
    assert!(ctx.operation.as_deref().unwrap().contains("[:table"));
}

#[test]
fn repeated_statements_hit_the_translation_cache() {
    let mut db = setup();
    let stmt = "SELECT account_name FROM [:table schema=ident name=account_info]
                WHERE account_id = :id";
    let first = db.query_1(stmt, &params! { "id" => 1 }).unwrap();
    let second = db.query_1(stmt, &params! { "id" => 3 }).unwrap();
    assert_eq!(first, QueryOne::Scalar(Value::Text("bootsie".into())));
    assert_eq!(second, QueryOne::Scalar(Value::Text("zaphod".into())));
}

#[test]
fn execute_many_rejects_result_sets() {
    let mut db = setup();
    let mut cursor = db.cursor().unwrap();
    cursor
        .execute_many(
            "UPDATE account_info SET owner_type = :t WHERE account_id = :id",
            &[
                params! { "t" => 7, "id" => 1 },
                params! { "t" => 8, "id" => 2 },
            ],
        )
        .unwrap();

    let err = cursor
        .execute_many("SELECT * FROM account_info", &[Params::default()])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
}

#[test]
fn streaming_uses_an_independent_cursor() {
    let mut db = setup();
    let mut cursor = db.cursor().unwrap();
    for i in 0..200 {
        cursor
            .execute(
                "INSERT INTO account_info (account_id, account_name, owner_type)
                 VALUES (:id, :name, :owner)",
                &params! { "id" => 1000 + i, "name" => format!("acc{i}"), "owner" => 1 },
            )
            .unwrap();
    }

    let stream = cursor
        .query_stream(
            "SELECT account_id FROM account_info ORDER BY account_id",
            &Params::default(),
        )
        .unwrap()
        .expect("select streams rows");

    let mut seen = 0;
    for (i, row) in stream.enumerate() {
        let row = row.unwrap();
        assert!(row.get("account_id").is_some());
        // Reusing the owning cursor mid-stream must not disturb the
        // stream.
        if i == 5 {
            cursor
                .execute(
                    "UPDATE account_info SET owner_type = :t WHERE account_id = :id",
                    &params! { "t" => 9, "id" => 1 },
                )
                .unwrap();
        }
        seen += 1;
    }
    assert_eq!(seen, 203);

    // Streaming a statement with no result set yields None.
    assert!(cursor
        .query_stream(
            "UPDATE account_info SET owner_type = 1 WHERE account_id = 1",
            &Params::default(),
        )
        .unwrap()
        .is_none());
}

#[test]
fn ping_and_locking_are_noops_that_succeed() {
    let mut db = setup();
    db.ping().unwrap();
    db.lock_table("account_info", "EXCLUSIVE").unwrap();
    db.commit().unwrap();
    db.rollback().unwrap();
}

#[test]
fn emulated_sequences_round_trip() {
    let mut db = connect(&DbConfig::new("sqlite")).unwrap();
    db.execute(
        "CREATE SEQUENCE account_id_seq [:sequence_start value=1000]",
        &Params::default(),
    )
    .unwrap();

    assert_eq!(db.nextval("account_id_seq").unwrap(), 1000);
    assert_eq!(db.nextval("account_id_seq").unwrap(), 1001);
    assert_eq!(db.currval("account_id_seq").unwrap(), 1001);

    // The counter is also visible through the current-value directive.
    let got = db
        .query_1(
            "SELECT [:sequence schema=ident name=account_id_seq op=current] [:from_dual]",
            &Params::default(),
        )
        .unwrap();
    assert_eq!(got, QueryOne::Scalar(Value::Int(1001)));

    // op=next cannot be spliced into SQL on this backend.
    let err = db
        .query_1(
            "SELECT [:sequence schema=ident name=account_id_seq op=next] [:from_dual]",
            &Params::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test]
fn sqlite_ddl_fixups_apply() {
    let mut db = setup();

    // ADD CONSTRAINT is silently dropped on this backend.
    db.execute(
        "ALTER TABLE account_info ADD CONSTRAINT account_owner_fk
         FOREIGN KEY (owner_type) REFERENCES owner_code(code)",
        &Params::default(),
    )
    .unwrap();

    // DATE columns were remapped to TEXT at creation; ISO text round
    // trips.
    db.execute(
        "UPDATE account_info SET expire_date = :d WHERE account_id = :id",
        &params! { "d" => "2026-12-24 00:00:00", "id" => 1 },
    )
    .unwrap();
    let got = db
        .query_1(
            "SELECT expire_date FROM account_info WHERE account_id = :id",
            &params! { "id" => 1 },
        )
        .unwrap();
    assert_eq!(got, QueryOne::Scalar(Value::Text("2026-12-24 00:00:00".into())));
}

#[test]
fn code_values_reach_the_driver_as_integers() {
    let mut db = setup();
    let rows = db
        .query(
            "SELECT account_id FROM account_info WHERE owner_type = :owner",
            &params! { "owner" => Value::Code(202) },
        )
        .unwrap()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(3));
}

#[test]
fn unknown_backend_is_an_interface_error() {
    let err = connect(&DbConfig::new("dbase3")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Interface);
}
