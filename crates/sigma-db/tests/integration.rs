use serde_json::json;
use sigma_db::{Database, DbError, DbRuntimeSettings, QueryResult, SqlParam, WriteSummary};

fn rows(result: QueryResult) -> Vec<serde_json::Value> {
    match result {
        QueryResult::Rows(rows) => rows
            .iter()
            .map(|row| serde_json::to_value(row).unwrap())
            .collect(),
        QueryResult::Write(summary) => panic!("expected rows, got {summary:?}"),
    }
}

fn write(result: QueryResult) -> WriteSummary {
    match result {
        QueryResult::Write(summary) => summary,
        QueryResult::Rows(rows) => panic!("expected write summary, got {rows:?}"),
    }
}

#[test]
fn create_insert_select_round() {
    let db = Database::open_in_memory().unwrap();

    let created = write(
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
            .unwrap(),
    );
    assert_eq!(created.changes, 0);

    let inserted = write(
        db.execute(
            "INSERT INTO t (v) VALUES (?)",
            &[SqlParam::Text("hello".to_string())],
        )
        .unwrap(),
    );
    assert_eq!(
        inserted,
        WriteSummary {
            changes: 1,
            last_insert_id: 1
        }
    );

    let selected = rows(db.execute("SELECT * FROM t", &[]).unwrap());
    assert_eq!(selected, vec![json!({"id": 1, "v": "hello"})]);
}

#[test]
fn rows_come_back_in_engine_order() {
    let db = Database::open_in_memory().unwrap();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
        .unwrap();
    for v in ["c", "a", "b"] {
        db.execute(
            "INSERT INTO t (v) VALUES (?)",
            &[SqlParam::Text(v.to_string())],
        )
        .unwrap();
    }

    let selected = rows(db.execute("SELECT v FROM t", &[]).unwrap());
    assert_eq!(selected, vec![json!({"v": "c"}), json!({"v": "a"}), json!({"v": "b"})]);

    let empty = rows(
        db.execute("SELECT v FROM t WHERE v = ?", &[SqlParam::Text("z".into())])
            .unwrap(),
    );
    assert!(empty.is_empty());
}

#[test]
fn bound_text_is_never_reinterpreted_as_sql() {
    let db = Database::open_in_memory().unwrap();
    db.execute("CREATE TABLE t (x TEXT)", &[]).unwrap();

    let payload = "a';DROP TABLE t";
    let summary = write(
        db.execute(
            "INSERT INTO t(x) VALUES (?)",
            &[SqlParam::Text(payload.to_string())],
        )
        .unwrap(),
    );
    assert_eq!(summary.changes, 1);

    let stored = rows(db.execute("SELECT x FROM t", &[]).unwrap());
    assert_eq!(stored, vec![json!({ "x": payload })]);
}

#[test]
fn update_and_delete_report_affected_rows() {
    let db = Database::open_in_memory().unwrap();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER)", &[])
        .unwrap();
    for n in 1..=4 {
        db.execute("INSERT INTO t (n) VALUES (?)", &[SqlParam::Integer(n)])
            .unwrap();
    }

    let updated = write(
        db.execute(
            "UPDATE t SET n = n * 10 WHERE n > ?",
            &[SqlParam::Integer(2)],
        )
        .unwrap(),
    );
    assert_eq!(updated.changes, 2);

    let deleted = write(db.execute("DELETE FROM t", &[]).unwrap());
    assert_eq!(deleted.changes, 4);
}

#[test]
fn lowercase_select_with_padding_returns_rows() {
    let db = Database::open_in_memory().unwrap();
    let selected = rows(db.execute("  select 1", &[]).unwrap());
    assert_eq!(selected, vec![json!({"1": 1})]);
}

#[test]
fn column_types_map_to_json() {
    let db = Database::open_in_memory().unwrap();
    let selected = rows(
        db.execute(
            "SELECT ? AS n, ? AS r, ? AS s, NULL AS z, x'0102' AS b",
            &[
                SqlParam::Integer(3),
                SqlParam::Real(0.5),
                SqlParam::Text("s".into()),
            ],
        )
        .unwrap(),
    );
    assert_eq!(
        selected,
        vec![json!({"n": 3, "r": 0.5, "s": "s", "z": null, "b": "AQI="})]
    );
}

#[test]
fn driver_errors_pass_through_unmodified() {
    let db = Database::open_in_memory().unwrap();

    let err = db.execute("SELECT * FROM missing", &[]).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
    assert!(err.to_string().contains("no such table: missing"), "{err}");

    db.execute("CREATE TABLE u (id INTEGER PRIMARY KEY, k TEXT UNIQUE)", &[])
        .unwrap();
    db.execute("INSERT INTO u (k) VALUES ('a')", &[]).unwrap();
    let err = db
        .execute("INSERT INTO u (k) VALUES ('a')", &[])
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE constraint failed"), "{err}");

    let err = db.execute("CREAT TABLE nope (x)", &[]).unwrap_err();
    assert!(err.to_string().contains("syntax error"), "{err}");
}

#[test]
fn unbound_placeholders_read_as_null() {
    let db = Database::open_in_memory().unwrap();

    let selected = rows(db.execute("SELECT ? AS v", &[]).unwrap());
    assert_eq!(selected, vec![json!({"v": null})]);

    db.execute("CREATE TABLE t (a INTEGER, b TEXT)", &[]).unwrap();
    let inserted = write(
        db.execute("INSERT INTO t (a, b) VALUES (?, ?)", &[SqlParam::Integer(7)])
            .unwrap(),
    );
    assert_eq!(inserted.changes, 1);

    let selected = rows(db.execute("SELECT a, b FROM t", &[]).unwrap());
    assert_eq!(selected, vec![json!({"a": 7, "b": null})]);
}

#[test]
fn surplus_params_are_a_range_error() {
    let db = Database::open_in_memory().unwrap();

    let err = db
        .execute("SELECT ? AS v", &[SqlParam::Integer(1), SqlParam::Integer(2)])
        .unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)), "{err:?}");
    assert_eq!(err.to_string(), "column index out of range");

    db.execute("CREATE TABLE t (v INTEGER)", &[]).unwrap();
    let err = db
        .execute("INSERT INTO t (v) VALUES (1)", &[SqlParam::Integer(1)])
        .unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)), "{err:?}");

    let count = rows(db.execute("SELECT COUNT(*) AS n FROM t", &[]).unwrap());
    assert_eq!(count, vec![json!({"n": 0})]);
}

#[test]
fn duplicate_column_names_collapse_to_last_value() {
    let db = Database::open_in_memory().unwrap();

    let result = db.execute("SELECT 1 AS a, 2 AS a", &[]).unwrap();
    let QueryResult::Rows(raw) = &result else {
        panic!("expected rows, got {result:?}");
    };
    assert_eq!(raw[0].columns(), ["a"]);
    assert_eq!(raw[0].get("a"), Some(&json!(2)));
    assert_eq!(serde_json::to_string(&result).unwrap(), r#"[{"a":2}]"#);

    for sql in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
        "INSERT INTO users (id, name) VALUES (1, 'ada')",
        "INSERT INTO posts (id, user_id, title) VALUES (10, 1, 'notes')",
    ] {
        db.execute(sql, &[]).unwrap();
    }

    let joined = rows(
        db.execute(
            "SELECT users.id, name, posts.id, title FROM users JOIN posts ON posts.user_id = users.id",
            &[],
        )
        .unwrap(),
    );
    assert_eq!(joined, vec![json!({"id": 10, "name": "ada", "title": "notes"})]);
}

#[test]
fn file_database_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db").join("sigma.db");
    let path = path.to_str().unwrap();

    let db = Database::open(path, DbRuntimeSettings::default()).unwrap();
    db.execute("CREATE TABLE t (v TEXT)", &[]).unwrap();
    db.execute("INSERT INTO t (v) VALUES ('kept')", &[]).unwrap();
    db.close().unwrap();

    let reopened = Database::open(path, DbRuntimeSettings::default()).unwrap();
    let selected = rows(reopened.execute("SELECT v FROM t", &[]).unwrap());
    assert_eq!(selected, vec![json!({"v": "kept"})]);
}

#[tokio::test]
async fn async_execution_and_close() {
    let db = Database::open_in_memory().unwrap();

    let result = db
        .execute_async("SELECT 2 AS two".to_string(), Vec::new())
        .await
        .unwrap();
    assert_eq!(rows(result), vec![json!({"two": 2})]);

    db.close_async().await.unwrap();
    assert!(db.is_closed());

    let err = db
        .execute_async("SELECT 1".to_string(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Closed));
}
