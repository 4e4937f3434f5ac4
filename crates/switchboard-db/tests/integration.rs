use switchboard_db::{create_pool, run_migrations, DbRuntimeSettings};

#[test]
fn migrated_database_holds_call_summaries() {
    let pool = create_pool(":memory:", DbRuntimeSettings::default()).expect("pool");
    let conn = pool.get().expect("connection");
    run_migrations(&conn).expect("migrations");

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .expect("prepare");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("query")
        .map(|r| r.expect("row"))
        .collect();
    assert_eq!(tables, ["_switchboard_migrations", "call_summaries"]);

    conn.execute(
        "INSERT INTO call_summaries (call_id, summary, raw_payload) VALUES (?1, ?2, ?3)",
        ["abc", "caller asked about weather", "{}"],
    )
    .expect("insert");
    let duplicate = conn.execute(
        "INSERT INTO call_summaries (call_id, summary, raw_payload) VALUES (?1, ?2, ?3)",
        ["abc", "again", "{}"],
    );
    assert!(duplicate.is_err(), "call_id must be unique");
}

#[test]
fn migrations_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("switchboard.db");
    let path = path.to_str().expect("utf-8 path");

    {
        let pool = create_pool(path, DbRuntimeSettings::default()).expect("pool");
        let conn = pool.get().expect("connection");
        assert!(run_migrations(&conn).expect("first run") > 0);
    }

    let pool = create_pool(path, DbRuntimeSettings::default()).expect("pool");
    let conn = pool.get().expect("connection");
    assert_eq!(run_migrations(&conn).expect("second run"), 0);
}
