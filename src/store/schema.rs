use rusqlite::Connection;

/// Drop and recreate both tables. Every open starts from an empty store.
pub(super) const SCHEMA: &str = "
DROP TABLE IF EXISTS message_part;
DROP TABLE IF EXISTS message;

CREATE TABLE message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT,
    recipients TEXT,
    subject TEXT,
    source TEXT,
    size INTEGER,
    type TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);

CREATE TABLE message_part (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL,
    cid TEXT,
    type TEXT,
    is_attachment INTEGER NOT NULL DEFAULT 0,
    filename TEXT,
    charset TEXT,
    body TEXT,
    size INTEGER,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);

CREATE INDEX idx_message_part_message ON message_part(message_id);
";

/// Ensure both tables exist, wiping whatever was there before.
pub(super) fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    log::info!("Resetting message store schema");
    // Cached statements may reference the dropped tables.
    conn.flush_prepared_statement_cache();

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize_schema;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'message%' ORDER BY name")
            .expect("prepare");
        stmt.query_map([], |row| row.get(0))
            .expect("query")
            .collect::<rusqlite::Result<Vec<String>>>()
            .expect("rows")
    }

    #[test]
    fn creates_both_tables() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        initialize_schema(&conn).expect("init");
        assert_eq!(table_names(&conn), ["message", "message_part"]);
    }

    #[test]
    fn reinitializing_drops_existing_rows_and_restarts_ids() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        initialize_schema(&conn).expect("init");
        conn.execute("INSERT INTO message (subject) VALUES ('old')", [])
            .expect("insert");
        conn.execute("INSERT INTO message_part (message_id, body) VALUES (1, 'x')", [])
            .expect("insert part");

        initialize_schema(&conn).expect("re-init");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM message", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM message_part", [], |row| row.get(0))
            .expect("count parts");
        assert_eq!(count, 0);

        let id: i64 = conn
            .query_row("INSERT INTO message (subject) VALUES ('new') RETURNING id", [], |row| {
                row.get(0)
            })
            .expect("insert after reset");
        assert_eq!(id, 1);
    }

    #[test]
    fn created_at_defaults_to_now() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        initialize_schema(&conn).expect("init");
        let created: chrono::NaiveDateTime = conn
            .query_row(
                "INSERT INTO message (subject) VALUES ('t') RETURNING created_at",
                [],
                |row| row.get(0),
            )
            .expect("insert");
        let now = chrono::Utc::now().naive_utc();
        assert!((now - created).num_seconds().abs() < 60);
    }
}
