//! Local schema bootstrap and migrations.

use rusqlite::{Connection, OptionalExtension};

pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id             TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL,
    client_id      TEXT,
    kind           TEXT NOT NULL,
    amount         REAL NOT NULL,
    category       TEXT NOT NULL,
    note           TEXT,
    currency       TEXT NOT NULL,
    date           TEXT NOT NULL,
    server_version INTEGER NOT NULL DEFAULT 0,
    sync_status    INTEGER NOT NULL DEFAULT 0,
    need_sync      INTEGER NOT NULL DEFAULT 1,
    created_at     INTEGER NOT NULL,
    updated_at     INTEGER NOT NULL,
    deleted_at     INTEGER
);

CREATE INDEX IF NOT EXISTS idx_transactions_dirty
    ON transactions(need_sync, sync_status);
CREATE INDEX IF NOT EXISTS idx_transactions_user_date
    ON transactions(user_id, date);

CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub(crate) const CURRENT_VERSION: i64 = 1;

/// Migrations from version N upward.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i64, &str)] = &[
    // Future migrations go here:
    // (1, "ALTER TABLE transactions ADD COLUMN attachment_id TEXT;"),
];

/// Creates or upgrades the local schema. Idempotent.
pub(crate) fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_V1)?;

    let recorded: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .and_then(|value| value.parse().ok());

    if let Some(version) = recorded {
        for (from, sql) in MIGRATIONS {
            if *from >= version {
                conn.execute_batch(sql)?;
            }
        }
    }

    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [CURRENT_VERSION.to_string()],
    )?;

    Ok(())
}
