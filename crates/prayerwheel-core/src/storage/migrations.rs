//! Database schema migrations.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version. The local
//! store and the companion store share one schema.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Returns 0 for a fresh database.
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| row.get::<_, i32>(0))
        .unwrap_or_else(|e| {
            if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                tracing::warn!(error = %e, "failed to read schema_version");
            }
            0
        })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: counters, suspend snapshot, daily history and the settings kv table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS counters (
            devotion        TEXT PRIMARY KEY,
            today_count     INTEGER NOT NULL DEFAULT 0,
            total_cycles    INTEGER NOT NULL DEFAULT 0,
            last_reset_day  TEXT,
            updated_at      TEXT,
            updated_by      TEXT
        );

        CREATE TABLE IF NOT EXISTS suspend_snapshot (
            id          INTEGER PRIMARY KEY CHECK (id = 1),
            closed_at   TEXT NOT NULL,
            speed_rpm   REAL NOT NULL,
            devotion    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS daily_history (
            devotion          TEXT NOT NULL,
            day               TEXT NOT NULL,
            cycles_completed  INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (devotion, day)
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_daily_history_day ON daily_history(day);",
    )?;
    set_schema_version(conn, 1)
}
