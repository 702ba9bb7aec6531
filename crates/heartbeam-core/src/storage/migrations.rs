//! Database schema migrations for the study store.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Schema version after all migrations have run.
pub const CURRENT_VERSION: i32 = 3;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);
    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }
    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
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

/// Migration v1: participants and the three event tables.
///
/// Instants are RFC 3339 UTC strings with millisecond precision so that
/// text comparison orders them. Segment end times stay in epoch seconds.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS participants (
            user_id      TEXT PRIMARY KEY,
            identity_id  TEXT,
            human_id     TEXT,
            start_date   TEXT,
            created_at   TEXT NOT NULL,
            progress     TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS set_events (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL,
            identity_id  TEXT NOT NULL,
            kind         TEXT NOT NULL,
            occurred_at  TEXT NOT NULL,
            set_num      INTEGER
        );

        CREATE TABLE IF NOT EXISTS segments (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            human_id     TEXT NOT NULL,
            stage        INTEGER NOT NULL,
            ended_at     INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lumos_plays (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL,
            played_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_set_events_user ON set_events(user_id, occurred_at);
        CREATE INDEX IF NOT EXISTS idx_set_events_identity ON set_events(identity_id, kind);
        CREATE INDEX IF NOT EXISTS idx_segments_human_ended ON segments(human_id, ended_at);
        CREATE INDEX IF NOT EXISTS idx_lumos_plays_user ON lumos_plays(user_id, played_at);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: contact details and baseline completion flags used by the
/// reminder jobs.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE participants ADD COLUMN email TEXT;
         ALTER TABLE participants ADD COLUMN phone_number TEXT;
         ALTER TABLE participants ADD COLUMN phone_number_verified INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE participants ADD COLUMN pre_complete INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE participants ADD COLUMN post_complete INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE participants ADD COLUMN home_complete INTEGER NOT NULL DEFAULT 0;",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: game name on Lumosity plays.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE lumos_plays ADD COLUMN game TEXT;
         CREATE INDEX IF NOT EXISTS idx_lumos_plays_played ON lumos_plays(played_at);",
    )?;
    set_schema_version(&tx, 3)?;
    tx.commit()
}
