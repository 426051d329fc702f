//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            username TEXT NOT NULL,
            anomaly REAL NOT NULL,
            label TEXT NOT NULL,
            event TEXT NOT NULL,
            ip_address TEXT,
            location TEXT,
            process_id TEXT,
            description TEXT,
            resolved INTEGER NOT NULL DEFAULT 0,
            resolved_at TEXT,
            resolved_by TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_events_label ON events(label);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);",
    )?;

    Ok(())
}
