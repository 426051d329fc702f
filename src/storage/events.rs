//! SQLite-backed event store.

use super::{Pool, StorageError};
use crate::events::{Event, EventStore, StoreTotals, MAX_DESCRIPTION_LEN};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

/// Storage format for `timestamp` and `resolved_at`. `%.f` keeps whatever
/// sub-second precision the value carries and parses back with or without it.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, username, anomaly, label, event,
        ip_address, location, process_id, description,
        resolved, resolved_at, resolved_by
     FROM events";

/// Event store persisting into the `events` table.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: Pool,
}

impl SqliteEventStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &Pool {
        &self.pool
    }

    fn query_events(
        &self,
        filter: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<Event>, StorageError> {
        let conn = self.pool.get()?;
        let sql = format!("{} {} ORDER BY id ASC", SELECT_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(args, EventRow::from_row)?;

        let mut events = Vec::new();
        for r in rows {
            events.push(r?.into_event()?);
        }
        Ok(events)
    }

    fn count_where(&self, filter: &str, args: impl rusqlite::Params) -> Result<u64, StorageError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT COUNT(*) FROM events {}", filter);
        let count: i64 = conn.query_row(&sql, args, |row| row.get(0))?;
        Ok(count as u64)
    }

    fn aggregate(&self, expr: &str) -> Result<Option<f64>, StorageError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM events", expr);
        // AVG/MAX over zero rows yield NULL
        let value: Option<f64> = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(value)
    }
}

impl EventStore for SqliteEventStore {
    fn save(&self, event: Event) -> Result<Event, StorageError> {
        let conn = self.pool.get()?;
        write_event(&conn, event)
    }

    fn save_all(&self, events: Vec<Event>) -> Result<Vec<Event>, StorageError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut saved = Vec::with_capacity(events.len());
        for event in events {
            // An early return drops `tx`, rolling back every earlier write
            saved.push(write_event(&tx, event)?);
        }

        tx.commit()?;
        Ok(saved)
    }

    fn find_all(&self) -> Result<Vec<Event>, StorageError> {
        self.query_events("", [])
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Event>, StorageError> {
        let conn = self.pool.get()?;
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![id], EventRow::from_row)
            .optional()?;
        row.map(EventRow::into_event).transpose()
    }

    fn find_by_label(&self, label: &str) -> Result<Vec<Event>, StorageError> {
        self.query_events("WHERE label = ?1", params![label])
    }

    fn find_by_user_containing(&self, fragment: &str) -> Result<Vec<Event>, StorageError> {
        // instr() keeps the match case-sensitive, unlike LIKE
        self.query_events("WHERE instr(username, ?1) > 0", params![fragment])
    }

    fn count(&self) -> Result<u64, StorageError> {
        self.count_where("", [])
    }

    fn count_by_label(&self, label: &str) -> Result<u64, StorageError> {
        self.count_where("WHERE label = ?1", params![label])
    }

    fn average_anomaly_score(&self) -> Result<Option<f64>, StorageError> {
        self.aggregate("AVG(anomaly)")
    }

    fn max_anomaly_score(&self) -> Result<Option<f64>, StorageError> {
        self.aggregate("MAX(anomaly)")
    }

    fn totals(&self, label: &str) -> Result<StoreTotals, StorageError> {
        let conn = self.pool.get()?;
        // One statement, so every figure comes from the same snapshot
        let totals = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(label = ?1), 0), AVG(anomaly), MAX(anomaly)
             FROM events",
            params![label],
            |row| {
                Ok(StoreTotals {
                    total: row.get::<_, i64>(0)? as u64,
                    labelled: row.get::<_, i64>(1)? as u64,
                    average_score: row.get(2)?,
                    max_score: row.get(3)?,
                })
            },
        )?;
        Ok(totals)
    }

    fn mark_resolved(
        &self,
        id: i64,
        resolved_by: &str,
        resolved_at: NaiveDateTime,
    ) -> Result<Option<Event>, StorageError> {
        let changed = {
            let conn = self.pool.get()?;
            conn.execute(
                "UPDATE events SET resolved = 1, resolved_at = ?2, resolved_by = ?3 WHERE id = ?1",
                params![id, resolved_at.format(TS_FORMAT).to_string(), resolved_by],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.find_by_id(id)
    }
}

/// Insert or update one event on an existing connection or transaction.
fn write_event(conn: &Connection, mut event: Event) -> Result<Event, StorageError> {
    if let Some(desc) = &event.description {
        let len = desc.chars().count();
        if len > MAX_DESCRIPTION_LEN {
            return Err(StorageError::Invalid(format!(
                "description is {} characters, limit is {}",
                len, MAX_DESCRIPTION_LEN
            )));
        }
    }

    let timestamp = event.timestamp.format(TS_FORMAT).to_string();
    let resolved_at = event.resolved_at.map(|t| t.format(TS_FORMAT).to_string());

    let updated = match event.id {
        Some(id) => conn.execute(
            "UPDATE events SET timestamp = ?2, username = ?3, anomaly = ?4, label = ?5,
                event = ?6, ip_address = ?7, location = ?8, process_id = ?9,
                description = ?10, resolved = ?11, resolved_at = ?12, resolved_by = ?13
             WHERE id = ?1",
            params![
                id,
                timestamp,
                event.user,
                event.anomaly_score,
                event.label,
                event.event_name,
                event.ip_address,
                event.location,
                event.process_id,
                event.description,
                event.resolved,
                resolved_at,
                event.resolved_by,
            ],
        )?,
        None => 0,
    };

    if updated == 0 {
        conn.execute(
            "INSERT INTO events (id, timestamp, username, anomaly, label, event,
                ip_address, location, process_id, description,
                resolved, resolved_at, resolved_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                event.id,
                timestamp,
                event.user,
                event.anomaly_score,
                event.label,
                event.event_name,
                event.ip_address,
                event.location,
                event.process_id,
                event.description,
                event.resolved,
                resolved_at,
                event.resolved_by,
            ],
        )?;
        event.id = Some(conn.last_insert_rowid());
    }

    debug!(id = ?event.id, label = %event.label, "saved event");
    Ok(event)
}

/// Raw column values, converted to an [`Event`] outside the rusqlite closure
/// so that timestamp parse failures surface as [`StorageError::Corrupt`].
struct EventRow {
    id: i64,
    timestamp: String,
    user: String,
    anomaly: f64,
    label: String,
    event: String,
    ip_address: Option<String>,
    location: Option<String>,
    process_id: Option<String>,
    description: Option<String>,
    resolved: bool,
    resolved_at: Option<String>,
    resolved_by: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            user: row.get(2)?,
            anomaly: row.get(3)?,
            label: row.get(4)?,
            event: row.get(5)?,
            ip_address: row.get(6)?,
            location: row.get(7)?,
            process_id: row.get(8)?,
            description: row.get(9)?,
            resolved: row.get::<_, i64>(10)? != 0,
            resolved_at: row.get(11)?,
            resolved_by: row.get(12)?,
        })
    }

    fn into_event(self) -> Result<Event, StorageError> {
        let resolved_at = match self.resolved_at {
            Some(s) => Some(parse_ts("resolved_at", &s)?),
            None => None,
        };

        Ok(Event {
            id: Some(self.id),
            timestamp: parse_ts("timestamp", &self.timestamp)?,
            user: self.user,
            anomaly_score: self.anomaly,
            label: self.label,
            event_name: self.event,
            ip_address: self.ip_address,
            location: self.location,
            process_id: self.process_id,
            description: self.description,
            resolved: self.resolved,
            resolved_at,
            resolved_by: self.resolved_by,
        })
    }
}

fn parse_ts(column: &'static str, value: &str) -> Result<NaiveDateTime, StorageError> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT).map_err(|_| StorageError::Corrupt {
        column,
        value: value.to_string(),
    })
}
