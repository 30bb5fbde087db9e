//! SQLite persistence for interventions.
//!
//! Two tables with different lifecycles:
//! - `interventions`: the current snapshot, fully replaced on every import
//!   run inside one transaction. Interventions appear once per distribution
//!   channel; normalizing that away isn't worth the complexity yet.
//! - `history`: append-only series of timestamped counter aggregates. The
//!   counters stay a JSON blob on purpose: it keeps the row count low and
//!   the data trivial to export, at the cost of relational queries nobody
//!   currently runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::counter::Counters;
use crate::error::{Error, Result};
use crate::import::ImportData;

/// One row of the current snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct InterventionRow {
    pub id: i64,
    pub key: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub distribution: String,
    pub platform: String,
    pub domain: String,
    pub bug: String,
}

/// One point of the history series.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPoint {
    pub id: i64,
    pub datetime: DateTime<Utc>,
    pub counters: Counters,
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS interventions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL CHECK (length(key) > 0),
            type TEXT NOT NULL,
            distribution TEXT NOT NULL,
            platform TEXT NOT NULL,
            domain TEXT NOT NULL,
            bug TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            datetime INTEGER NOT NULL,
            counters TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_interventions_distribution
         ON interventions(distribution)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_datetime ON history(datetime)",
        [],
    )?;

    Ok(())
}

/// Database handle. Open once per process, reuse across all operations.
/// All writes to both tables go through here.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    /// Replace the whole snapshot with the records of one import run.
    ///
    /// Delete and inserts run in a single transaction: readers observe
    /// either the previous snapshot or the new one, never a mix, and a
    /// failed run leaves the table exactly as it was. Returns the number
    /// of rows inserted.
    pub fn replace_current_interventions(&mut self, data: &ImportData) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM interventions", [])?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO interventions (key, type, distribution, platform, domain, bug)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for (distribution, types) in data {
                for (type_name, records) in types {
                    for record in records {
                        stmt.execute(params![
                            record.id,
                            type_name,
                            distribution,
                            record.platform,
                            record.domain,
                            record.bug,
                        ])?;
                        inserted += 1;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Append one history point with the current wall-clock timestamp.
    pub fn append_history_point(&self, counters: &Counters) -> Result<i64> {
        self.append_history_point_at(Utc::now(), counters)
    }

    /// Append one history point with an explicit timestamp (backfills).
    pub fn append_history_point_at(
        &self,
        at: DateTime<Utc>,
        counters: &Counters,
    ) -> Result<i64> {
        let blob = serde_json::to_string(counters)?;
        self.conn.execute(
            "INSERT INTO history (datetime, counters) VALUES (?1, ?2)",
            params![at.timestamp_millis(), blob],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Current snapshot row count; the bootstrap check on startup.
    pub fn count_active_interventions(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT count(*) FROM interventions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All snapshot rows for one distribution, ordered by domain,
    /// case-insensitively.
    pub fn get_interventions_for_distribution(
        &self,
        distribution: &str,
    ) -> Result<Vec<InterventionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, key, type, distribution, platform, domain, bug
             FROM interventions
             WHERE distribution = ?1
             ORDER BY lower(domain) ASC",
        )?;

        let rows = stmt
            .query_map(params![distribution], |row| {
                Ok(InterventionRow {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    type_name: row.get(2)?,
                    distribution: row.get(3)?,
                    platform: row.get(4)?,
                    domain: row.get(5)?,
                    bug: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// The most recent history point, if any.
    pub fn get_latest_counts(&self) -> Result<Option<HistoryPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, datetime, counters
             FROM history
             ORDER BY datetime DESC
             LIMIT 1",
        )?;

        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(history_point_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// History points with `start <= datetime <= end`, ascending.
    pub fn get_history_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, datetime, counters
             FROM history
             WHERE datetime >= ?1 AND datetime <= ?2
             ORDER BY datetime ASC",
        )?;

        let mut points = Vec::new();
        let mut rows = stmt.query(params![start.timestamp_millis(), end.timestamp_millis()])?;
        while let Some(row) = rows.next()? {
            points.push(history_point_from_row(row)?);
        }

        Ok(points)
    }
}

fn history_point_from_row(row: &rusqlite::Row) -> Result<HistoryPoint> {
    let millis: i64 = row.get(1)?;
    let datetime = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Validation(format!("corrupt history timestamp {millis}")))?;
    let blob: String = row.get(2)?;

    Ok(HistoryPoint {
        id: row.get(0)?,
        datetime,
        counters: serde_json::from_str(&blob)?,
    })
}
