//! SQLite-based record storage.
//!
//! Provides persistent storage for:
//! - Completed fasting sessions
//! - Saved step snapshots
//! - Raw health samples
//! - Key-value store for application state
//!
//! Every write is committed before the call returns, and a failed commit is
//! returned to the caller.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::error::StorageError;
use crate::health::{HealthMetric, HealthSample};
use crate::records::{FastingSession, NewFastingSession, NewStepSnapshot, StepSnapshot};

const DB_FILE: &str = "fancywalk.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const FASTING_SESSIONS: &str = "fasting_sessions";
pub const STEP_SNAPSHOTS: &str = "step_snapshots";
const HEALTH_SAMPLES: &str = "health_samples";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FastingStats {
    pub total_fasts: u64,
    pub total_secs: f64,
    pub longest_secs: f64,
    pub average_secs: f64,
    /// Fasts at least as long as the goal.
    pub goals_reached: u64,
    pub step_snapshots: u64,
}

/// SQLite database for fancywalk records.
///
/// One connection, one writer: all writes go through `&self` methods on the
/// owning thread, and other processes wait on SQLite's lock for up to
/// five seconds.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database in the data directory (see [`data_dir`]).
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let dir = data_dir().map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join(DB_FILE))
    }

    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Fasting sessions ─────────────────────────────────────────────

    /// Store a completed fast and return it with its new id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn append_fasting_session(
        &self,
        session: &NewFastingSession,
    ) -> Result<FastingSession, StorageError> {
        let duration_secs = session.duration_secs();
        self.conn.execute(
            "INSERT INTO fasting_sessions (start_time, end_time, duration_secs)
             VALUES (?1, ?2, ?3)",
            params![
                encode_ts(session.start_time()),
                encode_ts(session.end_time()),
                duration_secs,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(id, duration_secs, "fasting session saved");
        Ok(FastingSession {
            id,
            start_time: session.start_time(),
            end_time: session.end_time(),
            duration_secs,
        })
    }

    /// # Errors
    /// Returns [`StorageError::NotFound`] if no session has this id.
    pub fn get_fasting_session(&self, id: i64) -> Result<FastingSession, StorageError> {
        let result = self.conn.query_row(
            "SELECT id, start_time, end_time, duration_secs
             FROM fasting_sessions WHERE id = ?1",
            params![id],
            fasting_row,
        );
        match result {
            Ok(raw) => raw.decode(),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StorageError::NotFound {
                collection: FASTING_SESSIONS,
                id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// All fasts, most recent start first.
    pub fn list_fasting_sessions(&self) -> Result<Vec<FastingSession>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, duration_secs
             FROM fasting_sessions
             ORDER BY start_time DESC, id DESC",
        )?;
        let rows = stmt.query_map([], fasting_row)?;
        rows.map(|row| -> Result<FastingSession, StorageError> { row?.decode() })
            .collect()
    }

    /// Returns whether a row was removed; unknown ids are not an error.
    pub fn delete_fasting_session(&self, id: i64) -> Result<bool, StorageError> {
        self.delete(FASTING_SESSIONS, id)
    }

    pub fn fasting_stats(&self, goal_secs: u64) -> Result<FastingStats, StorageError> {
        let (total_fasts, total_secs, longest_secs, goals_reached) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(duration_secs), 0.0),
                    COALESCE(MAX(duration_secs), 0.0),
                    COALESCE(SUM(duration_secs >= ?1), 0)
             FROM fasting_sessions",
            params![goal_secs as f64],
            |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, u64>(3)?,
                ))
            },
        )?;
        let step_snapshots =
            self.conn
                .query_row("SELECT COUNT(*) FROM step_snapshots", [], |row| {
                    row.get::<_, u64>(0)
                })?;

        Ok(FastingStats {
            total_fasts,
            total_secs,
            longest_secs,
            average_secs: if total_fasts == 0 {
                0.0
            } else {
                total_secs / total_fasts as f64
            },
            goals_reached,
            step_snapshots,
        })
    }

    // ── Step snapshots ───────────────────────────────────────────────

    /// # Errors
    /// Returns an error if the insert fails.
    pub fn append_step_snapshot(
        &self,
        snapshot: &NewStepSnapshot,
    ) -> Result<StepSnapshot, StorageError> {
        self.conn.execute(
            "INSERT INTO step_snapshots (date, steps, distance_km) VALUES (?1, ?2, ?3)",
            params![
                encode_ts(snapshot.date()),
                snapshot.steps(),
                snapshot.distance_km(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(id, steps = snapshot.steps(), "step snapshot saved");
        Ok(StepSnapshot {
            id,
            date: snapshot.date(),
            steps: snapshot.steps(),
            distance_km: snapshot.distance_km(),
        })
    }

    /// All snapshots in the order they were saved.
    pub fn list_step_snapshots(&self) -> Result<Vec<StepSnapshot>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, steps, distance_km FROM step_snapshots ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        rows.map(|row| -> Result<StepSnapshot, StorageError> {
            let (id, date, steps, distance_km) = row?;
            Ok(StepSnapshot {
                id,
                date: decode_ts(STEP_SNAPSHOTS, id, &date)?,
                steps,
                distance_km,
            })
        })
        .collect()
    }

    /// Returns whether a row was removed; unknown ids are not an error.
    pub fn delete_step_snapshot(&self, id: i64) -> Result<bool, StorageError> {
        self.delete(STEP_SNAPSHOTS, id)
    }

    // ── Health samples ───────────────────────────────────────────────

    pub fn record_health_sample(&self, sample: &HealthSample) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO health_samples (metric, value, recorded_at) VALUES (?1, ?2, ?3)",
            params![
                sample.metric.to_string(),
                sample.value,
                encode_ts(sample.recorded_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Samples recorded at or after `since`, oldest first.
    pub fn health_samples_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<HealthSample>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, metric, value, recorded_at FROM health_samples
             WHERE recorded_at >= ?1
             ORDER BY recorded_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![encode_ts(since)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        rows.map(|row| -> Result<HealthSample, StorageError> {
            let (id, metric, value, recorded_at) = row?;
            let metric = match metric.as_str() {
                "steps" => HealthMetric::Steps,
                "distance" => HealthMetric::Distance,
                other => {
                    return Err(StorageError::Corrupt {
                        collection: HEALTH_SAMPLES,
                        id,
                        message: format!("unknown metric '{other}'"),
                    })
                }
            };
            Ok(HealthSample {
                metric,
                value,
                recorded_at: decode_ts(HEALTH_SAMPLES, id, &recorded_at)?,
            })
        })
        .collect()
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn delete(&self, table: &'static str, id: i64) -> Result<bool, StorageError> {
        // `table` is always one of the constants above.
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
        if removed == 0 {
            tracing::debug!(table, id, "delete of unknown record ignored");
        } else {
            tracing::info!(table, id, "record deleted");
        }
        Ok(removed > 0)
    }
}

struct RawFastingRow {
    id: i64,
    start_time: String,
    end_time: String,
    duration_secs: f64,
}

impl RawFastingRow {
    fn decode(self) -> Result<FastingSession, StorageError> {
        Ok(FastingSession {
            id: self.id,
            start_time: decode_ts(FASTING_SESSIONS, self.id, &self.start_time)?,
            end_time: decode_ts(FASTING_SESSIONS, self.id, &self.end_time)?,
            duration_secs: self.duration_secs,
        })
    }
}

fn fasting_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFastingRow> {
    Ok(RawFastingRow {
        id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        duration_secs: row.get(3)?,
    })
}

/// Fixed-width UTC with milliseconds, so text order is time order.
fn encode_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_ts(collection: &'static str, id: i64, s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            collection,
            id,
            message: format!("bad timestamp '{s}': {e}"),
        })
}
