// gate-evidence/src/db.rs
// ============================================================================
// Module: Evidence DB Connection and Schema
// Description: SQLite connection management, schema init, and upserts.
// Purpose: Durable, idempotent persistence for units and metrics.
// Dependencies: gate-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Mirrors the corpus's store module: secure connection flags, WAL journal
//! mode for reader/writer concurrency, a `store_meta` schema-version guard,
//! and a single `Mutex`-guarded connection so writes are serialized per
//! process while SQLite's own WAL mode lets readers proceed without
//! blocking on a writer (spec.md §4.2: "readers never block writers").

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Mutex;

use gate_core::TaskId;
use gate_core::Unit;
use gate_core::UnitType;
use gate_core::Verdict;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version for the Evidence DB.
const SCHEMA_VERSION: i64 = 1;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the Evidence DB.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceDbError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// JSON (de)serialization of a metric value failed.
    #[error("metric value serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The connection mutex was poisoned by a panicking holder.
    #[error("evidence db connection mutex poisoned")]
    Poisoned,
    /// A `units` row's `task_id` column does not hold a valid identifier.
    #[error("corrupt task_id in units row: {0}")]
    InvalidTaskId(#[from] gate_core::identifiers::IdentifierError),
}

// ============================================================================
// SECTION: Evidence DB
// ============================================================================

/// Durable, idempotent store for per-unit and metrics records.
pub struct EvidenceDb {
    connection: Mutex<Connection>,
}

impl EvidenceDb {
    /// Opens (or creates) an Evidence DB at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError::Sqlite`] if the database cannot be opened
    /// or the schema cannot be initialized.
    pub fn open(path: &Path) -> Result<Self, EvidenceDbError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(path, flags)?;
        apply_pragmas(&connection)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Opens an in-memory Evidence DB, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError::Sqlite`] if the schema cannot be
    /// initialized.
    pub fn open_in_memory() -> Result<Self, EvidenceDbError> {
        let connection = Connection::open_in_memory()?;
        apply_pragmas(&connection)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, EvidenceDbError> {
        self.connection.lock().map_err(|_| EvidenceDbError::Poisoned)
    }

    /// Locks the connection for a read-only query. Used by the `queries`
    /// module so aggregate reads share the same mutex and error type as
    /// writes without exposing the connection field outside this crate.
    pub(crate) fn connection_for_read(&self) -> Result<std::sync::MutexGuard<'_, Connection>, EvidenceDbError> {
        self.lock()
    }

    /// Persists a verdict: every per-unit record is upserted, then every
    /// metric key/value pair. Idempotent: re-persisting the same verdict
    /// leaves exactly one row per `(task_id, unit_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError::Sqlite`] on write failure.
    pub fn persist_verdict(&self, verdict: &Verdict) -> Result<(), EvidenceDbError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction()?;
        for unit in &verdict.per_unit {
            upsert_unit(&tx, unit)?;
        }
        for (key, value) in &verdict.metrics {
            upsert_metric(&tx, &verdict.task_id, key, value)?;
        }
        upsert_task_header(&tx, verdict)?;
        tx.commit()?;
        Ok(())
    }

    /// Returns every persisted unit for `task_id`, ordered by `unit_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError::Sqlite`] on read failure, or
    /// [`EvidenceDbError::InvalidTaskId`] if a stored row's `task_id` is
    /// corrupt.
    pub fn units_for_task(&self, task_id: &TaskId) -> Result<Vec<Unit>, EvidenceDbError> {
        let guard = self.lock()?;
        let mut stmt = guard.prepare(
            "SELECT task_id, unit_id, unit_type, claimed, verified, reason
             FROM units WHERE task_id = ?1 ORDER BY unit_id ASC",
        )?;
        let rows = stmt.query_map(params![task_id.as_str()], |row| {
            let unit_type_raw: String = row.get(2)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                unit_type_raw,
                row.get::<_, i64>(3)? != 0,
                row.get::<_, i64>(4)? != 0,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;
        let mut units = Vec::new();
        for row in rows {
            let (task, unit_id, unit_type_raw, claimed, verified, reason) = row?;
            units.push(Unit {
                task_id: TaskId::new(task)?,
                unit_id: gate_core::UnitId::new(unit_id),
                unit_type: parse_unit_type(&unit_type_raw),
                claimed,
                verified,
                reason,
            });
        }
        Ok(units)
    }
}

fn parse_unit_type(raw: &str) -> UnitType {
    match raw {
        "function" => UnitType::Function,
        "endpoint" => UnitType::Endpoint,
        "url" => UnitType::Url,
        "row" => UnitType::Row,
        "item" => UnitType::Item,
        _ => UnitType::File,
    }
}

fn unit_type_label(unit_type: UnitType) -> &'static str {
    match unit_type {
        UnitType::File => "file",
        UnitType::Function => "function",
        UnitType::Endpoint => "endpoint",
        UnitType::Url => "url",
        UnitType::Row => "row",
        UnitType::Item => "item",
    }
}

fn upsert_unit(tx: &rusqlite::Transaction<'_>, unit: &Unit) -> Result<(), EvidenceDbError> {
    tx.execute(
        "INSERT INTO units (task_id, unit_id, unit_type, claimed, verified, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%s','now'))
         ON CONFLICT(task_id, unit_id) DO UPDATE SET
           unit_type = excluded.unit_type,
           claimed = excluded.claimed,
           verified = excluded.verified,
           reason = excluded.reason",
        params![
            unit.task_id.as_str(),
            unit.unit_id.as_str(),
            unit_type_label(unit.unit_type),
            i64::from(unit.claimed),
            i64::from(unit.verified),
            unit.reason,
        ],
    )?;
    Ok(())
}

fn upsert_metric(
    tx: &rusqlite::Transaction<'_>,
    task_id: &TaskId,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), EvidenceDbError> {
    let serialized = serde_json::to_string(value)?;
    tx.execute(
        "INSERT INTO metrics (task_id, k, v, created_at)
         VALUES (?1, ?2, ?3, strftime('%s','now'))
         ON CONFLICT(task_id, k, created_at) DO UPDATE SET v = excluded.v",
        params![task_id.as_str(), key, serialized],
    )?;
    Ok(())
}

fn upsert_task_header(tx: &rusqlite::Transaction<'_>, verdict: &Verdict) -> Result<(), EvidenceDbError> {
    let status = match verdict.status {
        gate_core::VerdictStatus::Pass => "pass",
        gate_core::VerdictStatus::Partial => "partial",
        gate_core::VerdictStatus::Fail => "fail",
    };
    let reasons = serde_json::to_string(&verdict.reasons.iter().map(|r| r.as_str()).collect::<Vec<_>>())?;
    tx.execute(
        "INSERT INTO tasks (task_id, status, units_expected, units_verified, reasons, profile, decided_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(task_id) DO UPDATE SET
           status = excluded.status,
           units_expected = excluded.units_expected,
           units_verified = excluded.units_verified,
           reasons = excluded.reasons,
           profile = excluded.profile,
           decided_at = excluded.decided_at",
        params![
            verdict.task_id.as_str(),
            status,
            i64::try_from(verdict.units_expected).unwrap_or(i64::MAX),
            i64::try_from(verdict.units_verified).unwrap_or(i64::MAX),
            reasons,
            verdict.policy.profile,
            verdict.timestamp.as_str(),
        ],
    )?;
    Ok(())
}

/// Applies pragmas required for durability and reader/writer concurrency.
fn apply_pragmas(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    connection.busy_timeout(std::time::Duration::from_millis(5_000))?;
    Ok(())
}

/// Initializes the schema, guarded by a `store_meta` version row.
fn initialize_schema(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .ok();
    if version.is_none() {
        connection.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS units (
                task_id TEXT NOT NULL,
                unit_id TEXT NOT NULL,
                unit_type TEXT NOT NULL,
                claimed INTEGER NOT NULL,
                verified INTEGER NOT NULL,
                reason TEXT,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (task_id, unit_id)
            );
            CREATE INDEX IF NOT EXISTS idx_units_type ON units (unit_type);
            CREATE TABLE IF NOT EXISTS metrics (
                task_id TEXT NOT NULL,
                k TEXT NOT NULL,
                v TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (task_id, k, created_at)
            );
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                units_expected INTEGER NOT NULL,
                units_verified INTEGER NOT NULL,
                reasons TEXT NOT NULL,
                profile TEXT NOT NULL,
                decided_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_decided_at ON tasks (decided_at);",
        )?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use gate_core::VerdictPolicy;
    use gate_core::VerdictStatus;

    use super::*;

    fn sample_verdict() -> Verdict {
        Verdict {
            task_id: TaskId::new("t-1").unwrap(),
            status: VerdictStatus::Pass,
            units_expected: 1,
            units_verified: 1,
            per_unit: vec![Unit {
                task_id: TaskId::new("t-1").unwrap(),
                unit_id: gate_core::UnitId::new("a.md"),
                unit_type: UnitType::File,
                claimed: true,
                verified: true,
                reason: None,
            }],
            reasons: vec![],
            metrics: BTreeMap::from([("word_count".to_string(), serde_json::json!(512))]),
            policy: VerdictPolicy {
                profile: "content_default".to_string(),
                thresholds: BTreeMap::new(),
            },
            timestamp: gate_core::Timestamp::now(),
        }
    }

    #[test]
    fn persist_verdict_is_idempotent() {
        let db = EvidenceDb::open_in_memory().unwrap();
        let verdict = sample_verdict();
        db.persist_verdict(&verdict).unwrap();
        db.persist_verdict(&verdict).unwrap();

        let units = db.units_for_task(&verdict.task_id).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].verified);
    }

    #[test]
    fn units_for_task_returns_sorted() {
        let db = EvidenceDb::open_in_memory().unwrap();
        let mut verdict = sample_verdict();
        verdict.per_unit.push(Unit {
            task_id: verdict.task_id.clone(),
            unit_id: gate_core::UnitId::new("b.md"),
            unit_type: UnitType::File,
            claimed: true,
            verified: false,
            reason: Some("word_count<300".to_string()),
        });
        db.persist_verdict(&verdict).unwrap();

        let units = db.units_for_task(&verdict.task_id).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_id.as_str(), "a.md");
        assert_eq!(units[1].unit_id.as_str(), "b.md");
    }
}
