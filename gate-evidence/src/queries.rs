// gate-evidence/src/queries.rs
// ============================================================================
// Module: Evidence DB Read Queries
// Description: Aggregate queries backing the Monitor Service's GET surface.
// Purpose: Keep query logic in the DB layer; the Monitor only shapes JSON.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Spec.md §4.2 promises "latest tasks, units-by-task, type histograms,
//! daily aggregates"; §4.10 lists the HTTP endpoints that surface them.
//! These functions implement the former so `gate-monitor` handlers are thin
//! JSON-shaping wrappers, not a second place query logic could drift.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::params;
use serde::Serialize;

use crate::db::EvidenceDb;
use crate::db::EvidenceDbError;

// ============================================================================
// SECTION: Result Types
// ============================================================================

/// Summary row for `GET /api/tasks`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    /// Task identifier.
    pub task_id: String,
    /// Verdict status (`pass`/`partial`/`fail`).
    pub status: String,
    /// Expected unit count.
    pub units_expected: i64,
    /// Verified unit count.
    pub units_verified: i64,
    /// Reason codes, as recorded.
    pub reasons: Vec<String>,
    /// Profile name used for evaluation.
    pub profile: String,
    /// Verdict timestamp.
    pub decided_at: String,
}

/// Row for `GET /api/stats/units/types`.
#[derive(Debug, Clone, Serialize)]
pub struct UnitTypeCount {
    /// Unit type label.
    pub unit_type: String,
    /// Number of units of this type across all tasks.
    pub count: i64,
}

/// Row for `GET /api/stats/daily`.
#[derive(Debug, Clone, Serialize)]
pub struct DailyAggregate {
    /// Calendar day, `YYYY-MM-DD` (UTC).
    pub day: String,
    /// Number of tasks decided that day.
    pub tasks: i64,
    /// Number of those tasks that passed.
    pub passed: i64,
    /// Number of those tasks that failed.
    pub failed: i64,
}

// ============================================================================
// SECTION: Query Implementations
// ============================================================================

impl EvidenceDb {
    /// Returns the most recently decided tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError`] on read failure.
    pub fn latest_tasks(&self, limit: u32) -> Result<Vec<TaskSummary>, EvidenceDbError> {
        let guard = self.lock_for_read()?;
        let mut stmt = guard.prepare(
            "SELECT task_id, status, units_expected, units_verified, reasons, profile, decided_at
             FROM tasks ORDER BY decided_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_summary)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(EvidenceDbError::from)
    }

    /// Returns a single task's summary, if present.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError`] on read failure.
    pub fn task_summary(&self, task_id: &str) -> Result<Option<TaskSummary>, EvidenceDbError> {
        let guard = self.lock_for_read()?;
        let mut stmt = guard.prepare(
            "SELECT task_id, status, units_expected, units_verified, reasons, profile, decided_at
             FROM tasks WHERE task_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![task_id], row_to_summary)?;
        rows.next().transpose().map_err(EvidenceDbError::from)
    }

    /// Returns the count of units by `unit_type` across all tasks.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError`] on read failure.
    pub fn unit_type_histogram(&self) -> Result<Vec<UnitTypeCount>, EvidenceDbError> {
        let guard = self.lock_for_read()?;
        let mut stmt =
            guard.prepare("SELECT unit_type, COUNT(*) FROM units GROUP BY unit_type ORDER BY unit_type ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(UnitTypeCount {
                unit_type: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(EvidenceDbError::from)
    }

    /// Returns daily pass/fail aggregates, most recent day first.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceDbError`] on read failure.
    pub fn daily_aggregates(&self, days: u32) -> Result<Vec<DailyAggregate>, EvidenceDbError> {
        let guard = self.lock_for_read()?;
        let mut stmt = guard.prepare(
            "SELECT substr(decided_at, 1, 10) AS day,
                    COUNT(*) AS tasks,
                    SUM(CASE WHEN status = 'pass' THEN 1 ELSE 0 END) AS passed,
                    SUM(CASE WHEN status = 'fail' THEN 1 ELSE 0 END) AS failed
             FROM tasks
             GROUP BY day
             ORDER BY day DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![days], |row| {
            Ok(DailyAggregate {
                day: row.get(0)?,
                tasks: row.get(1)?,
                passed: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                failed: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(EvidenceDbError::from)
    }

    fn lock_for_read(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, EvidenceDbError> {
        self.connection_for_read()
    }
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskSummary> {
    let reasons_json: String = row.get(4)?;
    let reasons: Vec<String> = serde_json::from_str(&reasons_json).unwrap_or_default();
    Ok(TaskSummary {
        task_id: row.get(0)?,
        status: row.get(1)?,
        units_expected: row.get(2)?,
        units_verified: row.get(3)?,
        reasons,
        profile: row.get(5)?,
        decided_at: row.get(6)?,
    })
}
