//! Run repository — CRUD for the `runs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use sift_core::agents::AgentType;
use sift_core::run::Run;
use sift_core::status::{PipelineMode, RunStatus};

use crate::errors::{Result, StoreError};

/// Raw row as stored; parsed into [`Run`] outside the rusqlite closure so
/// parse failures surface as [`StoreError::Corrupt`] instead of panics.
struct RawRun {
    id: String,
    project_id: String,
    tenant_id: String,
    mode: String,
    agents: String,
    status: String,
    total_tokens: i64,
    total_cost: f64,
    error: Option<String>,
    created_by: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

const SELECT_COLS: &str = "id, project_id, tenant_id, mode, agents, status, total_tokens, total_cost, error, created_by, created_at, started_at, completed_at";

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawRun> {
    Ok(RawRun {
        id: row.get(0)?,
        project_id: row.get(1)?,
        tenant_id: row.get(2)?,
        mode: row.get(3)?,
        agents: row.get(4)?,
        status: row.get(5)?,
        total_tokens: row.get(6)?,
        total_cost: row.get(7)?,
        error: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        started_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}

fn parse_agents(raw: &str) -> Result<Vec<AgentType>> {
    let names: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("agents column: {e}")))?;
    names
        .iter()
        .map(|name| {
            AgentType::parse(name)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown agent type: {name}")))
        })
        .collect()
}

impl RawRun {
    fn into_run(self) -> Result<Run> {
        let status = RunStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("run status: {}", self.status)))?;
        let mode = PipelineMode::parse(&self.mode)
            .ok_or_else(|| StoreError::Corrupt(format!("pipeline mode: {}", self.mode)))?;
        Ok(Run {
            id: self.id,
            project_id: self.project_id,
            tenant_id: self.tenant_id,
            mode,
            agents: parse_agents(&self.agents)?,
            status,
            total_tokens: self.total_tokens.max(0) as u64,
            total_cost: self.total_cost,
            error: self.error,
            created_by: self.created_by,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// Run repository.
pub struct RunRepo;

impl RunRepo {
    /// Insert a new run row.
    pub fn insert(conn: &Connection, run: &Run) -> Result<()> {
        let agents: Vec<&str> = run.agents.iter().map(|a| a.as_str()).collect();
        let agents_json = serde_json::to_string(&agents)
            .map_err(|e| StoreError::Corrupt(format!("agents column: {e}")))?;
        let _ = conn.execute(
            "INSERT INTO runs (id, project_id, tenant_id, mode, agents, status, total_tokens, total_cost, error, created_by, created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                run.id,
                run.project_id,
                run.tenant_id,
                run.mode.as_sql(),
                agents_json,
                run.status.as_sql(),
                run.total_tokens as i64,
                run.total_cost,
                run.error,
                run.created_by,
                run.created_at,
                run.started_at,
                run.completed_at,
            ],
        )?;
        Ok(())
    }

    /// Get a run by ID.
    pub fn get(conn: &Connection, run_id: &str) -> Result<Option<Run>> {
        let raw = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM runs WHERE id = ?1"),
                params![run_id],
                raw_from_row,
            )
            .optional()?;
        raw.map(RawRun::into_run).transpose()
    }

    /// Current status of a run.
    pub fn status(conn: &Connection, run_id: &str) -> Result<RunStatus> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        RunStatus::parse(&raw).ok_or_else(|| StoreError::Corrupt(format!("run status: {raw}")))
    }

    /// Most recent runs for a project, newest first.
    pub fn list_for_project(conn: &Connection, project_id: &str, limit: u32) -> Result<Vec<Run>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM runs WHERE project_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))?;
        let raws = stmt
            .query_map(params![project_id, limit], raw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawRun::into_run).collect()
    }

    /// Set status with timestamps. Caller enforces transition legality.
    pub fn set_status(
        conn: &Connection,
        run_id: &str,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = sift_core::ids::now_rfc3339();
        let changed = match status {
            RunStatus::Running => conn.execute(
                "UPDATE runs SET status = ?1, started_at = ?2 WHERE id = ?3",
                params![status.as_sql(), now, run_id],
            )?,
            s if s.is_terminal() => conn.execute(
                "UPDATE runs SET status = ?1, completed_at = ?2, error = COALESCE(?3, error) WHERE id = ?4",
                params![status.as_sql(), now, error, run_id],
            )?,
            _ => conn.execute(
                "UPDATE runs SET status = ?1 WHERE id = ?2",
                params![status.as_sql(), run_id],
            )?,
        };
        if changed == 0 {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    /// Add to the run's running totals. Totals only ever increase.
    pub fn add_usage(conn: &Connection, run_id: &str, tokens: u64, cost: f64) -> Result<()> {
        let changed = conn.execute(
            "UPDATE runs SET total_tokens = total_tokens + ?1, total_cost = total_cost + ?2 WHERE id = ?3",
            params![tokens as i64, cost.max(0.0), run_id],
        )?;
        if changed == 0 {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    /// Whether a run exists.
    pub fn exists(conn: &Connection, run_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM runs WHERE id = ?1)",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use sift_core::ids;

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    fn sample_run(project: &str) -> Run {
        Run {
            id: ids::run_id(),
            project_id: project.into(),
            tenant_id: "tenant_1".into(),
            mode: PipelineMode::Sequential,
            agents: vec![AgentType::QaConsultant, AgentType::TestChecklist],
            status: RunStatus::Queued,
            total_tokens: 0,
            total_cost: 0.0,
            error: None,
            created_by: Some("user_1".into()),
            created_at: ids::now_rfc3339(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = setup();
        let run = sample_run("proj_1");
        RunRepo::insert(&conn, &run).unwrap();
        let loaded = RunRepo::get(&conn, &run.id).unwrap().unwrap();
        assert_eq!(loaded, run);
    }

    #[test]
    fn get_missing_run_is_none() {
        let conn = setup();
        assert!(RunRepo::get(&conn, "run_missing").unwrap().is_none());
    }

    #[test]
    fn status_of_missing_run_errors() {
        let conn = setup();
        assert!(matches!(
            RunRepo::status(&conn, "run_missing"),
            Err(StoreError::RunNotFound(_))
        ));
    }

    #[test]
    fn list_for_project_newest_first_bounded() {
        let conn = setup();
        for _ in 0..5 {
            RunRepo::insert(&conn, &sample_run("proj_a")).unwrap();
        }
        RunRepo::insert(&conn, &sample_run("proj_b")).unwrap();

        let runs = RunRepo::list_for_project(&conn, "proj_a", 3).unwrap();
        assert_eq!(runs.len(), 3);
        for pair in runs.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn set_status_running_stamps_started_at() {
        let conn = setup();
        let run = sample_run("proj_1");
        RunRepo::insert(&conn, &run).unwrap();
        RunRepo::set_status(&conn, &run.id, RunStatus::Running, None).unwrap();
        let loaded = RunRepo::get(&conn, &run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);
        assert!(loaded.started_at.is_some());
        assert!(loaded.completed_at.is_none());
    }

    #[test]
    fn set_status_failed_records_error() {
        let conn = setup();
        let run = sample_run("proj_1");
        RunRepo::insert(&conn, &run).unwrap();
        RunRepo::set_status(&conn, &run.id, RunStatus::Failed, Some("budget exceeded")).unwrap();
        let loaded = RunRepo::get(&conn, &run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("budget exceeded"));
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn add_usage_accumulates() {
        let conn = setup();
        let run = sample_run("proj_1");
        RunRepo::insert(&conn, &run).unwrap();
        RunRepo::add_usage(&conn, &run.id, 100, 0.5).unwrap();
        RunRepo::add_usage(&conn, &run.id, 250, 1.25).unwrap();
        let loaded = RunRepo::get(&conn, &run.id).unwrap().unwrap();
        assert_eq!(loaded.total_tokens, 350);
        assert!((loaded.total_cost - 1.75).abs() < 1e-9);
    }

    #[test]
    fn exists_check() {
        let conn = setup();
        let run = sample_run("proj_1");
        RunRepo::insert(&conn, &run).unwrap();
        assert!(RunRepo::exists(&conn, &run.id).unwrap());
        assert!(!RunRepo::exists(&conn, "run_nope").unwrap());
    }
}
