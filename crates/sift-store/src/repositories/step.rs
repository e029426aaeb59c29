//! Step repository — CRUD for the `steps` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use sift_core::agents::AgentType;
use sift_core::run::Step;
use sift_core::status::StepStatus;

use crate::errors::{Result, StoreError};

struct RawStep {
    id: String,
    run_id: String,
    agent: String,
    position: i64,
    status: String,
    progress: i64,
    progress_label: Option<String>,
    tokens_used: i64,
    artifact_id: Option<String>,
    error: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
}

const SELECT_COLS: &str = "id, run_id, agent, position, status, progress, progress_label, tokens_used, artifact_id, error, started_at, completed_at";

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawStep> {
    Ok(RawStep {
        id: row.get(0)?,
        run_id: row.get(1)?,
        agent: row.get(2)?,
        position: row.get(3)?,
        status: row.get(4)?,
        progress: row.get(5)?,
        progress_label: row.get(6)?,
        tokens_used: row.get(7)?,
        artifact_id: row.get(8)?,
        error: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

impl RawStep {
    fn into_step(self) -> Result<Step> {
        let agent = AgentType::parse(&self.agent)
            .ok_or_else(|| StoreError::Corrupt(format!("step agent: {}", self.agent)))?;
        let status = StepStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("step status: {}", self.status)))?;
        Ok(Step {
            id: self.id,
            run_id: self.run_id,
            agent,
            position: self.position.max(0) as u32,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            progress_label: self.progress_label,
            tokens_used: self.tokens_used.max(0) as u64,
            artifact_id: self.artifact_id,
            error: self.error,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// Step repository.
pub struct StepRepo;

impl StepRepo {
    /// Insert one step row.
    pub fn insert(conn: &Connection, step: &Step) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO steps (id, run_id, agent, position, status, progress, progress_label, tokens_used, artifact_id, error, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                step.id,
                step.run_id,
                step.agent.as_str(),
                step.position,
                step.status.as_sql(),
                step.progress,
                step.progress_label,
                step.tokens_used as i64,
                step.artifact_id,
                step.error,
                step.started_at,
                step.completed_at,
            ],
        )?;
        Ok(())
    }

    /// Get a step by ID.
    pub fn get(conn: &Connection, step_id: &str) -> Result<Option<Step>> {
        let raw = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM steps WHERE id = ?1"),
                params![step_id],
                raw_from_row,
            )
            .optional()?;
        raw.map(RawStep::into_step).transpose()
    }

    /// Current status of a step.
    pub fn status(conn: &Connection, step_id: &str) -> Result<StepStatus> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM steps WHERE id = ?1",
                params![step_id],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::StepNotFound(step_id.to_string()))?;
        StepStatus::parse(&raw).ok_or_else(|| StoreError::Corrupt(format!("step status: {raw}")))
    }

    /// All steps of a run in execution order.
    pub fn list_for_run(conn: &Connection, run_id: &str) -> Result<Vec<Step>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM steps WHERE run_id = ?1 ORDER BY position"
        ))?;
        let raws = stmt
            .query_map(params![run_id], raw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawStep::into_step).collect()
    }

    /// Mark a step running with its initial progress label.
    pub fn mark_running(conn: &Connection, step_id: &str, label: &str) -> Result<()> {
        let now = sift_core::ids::now_rfc3339();
        let changed = conn.execute(
            "UPDATE steps SET status = 'running', progress = 0, progress_label = ?1, started_at = ?2 WHERE id = ?3",
            params![label, now, step_id],
        )?;
        if changed == 0 {
            return Err(StoreError::StepNotFound(step_id.to_string()));
        }
        Ok(())
    }

    /// Update progress. `MAX` keeps the percentage non-decreasing even if a
    /// stale update lands late.
    pub fn set_progress(
        conn: &Connection,
        step_id: &str,
        progress: u8,
        label: Option<&str>,
    ) -> Result<()> {
        let changed = conn.execute(
            "UPDATE steps SET progress = MAX(progress, ?1), progress_label = COALESCE(?2, progress_label) WHERE id = ?3",
            params![progress.min(100), label, step_id],
        )?;
        if changed == 0 {
            return Err(StoreError::StepNotFound(step_id.to_string()));
        }
        Ok(())
    }

    /// Complete a step, recording tokens and the produced artifact.
    pub fn complete(
        conn: &Connection,
        step_id: &str,
        tokens_used: u64,
        artifact_id: Option<&str>,
    ) -> Result<()> {
        let now = sift_core::ids::now_rfc3339();
        let changed = conn.execute(
            "UPDATE steps SET status = 'completed', progress = 100, tokens_used = ?1, artifact_id = ?2, completed_at = ?3 WHERE id = ?4",
            params![tokens_used as i64, artifact_id, now, step_id],
        )?;
        if changed == 0 {
            return Err(StoreError::StepNotFound(step_id.to_string()));
        }
        Ok(())
    }

    /// Fail a step, recording the error text.
    pub fn fail(conn: &Connection, step_id: &str, error: &str) -> Result<()> {
        let now = sift_core::ids::now_rfc3339();
        let changed = conn.execute(
            "UPDATE steps SET status = 'failed', error = ?1, completed_at = ?2 WHERE id = ?3",
            params![error, now, step_id],
        )?;
        if changed == 0 {
            return Err(StoreError::StepNotFound(step_id.to_string()));
        }
        Ok(())
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
    use crate::repositories::run::RunRepo;
    use sift_core::ids;
    use sift_core::run::Run;
    use sift_core::status::{PipelineMode, RunStatus};

    fn setup_with_run() -> (Connection, String) {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&mut conn).unwrap();
        let run = Run {
            id: ids::run_id(),
            project_id: "proj_1".into(),
            tenant_id: "tenant_1".into(),
            mode: PipelineMode::Sequential,
            agents: vec![AgentType::QaConsultant],
            status: RunStatus::Queued,
            total_tokens: 0,
            total_cost: 0.0,
            error: None,
            created_by: None,
            created_at: ids::now_rfc3339(),
            started_at: None,
            completed_at: None,
        };
        RunRepo::insert(&conn, &run).unwrap();
        let run_id = run.id;
        (conn, run_id)
    }

    fn queued_step(run_id: &str, agent: AgentType, position: u32) -> Step {
        Step {
            id: ids::step_id(),
            run_id: run_id.into(),
            agent,
            position,
            status: StepStatus::Queued,
            progress: 0,
            progress_label: None,
            tokens_used: 0,
            artifact_id: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn insert_and_list_in_position_order() {
        let (conn, run_id) = setup_with_run();
        let s2 = queued_step(&run_id, AgentType::TestChecklist, 1);
        let s1 = queued_step(&run_id, AgentType::QaConsultant, 0);
        StepRepo::insert(&conn, &s2).unwrap();
        StepRepo::insert(&conn, &s1).unwrap();

        let steps = StepRepo::list_for_run(&conn, &run_id).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].position, 0);
        assert_eq!(steps[1].position, 1);
    }

    #[test]
    fn duplicate_position_rejected() {
        let (conn, run_id) = setup_with_run();
        StepRepo::insert(&conn, &queued_step(&run_id, AgentType::QaConsultant, 0)).unwrap();
        let err = StepRepo::insert(&conn, &queued_step(&run_id, AgentType::TestChecklist, 0));
        assert!(err.is_err());
    }

    #[test]
    fn mark_running_sets_label_and_timestamp() {
        let (conn, run_id) = setup_with_run();
        let step = queued_step(&run_id, AgentType::QaConsultant, 0);
        StepRepo::insert(&conn, &step).unwrap();
        StepRepo::mark_running(&conn, &step.id, "Assessing QA strategy").unwrap();

        let loaded = StepRepo::get(&conn, &step.id).unwrap().unwrap();
        assert_eq!(loaded.status, StepStatus::Running);
        assert_eq!(loaded.progress_label.as_deref(), Some("Assessing QA strategy"));
        assert!(loaded.started_at.is_some());
    }

    #[test]
    fn progress_is_non_decreasing() {
        let (conn, run_id) = setup_with_run();
        let step = queued_step(&run_id, AgentType::QaConsultant, 0);
        StepRepo::insert(&conn, &step).unwrap();
        StepRepo::mark_running(&conn, &step.id, "working").unwrap();
        StepRepo::set_progress(&conn, &step.id, 60, None).unwrap();
        // A stale lower update must not regress the percentage
        StepRepo::set_progress(&conn, &step.id, 30, None).unwrap();

        let loaded = StepRepo::get(&conn, &step.id).unwrap().unwrap();
        assert_eq!(loaded.progress, 60);
    }

    #[test]
    fn complete_records_tokens_and_artifact() {
        let (conn, run_id) = setup_with_run();
        let step = queued_step(&run_id, AgentType::QaConsultant, 0);
        StepRepo::insert(&conn, &step).unwrap();
        StepRepo::mark_running(&conn, &step.id, "working").unwrap();
        StepRepo::complete(&conn, &step.id, 512, Some("art_1")).unwrap();

        let loaded = StepRepo::get(&conn, &step.id).unwrap().unwrap();
        assert_eq!(loaded.status, StepStatus::Completed);
        assert_eq!(loaded.progress, 100);
        assert_eq!(loaded.tokens_used, 512);
        assert_eq!(loaded.artifact_id.as_deref(), Some("art_1"));
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn fail_records_error_text() {
        let (conn, run_id) = setup_with_run();
        let step = queued_step(&run_id, AgentType::QaConsultant, 0);
        StepRepo::insert(&conn, &step).unwrap();
        StepRepo::mark_running(&conn, &step.id, "working").unwrap();
        StepRepo::fail(&conn, &step.id, "daily budget exceeded").unwrap();

        let loaded = StepRepo::get(&conn, &step.id).unwrap().unwrap();
        assert_eq!(loaded.status, StepStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("daily budget exceeded"));
    }

    #[test]
    fn missing_step_operations_error() {
        let (conn, _run_id) = setup_with_run();
        assert!(matches!(
            StepRepo::mark_running(&conn, "step_missing", "x"),
            Err(StoreError::StepNotFound(_))
        ));
        assert!(StepRepo::get(&conn, "step_missing").unwrap().is_none());
    }

    #[test]
    fn deleting_run_cascades_to_steps() {
        let (conn, run_id) = setup_with_run();
        let step = queued_step(&run_id, AgentType::QaConsultant, 0);
        StepRepo::insert(&conn, &step).unwrap();
        let _ = conn
            .execute("DELETE FROM runs WHERE id = ?1", params![run_id])
            .unwrap();
        assert!(StepRepo::get(&conn, &step.id).unwrap().is_none());
    }
}
