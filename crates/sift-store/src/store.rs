//! High-level transactional [`RunStore`] API.
//!
//! Composes the repositories into run-centric methods. Every write runs
//! inside a single `SQLite` transaction — callers never observe partial
//! state — and every status write is checked against the monotonic state
//! machine before it lands.

use tracing::{debug, instrument};

use sift_core::agents::AgentType;
use sift_core::ids;
use sift_core::run::{Run, Step};
use sift_core::status::{PipelineMode, RunStatus, StepStatus};

use crate::connection::ConnectionPool;
use crate::errors::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::repositories::run::RunRepo;
use crate::repositories::step::StepRepo;

/// Parameters for creating a run with its steps.
#[derive(Debug, Clone)]
pub struct NewRun {
    /// Project to analyze.
    pub project_id: String,
    /// Billing tenant.
    pub tenant_id: String,
    /// Execution mode.
    pub mode: PipelineMode,
    /// Selected agents in execution order.
    pub agents: Vec<AgentType>,
    /// Creator identifier.
    pub created_by: Option<String>,
}

/// Durable store for runs and steps.
pub struct RunStore {
    pool: ConnectionPool,
}

impl RunStore {
    /// Create a store over a connection pool, applying pending migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        {
            let mut conn = pool.get()?;
            let _ = run_migrations(&mut conn)?;
        }
        Ok(Self { pool })
    }

    /// Create a run and its steps atomically, all in `queued` status.
    ///
    /// One step per selected agent, positions following the given order.
    #[instrument(skip(self, new_run), fields(project_id = %new_run.project_id))]
    pub fn create_run(&self, new_run: &NewRun) -> Result<(Run, Vec<Step>)> {
        let now = ids::now_rfc3339();
        let run = Run {
            id: ids::run_id(),
            project_id: new_run.project_id.clone(),
            tenant_id: new_run.tenant_id.clone(),
            mode: new_run.mode,
            agents: new_run.agents.clone(),
            status: RunStatus::Queued,
            total_tokens: 0,
            total_cost: 0.0,
            error: None,
            created_by: new_run.created_by.clone(),
            created_at: now.clone(),
            started_at: None,
            completed_at: None,
        };
        let steps: Vec<Step> = new_run
            .agents
            .iter()
            .enumerate()
            .map(|(position, agent)| Step {
                id: ids::step_id(),
                run_id: run.id.clone(),
                agent: *agent,
                position: position as u32,
                status: StepStatus::Queued,
                progress: 0,
                progress_label: None,
                tokens_used: 0,
                artifact_id: None,
                error: None,
                started_at: None,
                completed_at: None,
            })
            .collect();

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        RunRepo::insert(&tx, &run)?;
        for step in &steps {
            StepRepo::insert(&tx, step)?;
        }
        tx.commit()?;
        debug!(run_id = %run.id, steps = steps.len(), "run created");
        Ok((run, steps))
    }

    /// Snapshot of a run.
    pub fn run(&self, run_id: &str) -> Result<Option<Run>> {
        let conn = self.pool.get()?;
        RunRepo::get(&conn, run_id)
    }

    /// Snapshot of a run with its steps in execution order.
    pub fn run_with_steps(&self, run_id: &str) -> Result<Option<(Run, Vec<Step>)>> {
        let conn = self.pool.get()?;
        let Some(run) = RunRepo::get(&conn, run_id)? else {
            return Ok(None);
        };
        let steps = StepRepo::list_for_run(&conn, run_id)?;
        Ok(Some((run, steps)))
    }

    /// One step by ID.
    pub fn step(&self, step_id: &str) -> Result<Option<Step>> {
        let conn = self.pool.get()?;
        StepRepo::get(&conn, step_id)
    }

    /// Most recent runs for a project, newest first, bounded.
    pub fn list_runs(&self, project_id: &str, limit: u32) -> Result<Vec<Run>> {
        let conn = self.pool.get()?;
        RunRepo::list_for_project(&conn, project_id, limit)
    }

    /// Whether a run exists.
    pub fn run_exists(&self, run_id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        RunRepo::exists(&conn, run_id)
    }

    /// Transition a run `queued → running`.
    #[instrument(skip(self))]
    pub fn mark_run_running(&self, run_id: &str) -> Result<()> {
        self.transition_run(run_id, RunStatus::Running, None)
    }

    /// Transition a run to `completed`.
    #[instrument(skip(self))]
    pub fn complete_run(&self, run_id: &str) -> Result<()> {
        self.transition_run(run_id, RunStatus::Completed, None)
    }

    /// Transition a run to `failed`, recording the error text.
    #[instrument(skip(self, error))]
    pub fn fail_run(&self, run_id: &str, error: &str) -> Result<()> {
        self.transition_run(run_id, RunStatus::Failed, Some(error))
    }

    fn transition_run(&self, run_id: &str, to: RunStatus, error: Option<&str>) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let from = RunRepo::status(&tx, run_id)?;
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalRunTransition {
                id: run_id.to_string(),
                from,
                to,
            });
        }
        RunRepo::set_status(&tx, run_id, to, error)?;
        tx.commit()?;
        debug!(run_id, %from, %to, "run transition");
        Ok(())
    }

    /// Transition a step `queued → running` with its progress label.
    #[instrument(skip(self, label))]
    pub fn mark_step_running(&self, step_id: &str, label: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let from = StepRepo::status(&tx, step_id)?;
        if !from.can_transition_to(StepStatus::Running) {
            return Err(StoreError::IllegalStepTransition {
                id: step_id.to_string(),
                from,
                to: StepStatus::Running,
            });
        }
        StepRepo::mark_running(&tx, step_id, label)?;
        tx.commit()?;
        Ok(())
    }

    /// Update a step's progress (non-decreasing) and optional label.
    pub fn set_step_progress(&self, step_id: &str, progress: u8, label: Option<&str>) -> Result<()> {
        let conn = self.pool.get()?;
        StepRepo::set_progress(&conn, step_id, progress, label)
    }

    /// Complete a step and add its usage to the run's totals, atomically.
    #[instrument(skip(self, artifact_id))]
    pub fn complete_step(
        &self,
        step_id: &str,
        tokens_used: u64,
        cost: f64,
        artifact_id: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let step = StepRepo::get(&tx, step_id)?
            .ok_or_else(|| StoreError::StepNotFound(step_id.to_string()))?;
        if !step.status.can_transition_to(StepStatus::Completed) {
            return Err(StoreError::IllegalStepTransition {
                id: step_id.to_string(),
                from: step.status,
                to: StepStatus::Completed,
            });
        }
        StepRepo::complete(&tx, step_id, tokens_used, artifact_id)?;
        RunRepo::add_usage(&tx, &step.run_id, tokens_used, cost)?;
        tx.commit()?;
        Ok(())
    }

    /// Fail a step, recording the error text.
    #[instrument(skip(self, error))]
    pub fn fail_step(&self, step_id: &str, error: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let from = StepRepo::status(&tx, step_id)?;
        if !from.can_transition_to(StepStatus::Failed) {
            return Err(StoreError::IllegalStepTransition {
                id: step_id.to_string(),
                from,
                to: StepStatus::Failed,
            });
        }
        StepRepo::fail(&tx, step_id, error)?;
        tx.commit()?;
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
    use crate::connection::new_in_memory_pool;
    use assert_matches::assert_matches;

    fn make_store() -> RunStore {
        RunStore::new(new_in_memory_pool().unwrap()).unwrap()
    }

    fn new_run(agents: Vec<AgentType>) -> NewRun {
        NewRun {
            project_id: "proj_1".into(),
            tenant_id: "tenant_1".into(),
            mode: PipelineMode::Sequential,
            agents,
            created_by: Some("user_1".into()),
        }
    }

    #[test]
    fn create_run_persists_run_and_steps_queued() {
        let store = make_store();
        let (run, steps) = store
            .create_run(&new_run(vec![
                AgentType::QaConsultant,
                AgentType::RequirementsAnalyst,
                AgentType::TestChecklist,
            ]))
            .unwrap();

        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(steps.len(), 3);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.status, StepStatus::Queued);
            assert_eq!(step.position, i as u32);
            assert_eq!(step.run_id, run.id);
        }

        let (loaded, loaded_steps) = store.run_with_steps(&run.id).unwrap().unwrap();
        assert_eq!(loaded, run);
        assert_eq!(loaded_steps, steps);
    }

    #[test]
    fn run_lifecycle_happy_path() {
        let store = make_store();
        let (run, steps) = store.create_run(&new_run(vec![AgentType::QaConsultant])).unwrap();

        store.mark_run_running(&run.id).unwrap();
        store.mark_step_running(&steps[0].id, "Assessing QA strategy").unwrap();
        store.complete_step(&steps[0].id, 300, 0.015, Some("art_1")).unwrap();
        store.complete_run(&run.id).unwrap();

        let (loaded, loaded_steps) = store.run_with_steps(&run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.total_tokens, 300);
        assert!((loaded.total_cost - 0.015).abs() < 1e-9);
        assert_eq!(loaded_steps[0].status, StepStatus::Completed);
        assert_eq!(loaded_steps[0].artifact_id.as_deref(), Some("art_1"));
    }

    #[test]
    fn illegal_run_transition_rejected() {
        let store = make_store();
        let (run, _) = store.create_run(&new_run(vec![AgentType::QaConsultant])).unwrap();

        // queued → completed skips running
        assert_matches!(
            store.complete_run(&run.id),
            Err(StoreError::IllegalRunTransition { .. })
        );

        store.mark_run_running(&run.id).unwrap();
        store.complete_run(&run.id).unwrap();
        // terminal accepts nothing further
        assert_matches!(
            store.fail_run(&run.id, "late failure"),
            Err(StoreError::IllegalRunTransition { .. })
        );
    }

    #[test]
    fn step_cannot_complete_from_queued() {
        let store = make_store();
        let (_, steps) = store.create_run(&new_run(vec![AgentType::QaConsultant])).unwrap();
        assert_matches!(
            store.complete_step(&steps[0].id, 10, 0.0, None),
            Err(StoreError::IllegalStepTransition { .. })
        );
    }

    #[test]
    fn totals_accumulate_across_steps() {
        let store = make_store();
        let (run, steps) = store
            .create_run(&new_run(vec![
                AgentType::QaConsultant,
                AgentType::TestChecklist,
            ]))
            .unwrap();
        store.mark_run_running(&run.id).unwrap();

        store.mark_step_running(&steps[0].id, "a").unwrap();
        store.complete_step(&steps[0].id, 100, 0.01, None).unwrap();
        store.mark_step_running(&steps[1].id, "b").unwrap();
        store.complete_step(&steps[1].id, 200, 0.02, None).unwrap();

        let run = store.run(&run.id).unwrap().unwrap();
        assert_eq!(run.total_tokens, 300);
        assert!((run.total_cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn fail_step_then_fail_run_records_errors() {
        let store = make_store();
        let (run, steps) = store.create_run(&new_run(vec![AgentType::QaConsultant])).unwrap();
        store.mark_run_running(&run.id).unwrap();
        store.mark_step_running(&steps[0].id, "a").unwrap();

        store.fail_step(&steps[0].id, "both providers unreachable").unwrap();
        store.fail_run(&run.id, "step qa_consultant failed").unwrap();

        let (run, steps) = store.run_with_steps(&run.id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("step qa_consultant failed"));
        assert_eq!(steps[0].error.as_deref(), Some("both providers unreachable"));
    }

    #[test]
    fn list_runs_is_bounded_and_newest_first() {
        let store = make_store();
        for _ in 0..4 {
            store.create_run(&new_run(vec![AgentType::QaConsultant])).unwrap();
        }
        let runs = store.list_runs("proj_1", 2).unwrap();
        assert_eq!(runs.len(), 2);
        // Newest first
        assert!(runs[0].created_at >= runs[1].created_at);
    }

    #[test]
    fn unknown_run_lookups() {
        let store = make_store();
        assert!(store.run("run_missing").unwrap().is_none());
        assert!(!store.run_exists("run_missing").unwrap());
        assert_matches!(
            store.mark_run_running("run_missing"),
            Err(StoreError::RunNotFound(_))
        );
    }
}
