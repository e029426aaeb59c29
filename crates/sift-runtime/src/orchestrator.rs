//! Pipeline orchestrator — drives runs through their steps.
//!
//! One supervised tokio task per run, decoupled from the request/response
//! cycle. Every transition is persisted before it is published. The task
//! body sits behind `catch_unwind`, so modeled errors and panics alike
//! convert into a run-level `failed` transition: a run is never left in
//! `running` after its orchestration task returns.
//!
//! Failure is fail-fast: later agents consume earlier agents' artifacts, so
//! a failed step aborts the remaining queued steps. In parallel mode,
//! already-started sibling steps run to completion first to avoid orphaned
//! partial side effects.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use sift_core::events::{BaseEvent, RunEvent};
use sift_core::run::{Run, Step};
use sift_core::status::{PipelineMode, StepStatus};
use sift_gateway::gateway::{InferenceCall, InferenceGateway};
use sift_store::{RunStore, StoreError};

use crate::artifacts::ArtifactSink;
use crate::bus::EventBus;
use crate::context::ContextAssembler;
use crate::errors::RuntimeError;

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Concurrent-run ceiling across all tenants.
    pub max_concurrent_runs: usize,
    /// Per-tenant daily token budget passed to the gateway on every call.
    pub daily_token_limit: u64,
    /// Output token ceiling per step.
    pub max_step_tokens: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 8,
            daily_token_limit: 1_000_000,
            max_step_tokens: 4096,
        }
    }
}

/// RAII record of an in-flight run; the permit returns to the semaphore
/// when the run is removed from `active_runs`.
struct ActiveRun {
    _permit: OwnedSemaphorePermit,
}

enum StepOutcome {
    Completed,
    Failed(String),
}

/// Coordinates run execution across the store, gateway, and event bus.
pub struct Orchestrator {
    store: Arc<RunStore>,
    gateway: Arc<InferenceGateway>,
    bus: Arc<EventBus>,
    contexts: Arc<dyn ContextAssembler>,
    artifacts: Arc<dyn ArtifactSink>,
    run_semaphore: Arc<Semaphore>,
    active_runs: Mutex<HashMap<String, ActiveRun>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(
        store: Arc<RunStore>,
        gateway: Arc<InferenceGateway>,
        bus: Arc<EventBus>,
        contexts: Arc<dyn ContextAssembler>,
        artifacts: Arc<dyn ArtifactSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            bus,
            contexts,
            artifacts,
            run_semaphore: Arc::new(Semaphore::new(config.max_concurrent_runs)),
            active_runs: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The event bus runs publish to.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Number of in-flight runs.
    pub fn active_run_count(&self) -> usize {
        self.active_runs.lock().len()
    }

    /// Whether a run has an in-flight orchestration task.
    pub fn has_active_run(&self, run_id: &str) -> bool {
        self.active_runs.lock().contains_key(run_id)
    }

    /// Configured concurrent-run ceiling.
    pub fn max_concurrent_runs(&self) -> usize {
        self.config.max_concurrent_runs
    }

    /// Start the run's orchestration task. The caller must not block on the
    /// returned handle; it exists so tests and shutdown paths can join.
    ///
    /// Errors if the run already has a task (`RunActive`) or the server is
    /// at its concurrent-run ceiling (`ServerBusy`). The run is expected to
    /// be persisted in `queued` status with its steps `queued`; monthly
    /// budget admission happens in the caller layer before this point.
    #[instrument(skip(self, run), fields(run_id = %run.id))]
    pub fn dispatch(self: Arc<Self>, run: Run) -> Result<JoinHandle<()>, RuntimeError> {
        {
            let mut runs = self.active_runs.lock();
            if runs.contains_key(&run.id) {
                return Err(RuntimeError::RunActive(run.id));
            }
            let permit = Arc::clone(&self.run_semaphore)
                .try_acquire_owned()
                .map_err(|_| RuntimeError::ServerBusy {
                    current: runs.len(),
                    max: self.config.max_concurrent_runs,
                })?;
            let _ = runs.insert(run.id.clone(), ActiveRun { _permit: permit });
            gauge!("pipeline_runs_active").set(runs.len() as f64);
        }
        info!(mode = %run.mode, steps = run.agents.len(), "run dispatched");

        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let run_id = run.id.clone();
            // catch_unwind is the recovery boundary: a panic anywhere in the
            // pipeline still yields a terminal `failed` transition.
            let outcome = AssertUnwindSafe(Arc::clone(&this).execute(run))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(run_id, %error, "orchestration error");
                    this.force_failure(&run_id, &format!("orchestration error: {error}"))
                        .await;
                }
                Err(_) => {
                    warn!(run_id, "orchestration task panicked");
                    this.force_failure(&run_id, "internal error: orchestration task panicked")
                        .await;
                }
            }
            this.finish(&run_id);
        });
        Ok(handle)
    }

    /// Run the pipeline to a terminal status.
    async fn execute(self: Arc<Self>, run: Run) -> Result<(), RuntimeError> {
        self.store.mark_run_running(&run.id)?;
        let steps = self
            .store
            .run_with_steps(&run.id)?
            .map(|(_, steps)| steps)
            .ok_or_else(|| StoreError::RunNotFound(run.id.clone()))?;

        let failure = match run.mode {
            PipelineMode::Sequential => {
                let mut failure = None;
                for step in &steps {
                    match self.run_step(&run, step).await? {
                        StepOutcome::Completed => {}
                        StepOutcome::Failed(message) => {
                            // Fail-fast: remaining steps stay queued.
                            failure = Some(format!("step {} failed: {message}", step.agent));
                            break;
                        }
                    }
                }
                failure
            }
            PipelineMode::Parallel => Arc::clone(&self).execute_parallel(&run, steps).await,
        };

        match failure {
            None => {
                self.store.complete_run(&run.id)?;
                counter!("pipeline_runs_completed_total").increment(1);
                let _ = self.bus.publish(RunEvent::finished(&run.id, false));
                info!(run_id = %run.id, "run completed");
            }
            Some(message) => {
                self.store.fail_run(&run.id, &message)?;
                counter!("pipeline_runs_failed_total").increment(1);
                let _ = self.bus.publish(RunEvent::finished(&run.id, true));
                info!(run_id = %run.id, %message, "run failed");
            }
        }
        let _ = self.bus.release_if_idle(&run.id);
        Ok(())
    }

    /// Fan all steps out concurrently; a failure fails the run but started
    /// siblings settle first.
    async fn execute_parallel(self: Arc<Self>, run: &Run, steps: Vec<Step>) -> Option<String> {
        let mut set = JoinSet::new();
        for step in steps {
            let this = Arc::clone(&self);
            let run = run.clone();
            let _ = set.spawn(async move {
                let agent = step.agent;
                (agent, this.run_step(&run, &step).await)
            });
        }

        let mut failure = None;
        while let Some(joined) = set.join_next().await {
            let observed = match joined {
                Ok((_, Ok(StepOutcome::Completed))) => None,
                Ok((agent, Ok(StepOutcome::Failed(message)))) => {
                    Some(format!("step {agent} failed: {message}"))
                }
                Ok((agent, Err(error))) => {
                    Some(format!("step {agent} hit an internal error: {error}"))
                }
                Err(join_error) => Some(format!("step task aborted: {join_error}")),
            };
            if failure.is_none() {
                failure = observed;
            }
        }
        failure
    }

    /// Execute one step: transition, publish, invoke, record, publish.
    ///
    /// Gateway/collaborator failures are data ([`StepOutcome::Failed`]);
    /// the `Err` path is reserved for persistence problems.
    #[instrument(skip_all, fields(run_id = %run.id, step_id = %step.id, agent = %step.agent))]
    async fn run_step(&self, run: &Run, step: &Step) -> Result<StepOutcome, RuntimeError> {
        let label = step.agent.running_label();
        self.store.mark_step_running(&step.id, label)?;
        let _ = self.bus.publish(RunEvent::StepRunning {
            base: BaseEvent::now(&run.id),
            step_id: step.id.clone(),
            agent: step.agent,
            progress: 0,
            label: label.to_string(),
        });

        let context = match self.contexts.assemble(run, step.agent).await {
            Ok(context) => context,
            Err(error) => return self.fail_step(run, step, error.to_string()).await,
        };

        let call = InferenceCall {
            agent: step.agent,
            system: context.system,
            prompt: context.prompt,
            context_fingerprint: Some(context.fingerprint),
            tenant_id: run.tenant_id.clone(),
            daily_limit: self.config.daily_token_limit,
            max_tokens: self.config.max_step_tokens,
        };
        let outcome = match self.gateway.invoke(&call).await {
            Ok(outcome) => outcome,
            Err(error) => return self.fail_step(run, step, error.to_string()).await,
        };

        let artifact_id = match self
            .artifacts
            .create(&run.id, &step.id, step.agent, &outcome.content)
            .await
        {
            Ok(id) => id,
            Err(error) => return self.fail_step(run, step, error.to_string()).await,
        };

        self.store
            .complete_step(&step.id, outcome.tokens_used, outcome.cost, Some(&artifact_id))?;
        counter!("pipeline_steps_completed_total").increment(1);
        let _ = self.bus.publish(RunEvent::StepCompleted {
            base: BaseEvent::now(&run.id),
            step_id: step.id.clone(),
            agent: step.agent,
            progress: 100,
            tokens_used: outcome.tokens_used,
            artifact_id: Some(artifact_id),
        });
        debug!(
            tokens_used = outcome.tokens_used,
            cached = outcome.cached,
            "step completed"
        );
        Ok(StepOutcome::Completed)
    }

    /// Record a step failure and publish its error event.
    async fn fail_step(
        &self,
        run: &Run,
        step: &Step,
        message: String,
    ) -> Result<StepOutcome, RuntimeError> {
        self.store.fail_step(&step.id, &message)?;
        counter!("pipeline_steps_failed_total").increment(1);
        let _ = self.bus.publish(RunEvent::StepFailed {
            base: BaseEvent::now(&run.id),
            step_id: step.id.clone(),
            agent: step.agent,
            message: message.clone(),
        });
        warn!(%message, "step failed");
        Ok(StepOutcome::Failed(message))
    }

    /// Last-resort failure path for unexpected errors and panics.
    ///
    /// Best-effort: settles any step still marked running, records the run
    /// failure, and publishes the terminal event so listeners always have
    /// an exit condition.
    async fn force_failure(&self, run_id: &str, message: &str) {
        if let Ok(Some((_, steps))) = self.store.run_with_steps(run_id) {
            for step in steps.iter().filter(|s| s.status == StepStatus::Running) {
                if let Err(error) = self.store.fail_step(&step.id, message) {
                    warn!(step_id = %step.id, %error, "failed to settle running step");
                }
            }
        }
        match self.store.fail_run(run_id, message) {
            Ok(()) => {}
            Err(StoreError::IllegalRunTransition { .. }) => {
                // Already terminal; its terminal event was already published.
                debug!(run_id, "run already terminal");
                return;
            }
            Err(error) => warn!(run_id, %error, "failed to persist run failure"),
        }
        counter!("pipeline_runs_failed_total").increment(1);
        let _ = self.bus.publish(RunEvent::finished(run_id, true));
    }

    /// Remove the run from active tracking, releasing its permit.
    fn finish(&self, run_id: &str) {
        let mut runs = self.active_runs.lock();
        let _ = runs.remove(run_id);
        gauge!("pipeline_runs_active").set(runs.len() as f64);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
