//! The execution engine: walks a [`Flow`]'s step graph, orchestrating persistence,
//! pausing, and resumption around the stateless per-step evaluation in
//! [`executor`].

pub mod context;
pub mod executor;

use crate::adapter::{AdapterRegistry, ExecutionContext};
use crate::constants::*;
use crate::dsl::Templater;
use crate::event::{EventBus, InProcEventBus};
use crate::model::{Run, RunStatus, StepRun, StepStatus};
use crate::storage::{MemoryStorage, Storage};
use crate::{BeemFlowError, Flow, Result, Step};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use context::{ContextSnapshot, StepContext};
pub use executor::Executor;

/// Result of a successful (non-paused) `Execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub outputs: Map<String, Value>,
}

/// Durable snapshot of a run paused at an `await_event` step, round-tripped through
/// storage as an opaque JSON mapping.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PausedRunRecord {
    flow: Flow,
    step_idx: usize,
    step_ctx: ContextSnapshot,
    token: String,
    run_id: Uuid,
}

/// In-memory state the engine mutates under a single lock: which tokens are
/// currently awaited, and completed-but-not-yet-collected resume outputs.
#[derive(Default)]
struct EngineState {
    /// token -> the run id it belongs to. Exists so a resume subscription always
    /// knows which run it is superseding or completing.
    waiting: HashMap<String, Uuid>,
    /// token -> merged outputs, populated when `resume` finishes a run; drained by
    /// `get_completed_outputs`.
    completed_outputs: HashMap<String, Map<String, Value>>,
}

/// BeemFlow execution engine. Share via `Arc<Engine>` — pause/resume wiring needs to
/// hand out an owning reference to itself for the event-bus subscription callback.
pub struct Engine {
    adapters: Arc<AdapterRegistry>,
    templater: Arc<Templater>,
    event_bus: Arc<dyn EventBus>,
    storage: Arc<dyn Storage>,
    state: Mutex<EngineState>,
}

impl Engine {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        templater: Arc<Templater>,
        event_bus: Arc<dyn EventBus>,
        storage: Arc<dyn Storage>,
    ) -> Arc<Self> {
        Arc::new(Self {
            adapters,
            templater,
            event_bus,
            storage,
            state: Mutex::new(EngineState::default()),
        })
    }

    /// Engine over `MemoryStorage` + `InProcEventBus` with the `core`/`http`/`mcp`
    /// built-in adapters registered. For embedding this crate's own tests and for
    /// downstream consumers that don't need durable storage.
    pub fn for_testing() -> Arc<Self> {
        let adapters = Arc::new(AdapterRegistry::new());
        adapters.register(Arc::new(crate::adapter::CoreAdapter::new()));
        adapters.register(Arc::new(crate::adapter::HttpAdapter::new(
            ADAPTER_HTTP.to_string(),
            None,
        )));
        adapters.register(Arc::new(crate::adapter::McpAdapter::new()));

        Self::new(
            adapters,
            Arc::new(Templater::new()),
            Arc::new(InProcEventBus::new()),
            Arc::new(MemoryStorage::new()),
        )
    }

    /// Executes `flow` against `event`. On success, returns the full outputs
    /// mapping. On suspension at an `await_event` step, returns
    /// `Err(BeemFlowError::AwaitPause(step_id))`. On any other failure, if
    /// `flow.catch` is non-empty, catch steps run best-effort against a fresh
    /// context derived from `event`, and the result is
    /// `Err(BeemFlowError::FlowFailed { outputs: <catch outputs>, source: <original error> })`.
    pub async fn execute(
        self: &Arc<Self>,
        flow: &Flow,
        event: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        let event_map: HashMap<String, Value> = event.clone().into_iter().collect();
        let vars: HashMap<String, Value> = flow.vars.clone().unwrap_or_default().into_iter().collect();
        let secrets = collect_secrets(&event_map);
        let ctx = StepContext::new(event_map, vars, secrets);

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        self.storage
            .save_run(&Run {
                id: run_id,
                flow_name: flow.name.clone(),
                event: event.clone(),
                vars: flow.vars.clone().unwrap_or_default(),
                status: RunStatus::Running,
                started_at,
                ended_at: None,
                steps: None,
            })
            .await?;

        let exec_ctx = ExecutionContext::default();
        let result = self.run_from(flow, &ctx, 0, run_id, &exec_ctx).await;

        match result {
            Ok(outputs) => {
                self.persist_terminal_run(flow, &event, run_id, started_at, RunStatus::Succeeded)
                    .await?;
                Ok(ExecutionResult {
                    run_id,
                    outputs: to_map(outputs),
                })
            }
            Err(BeemFlowError::AwaitPause(step_id)) => {
                self.persist_terminal_run(flow, &event, run_id, started_at, RunStatus::Waiting)
                    .await?;
                Err(BeemFlowError::AwaitPause(step_id))
            }
            Err(e) => {
                self.persist_terminal_run(flow, &event, run_id, started_at, RunStatus::Failed)
                    .await?;
                // Outputs-alongside-error wrapping only applies with a non-empty
                // catch; a catchless flow returns the bare underlying error, not an
                // always-present `FlowFailed{outputs: {}, ..}`.
                if flow.catch.as_ref().filter(|c| !c.is_empty()).is_some() {
                    let catch_outputs = self.run_catch(flow, &event, run_id).await;
                    Err(BeemFlowError::flow_failed(catch_outputs, e))
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Resumes a run paused on `token`. A no-op if no `PausedRun` exists for it.
    /// `event`'s keys are merged into the paused context's `event` mapping, resume
    /// keys overriding.
    pub async fn resume(self: &Arc<Self>, token: &str, event: Map<String, Value>) -> Result<()> {
        let Some(paused_json) = self.storage.fetch_and_delete_paused_run(token).await? else {
            return Ok(());
        };
        {
            let mut state = self.state.lock().await;
            state.waiting.remove(token);
        }

        let paused: PausedRunRecord = serde_json::from_value(paused_json)?;

        let mut merged_event = paused.step_ctx.event.clone();
        for (k, v) in event {
            merged_event.insert(k, v);
        }
        let ctx = StepContext::new(
            merged_event,
            paused.step_ctx.vars.clone(),
            paused.step_ctx.secrets.clone(),
        );
        for (k, v) in paused.step_ctx.outputs.clone() {
            ctx.set_output(k, v);
        }

        let exec_ctx = ExecutionContext::default();
        let result = self
            .run_from(&paused.flow, &ctx, paused.step_idx + 1, paused.run_id, &exec_ctx)
            .await;

        let event_for_run: Map<String, Value> = ctx.snapshot().event.into_iter().collect();
        let status = match &result {
            Ok(_) => RunStatus::Succeeded,
            Err(BeemFlowError::AwaitPause(_)) => RunStatus::Waiting,
            Err(_) => RunStatus::Failed,
        };
        self.persist_terminal_run(
            &paused.flow,
            &event_for_run,
            paused.run_id,
            Utc::now(),
            status,
        )
        .await?;

        let merged_outputs = to_map(ctx.snapshot().outputs);
        let mut state = self.state.lock().await;
        state.completed_outputs.insert(token.to_string(), merged_outputs);
        Ok(())
    }

    /// Returns and removes the merged outputs of a previously resumed run. Empty if
    /// no resume has completed for `token` (yet, or ever).
    pub async fn get_completed_outputs(&self, token: &str) -> Map<String, Value> {
        let mut state = self.state.lock().await;
        state.completed_outputs.remove(token).unwrap_or_default()
    }

    pub async fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs = self.storage.list_runs().await?;
        for run in &mut runs {
            run.steps = Some(self.storage.get_steps(run.id).await?);
        }
        Ok(runs)
    }

    pub async fn get_run_by_id(&self, id: Uuid) -> Result<Option<Run>> {
        let Some(mut run) = self.storage.get_run(id).await? else {
            return Ok(None);
        };
        run.steps = Some(self.storage.get_steps(id).await?);
        Ok(Some(run))
    }

    /// Releases adapter-held resources (subprocesses, connection pools).
    pub async fn close(&self) -> Result<()> {
        self.adapters.close_all().await
    }

    /// Walks `flow.steps` starting at `start_idx`, persisting one `StepRun` per
    /// executed step and handling the `await_event` pause/supersede protocol
    /// in-place.
    async fn run_from(
        self: &Arc<Self>,
        flow: &Flow,
        ctx: &StepContext,
        start_idx: usize,
        run_id: Uuid,
        exec_ctx: &ExecutionContext,
    ) -> Result<Map<String, Value>> {
        let executor = Executor::new(self.adapters.clone(), self.templater.clone());

        for idx in start_idx..flow.steps.len() {
            let step = &flow.steps[idx];

            if let Some(spec) = &step.await_event {
                return self.handle_await_event(flow, ctx, idx, spec, run_id).await;
            }

            let started_at = Utc::now();
            let result = executor.execute_step(step, ctx, exec_ctx, &step.id).await;
            let outputs = ctx
                .get_output(&step.id)
                .and_then(|v| v.as_object().cloned());

            match &result {
                Ok(()) => {
                    self.storage
                        .save_step(&StepRun {
                            id: Uuid::new_v4(),
                            run_id,
                            step_name: step.id.clone(),
                            status: StepStatus::Succeeded,
                            started_at,
                            ended_at: Utc::now(),
                            error: None,
                            outputs,
                        })
                        .await?;
                }
                Err(e) => {
                    self.storage
                        .save_step(&StepRun {
                            id: Uuid::new_v4(),
                            run_id,
                            step_name: step.id.clone(),
                            status: StepStatus::Failed,
                            started_at,
                            ended_at: Utc::now(),
                            error: Some(e.to_string()),
                            outputs,
                        })
                        .await?;
                }
            }

            if let Err(e) = result {
                // The executor already classifies some failures (a `StepFailed` from
                // its own adapter-execution wrapping, or a shape error like
                // `AdapterNotFound`/`ForeachNotList`/`Template`/
                // `AwaitEventMissingToken`) — only wrap what isn't already one of
                // those, so a tool failure never ends up double-nested as
                // `StepFailed{StepFailed{..}}`.
                return Err(match e {
                    BeemFlowError::StepFailed { .. }
                    | BeemFlowError::AdapterNotFound(_)
                    | BeemFlowError::ForeachNotList { .. }
                    | BeemFlowError::Template { .. }
                    | BeemFlowError::AwaitEventMissingToken(_) => e,
                    other => BeemFlowError::step_failed(step.id.clone(), other),
                });
            }
        }

        Ok(to_map(ctx.snapshot().outputs))
    }

    async fn handle_await_event(
        self: &Arc<Self>,
        flow: &Flow,
        ctx: &StepContext,
        step_idx: usize,
        spec: &crate::model::AwaitEventSpec,
        run_id: Uuid,
    ) -> Result<Map<String, Value>> {
        let step_id = flow.steps[step_idx].id.clone();

        let token_template = spec
            .token_template()
            .ok_or_else(|| BeemFlowError::AwaitEventMissingToken(step_id.clone()))?;

        let data = ctx.template_data();
        let token = self
            .templater
            .render(token_template, &data)
            .map_err(|e| match e {
                BeemFlowError::Template { source, .. } => {
                    BeemFlowError::template(step_id.clone(), source)
                }
                other => other,
            })?;

        if token.trim().is_empty() {
            return Err(BeemFlowError::AwaitEventMissingToken(step_id));
        }

        let record = PausedRunRecord {
            flow: flow.clone(),
            step_idx,
            step_ctx: ctx.snapshot(),
            token: token.clone(),
            run_id,
        };

        {
            let mut state = self.state.lock().await;

            // Supersede: a pause already registered on this token is evicted and
            // its run marked Skipped before the new one is registered.
            if let Some(old_json) = self.storage.fetch_and_delete_paused_run(&token).await? {
                state.waiting.remove(&token);
                if let Ok(old) = serde_json::from_value::<PausedRunRecord>(old_json) {
                    self.mark_run_skipped(old.run_id).await?;
                }
            }

            self.storage
                .save_paused_run(&token, serde_json::to_value(&record)?)
                .await?;
            state.waiting.insert(token.clone(), run_id);
        }

        let resume_topic = format!("{EVENT_TOPIC_RESUME_PREFIX}{token}");
        let engine = self.clone();
        let token_for_resume = token.clone();
        self.event_bus
            .subscribe(
                &resume_topic,
                Arc::new(move |payload: Value| {
                    let engine = engine.clone();
                    let token = token_for_resume.clone();
                    let event = payload.as_object().cloned().unwrap_or_default();
                    tokio::spawn(async move {
                        if let Err(e) = engine.resume(&token, event).await {
                            tracing::error!("resume for token '{token}' failed: {e}");
                        }
                    });
                }),
            )
            .await?;

        Err(BeemFlowError::AwaitPause(step_id))
    }

    async fn mark_run_skipped(&self, run_id: Uuid) -> Result<()> {
        if let Some(mut run) = self.storage.get_run(run_id).await? {
            run.status = RunStatus::Skipped;
            run.ended_at = Some(Utc::now());
            self.storage.save_run(&run).await?;
        }
        Ok(())
    }

    async fn persist_terminal_run(
        &self,
        flow: &Flow,
        event: &Map<String, Value>,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) -> Result<()> {
        let ended_at = match status {
            RunStatus::Waiting | RunStatus::Running => None,
            _ => Some(Utc::now()),
        };
        self.storage
            .save_run(&Run {
                id: run_id,
                flow_name: flow.name.clone(),
                event: event.clone(),
                vars: flow.vars.clone().unwrap_or_default(),
                status,
                started_at,
                ended_at,
                steps: None,
            })
            .await
    }

    /// Runs `flow.catch` best-effort against a fresh context derived from `event`.
    /// Individual catch-step failures are logged and dropped; only successful
    /// outputs are returned.
    async fn run_catch(
        &self,
        flow: &Flow,
        event: &Map<String, Value>,
        run_id: Uuid,
    ) -> Map<String, Value> {
        let Some(catch_steps) = flow.catch.as_ref().filter(|c| !c.is_empty()) else {
            return Map::new();
        };

        let event_map: HashMap<String, Value> = event.clone().into_iter().collect();
        let vars: HashMap<String, Value> = flow.vars.clone().unwrap_or_default().into_iter().collect();
        let secrets = collect_secrets(&event_map);
        let ctx = StepContext::new(event_map, vars, secrets);
        let executor = Executor::new(self.adapters.clone(), self.templater.clone());
        let exec_ctx = ExecutionContext::default();

        let mut outputs = Map::new();
        for step in catch_steps {
            let started_at = Utc::now();
            let result = executor
                .execute_step(step, &ctx, &exec_ctx, &step.id)
                .await;
            let step_outputs = ctx
                .get_output(&step.id)
                .and_then(|v| v.as_object().cloned());

            let (status, error) = match &result {
                Ok(()) => (StepStatus::Succeeded, None),
                Err(e) => {
                    tracing::warn!("catch step '{}' failed: {e}", step.id);
                    (StepStatus::Failed, Some(e.to_string()))
                }
            };

            let _ = self
                .storage
                .save_step(&StepRun {
                    id: Uuid::new_v4(),
                    run_id,
                    step_name: step.id.clone(),
                    status,
                    started_at,
                    ended_at: Utc::now(),
                    error,
                    outputs: step_outputs.clone(),
                })
                .await;

            if result.is_ok()
                && let Some(v) = step_outputs
            {
                outputs.insert(step.id.clone(), Value::Object(v));
            }
        }

        outputs
    }
}

/// Merges `event["secrets"]` (if present) with every top-level `event` key prefixed
/// `$env`, stripped of that prefix. See the engine's secrets-collection step.
fn collect_secrets(event: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut secrets = HashMap::new();

    if let Some(obj) = event.get(SECRETS_EVENT_KEY).and_then(Value::as_object) {
        for (k, v) in obj {
            secrets.insert(k.clone(), v.clone());
        }
    }

    for (k, v) in event {
        if let Some(name) = k.strip_prefix(ENV_VAR_PREFIX) {
            secrets.insert(name.to_string(), v.clone());
        }
    }

    secrets
}

fn to_map(outputs: HashMap<String, Value>) -> Map<String, Value> {
    outputs.into_iter().collect()
}



#[cfg(test)]
mod error_test;
