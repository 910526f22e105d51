//! The storage contract consumed by the execution engine, plus an in-memory
//! implementation. Implementations MUST be safe against concurrent calls — the engine
//! persists `Run` at start and again at terminal transitions (not on every step).

pub mod memory;

use crate::{Result, model::*};
use async_trait::async_trait;
use uuid::Uuid;

/// Run persistence: start-of-run and terminal-transition writes, plus lookups.
#[async_trait]
pub trait RunStorage: Send + Sync {
    async fn save_run(&self, run: &Run) -> Result<()>;
    async fn get_run(&self, id: Uuid) -> Result<Option<Run>>;
    async fn list_runs(&self) -> Result<Vec<Run>>;
    async fn get_latest_run_by_flow_name(&self, flow_name: &str) -> Result<Option<Run>>;
}

/// One StepRun write per executed step.
#[async_trait]
pub trait StepStorage: Send + Sync {
    async fn save_step(&self, step: &StepRun) -> Result<()>;
    async fn get_steps(&self, run_id: Uuid) -> Result<Vec<StepRun>>;
}

/// Durable paused-run records, keyed by resume token.
///
/// A `paused_run_record` is a self-describing JSON mapping containing the fields of
/// `PausedRun` (flow, step_idx, step context snapshot, outputs snapshot, token, run
/// id); implementations need not understand its shape beyond round-tripping it.
#[async_trait]
pub trait PausedRunStorage: Send + Sync {
    async fn save_paused_run(&self, token: &str, data: serde_json::Value) -> Result<()>;
    async fn delete_paused_run(&self, token: &str) -> Result<()>;

    /// Atomically removes and returns the record for `token`. Returns `None` if
    /// absent, preventing a double-resume from racing the same pause.
    async fn fetch_and_delete_paused_run(&self, token: &str) -> Result<Option<serde_json::Value>>;
}

/// The full storage contract the engine depends on.
#[async_trait]
pub trait Storage: RunStorage + StepStorage + PausedRunStorage {}

impl<T: RunStorage + StepStorage + PausedRunStorage> Storage for T {}

pub use memory::MemoryStorage;
