//! In-memory storage implementation.
//!
//! Fast, non-persistent storage for embedding and testing the engine. Uses DashMap
//! for lock-free concurrent access; atomicity of `fetch_and_delete_paused_run` relies
//! on DashMap's per-shard locking, which is sufficient to satisfy the engine's
//! single-critical-section pause/resume invariant.

use super::*;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct MemoryStorage {
    runs: Arc<DashMap<Uuid, Run>>,
    steps: Arc<DashMap<Uuid, Vec<StepRun>>>,
    paused_runs: Arc<DashMap<String, serde_json::Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(DashMap::new()),
            steps: Arc::new(DashMap::new()),
            paused_runs: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStorage for MemoryStorage {
    async fn save_run(&self, run: &Run) -> Result<()> {
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>> {
        Ok(self.runs.get(&id).map(|r| r.clone()))
    }

    async fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self.runs.iter().map(|r| r.value().clone()).collect();
        runs.sort_unstable_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn get_latest_run_by_flow_name(&self, flow_name: &str) -> Result<Option<Run>> {
        Ok(self
            .runs
            .iter()
            .filter(|r| r.value().flow_name == flow_name)
            .map(|r| r.value().clone())
            .max_by_key(|r| r.started_at))
    }
}

#[async_trait]
impl StepStorage for MemoryStorage {
    async fn save_step(&self, step: &StepRun) -> Result<()> {
        self.steps
            .entry(step.run_id)
            .or_default()
            .push(step.clone());
        Ok(())
    }

    async fn get_steps(&self, run_id: Uuid) -> Result<Vec<StepRun>> {
        Ok(self
            .steps
            .get(&run_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PausedRunStorage for MemoryStorage {
    async fn save_paused_run(&self, token: &str, data: serde_json::Value) -> Result<()> {
        self.paused_runs.insert(token.to_string(), data);
        Ok(())
    }

    async fn delete_paused_run(&self, token: &str) -> Result<()> {
        self.paused_runs.remove(token);
        Ok(())
    }

    async fn fetch_and_delete_paused_run(&self, token: &str) -> Result<Option<serde_json::Value>> {
        // DashMap::remove is the atomic primitive backing the "no double resume"
        // invariant: exactly one caller observes Some for a given token.
        Ok(self.paused_runs.remove(token).map(|(_, v)| v))
    }
}

#[cfg(test)]
mod memory_test;
