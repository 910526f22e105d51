//! Core data models for the workflow engine.
//!
//! These structures define flows, runs, steps, and related records. `Flow` is consumed
//! read-only by the engine; it is produced elsewhere (flow-file parsing is out of
//! scope here) and is accepted as-is — shape validation is the parser's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An immutable workflow plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flow {
    /// Identifies the flow.
    pub name: String,

    /// Initial variables, merged into the step context at the start of execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vars: Option<Map<String, Value>>,

    /// Ordered steps making up the plan.
    pub steps: Vec<Step>,

    /// Recovery steps run best-effort when execution fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catch: Option<Vec<Step>>,
}

/// One node of a flow.
///
/// Exactly one of `use_`, `steps`, `foreach`, or `await_event` is a given step's
/// "kind"; which fields are populated for a given step determines how it is
/// evaluated. See the execution engine's step-evaluation algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Step {
    /// Unique within its enclosing sequence after template rendering. May itself
    /// contain template syntax only when this step is the body of a `foreach`.
    pub id: String,

    /// Names a tool: `core.*`, `mcp://host/tool`, or a registered tool name.
    #[serde(skip_serializing_if = "Option::is_none", rename = "use")]
    pub use_: Option<String>,

    /// Tool inputs; values may contain template strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<Map<String, Value>>,

    /// Combined with `steps` to make a block; `true` runs children concurrently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Nested steps of a block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    /// Template expression evaluating to an ordered sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreach: Option<String>,

    /// Variable name bound to the current item on each `foreach` iteration.
    #[serde(skip_serializing_if = "Option::is_none", rename = "as")]
    pub as_: Option<String>,

    /// Loop body, run once per `foreach` item.
    #[serde(skip_serializing_if = "Option::is_none", rename = "do")]
    pub do_: Option<Vec<Step>>,

    /// Suspends the run until a matching resume event arrives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_event: Option<AwaitEventSpec>,
}

/// `await_event` step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwaitEventSpec {
    /// Match criteria; MUST contain a `token` key whose value is a template
    /// expression rendering to the resume key.
    #[serde(rename = "match")]
    pub match_: Map<String, Value>,
}

impl AwaitEventSpec {
    /// The unrendered `token` template expression, if present.
    pub fn token_template(&self) -> Option<&str> {
        self.match_.get("token").and_then(Value::as_str)
    }
}

/// One invocation of a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub flow_name: String,
    /// Initial event mapping.
    pub event: Map<String, Value>,
    /// Initial variables.
    pub vars: Map<String, Value>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// StepRun log, ordered by execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepRun>>,
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Waiting,
    /// Superseded by a new pause registered on the same resume token.
    Skipped,
}

/// One executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    pub id: Uuid,
    pub run_id: Uuid,
    /// The rendered step id.
    pub step_name: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Map<String, Value>>,
}

/// StepRun terminal status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Succeeded,
    Failed,
}
