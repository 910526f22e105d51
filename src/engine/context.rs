//! Step execution context.
//!
//! A concurrent-safe carrier of four sub-maps: `event`, `vars`, `outputs`, `secrets`.
//! All mutations and the snapshot are guarded by a reader/writer lock; the snapshot
//! itself only needs a read lock, so concurrent readers (parallel siblings rendering
//! templates) never block each other.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Thread-safe carrier of event/vars/outputs/secrets for one run.
#[derive(Debug, Clone)]
pub struct StepContext {
    event: Arc<RwLock<HashMap<String, Value>>>,
    vars: Arc<RwLock<HashMap<String, Value>>>,
    outputs: Arc<RwLock<HashMap<String, Value>>>,
    secrets: Arc<RwLock<HashMap<String, Value>>>,
}

impl StepContext {
    pub fn new(
        event: HashMap<String, Value>,
        vars: HashMap<String, Value>,
        secrets: HashMap<String, Value>,
    ) -> Self {
        Self {
            event: Arc::new(RwLock::new(event)),
            vars: Arc::new(RwLock::new(vars)),
            outputs: Arc::new(RwLock::new(HashMap::new())),
            secrets: Arc::new(RwLock::new(secrets)),
        }
    }

    pub fn set_event(&self, key: String, value: Value) {
        self.event.write().insert(key, value);
    }

    pub fn set_var(&self, key: String, value: Value) {
        self.vars.write().insert(key, value);
    }

    pub fn set_output(&self, key: String, value: Value) {
        self.outputs.write().insert(key, value);
    }

    pub fn get_output(&self, key: &str) -> Option<Value> {
        self.outputs.read().get(key).cloned()
    }

    #[allow(dead_code)]
    pub fn set_secret(&self, key: String, value: Value) {
        self.secrets.write().insert(key, value);
    }

    /// Immutable, caller-owned copies of all four sub-maps.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            event: self.event.read().clone(),
            vars: self.vars.read().clone(),
            outputs: self.outputs.read().clone(),
            secrets: self.secrets.read().clone(),
        }
    }

    /// Flattens the context for template rendering.
    ///
    /// Contains `event`, `vars`, `outputs`, `secrets`, and an alias `steps` pointing
    /// at `outputs`. Keys of `vars`, keys of `event`, and those keys of `outputs`
    /// whose names are valid identifiers (and free of template syntax) are lifted to
    /// the top level for short-form access. An output whose step id is not a valid
    /// identifier (because it still contains unrendered template syntax) is never
    /// lifted — it would otherwise collide with the template parser.
    pub fn template_data(&self) -> HashMap<String, Value> {
        let snapshot = self.snapshot();
        let mut data = HashMap::new();

        data.insert(
            crate::constants::TEMPLATE_FIELD_EVENT.to_string(),
            map_to_value(&snapshot.event),
        );
        data.insert(
            crate::constants::TEMPLATE_FIELD_VARS.to_string(),
            map_to_value(&snapshot.vars),
        );
        data.insert(
            crate::constants::TEMPLATE_FIELD_OUTPUTS.to_string(),
            map_to_value(&snapshot.outputs),
        );
        data.insert(
            crate::constants::TEMPLATE_FIELD_SECRETS.to_string(),
            map_to_value(&snapshot.secrets),
        );
        data.insert(
            crate::constants::TEMPLATE_FIELD_STEPS.to_string(),
            map_to_value(&snapshot.outputs),
        );

        data.extend(snapshot.vars);
        data.extend(snapshot.event);
        data.extend(
            snapshot
                .outputs
                .into_iter()
                .filter(|(k, _)| is_valid_identifier(k)),
        );

        data
    }
}

fn map_to_value(map: &HashMap<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Immutable view of `{event, vars, outputs, secrets}` at a point in time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContextSnapshot {
    pub event: HashMap<String, Value>,
    pub vars: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub secrets: HashMap<String, Value>,
}

/// A string free of template syntax that looks like `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.contains("{{") || s.contains("}}") || s.contains("{%") || s.contains("%}") {
        return false;
    }
    let mut chars = s.chars();
    let first = chars.next().expect("non-empty string has a first char");
    if !first.is_alphabetic() && first != '_' {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod context_test;
