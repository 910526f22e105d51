//! Step evaluation.
//!
//! Executes one step against a [`StepContext`]: tool calls, sequential/parallel
//! blocks, and `foreach` loops. `await_event` steps are not handled here — pausing
//! and resuming a run is an [`super::Engine`]-level concern, since it needs the
//! engine's storage and event bus, not just a context to mutate.

use super::StepContext;
use crate::adapter::{Adapter, AdapterRegistry, ExecutionContext, ToolManifest};
use crate::constants::*;
use crate::dsl::Templater;
use crate::{BeemFlowError, Result, Step};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluates a single step's effect on a [`StepContext`].
pub struct Executor {
    adapters: Arc<AdapterRegistry>,
    templater: Arc<Templater>,
}

impl Executor {
    pub fn new(adapters: Arc<AdapterRegistry>, templater: Arc<Templater>) -> Self {
        Self { adapters, templater }
    }

    /// Executes `step`, storing its result at `ctx.outputs[output_id]`.
    ///
    /// `output_id` is usually `step.id`, except inside a `foreach` body where it is
    /// the rendered per-iteration id.
    pub fn execute_step<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a StepContext,
        exec_ctx: &'a ExecutionContext,
        output_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if step.await_event.is_some() {
                return Err(BeemFlowError::internal(
                    "await_event is only supported as a top-level flow step",
                ));
            }

            if step.foreach.is_some() {
                return self.execute_foreach(step, ctx, exec_ctx, output_id).await;
            }

            if step.steps.is_some() {
                return self.execute_block(step, ctx, exec_ctx, output_id).await;
            }

            if let Some(use_) = &step.use_ {
                return self.execute_tool_call(use_, step, ctx, exec_ctx, output_id).await;
            }

            ctx.set_output(output_id.to_string(), Value::Object(Default::default()));
            Ok(())
        })
    }

    async fn execute_block(
        &self,
        step: &Step,
        ctx: &StepContext,
        exec_ctx: &ExecutionContext,
        output_id: &str,
    ) -> Result<()> {
        let children = step.steps.as_ref().expect("checked by caller");

        if step.parallel == Some(true) {
            let mut handles = Vec::with_capacity(children.len());
            for child in children {
                let child = child.clone();
                let ctx = ctx.clone();
                let adapters = self.adapters.clone();
                let templater = self.templater.clone();
                let exec_ctx = exec_ctx.clone();
                handles.push(tokio::spawn(async move {
                    let executor = Executor::new(adapters, templater);
                    let id = child.id.clone();
                    let result = executor.execute_step(&child, &ctx, &exec_ctx, &id).await;
                    (id, result)
                }));
            }

            let mut merged = serde_json::Map::new();
            let mut first_err = None;
            for handle in handles {
                let (id, result) = handle
                    .await
                    .map_err(|e| BeemFlowError::internal(format!("parallel task panicked: {e}")))?;
                match result {
                    Ok(()) => {
                        if let Some(v) = ctx.get_output(&id) {
                            merged.insert(id, v);
                        }
                    }
                    Err(e) => {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                }
            }

            ctx.set_output(output_id.to_string(), Value::Object(merged));
            if let Some(e) = first_err {
                return Err(e);
            }
            Ok(())
        } else {
            let mut merged = serde_json::Map::new();
            let mut err = None;
            for child in children {
                match self.execute_step(child, ctx, exec_ctx, &child.id).await {
                    Ok(()) => {
                        if let Some(v) = ctx.get_output(&child.id) {
                            merged.insert(child.id.clone(), v);
                        }
                    }
                    Err(e) => {
                        err = Some(e);
                        break;
                    }
                }
            }

            ctx.set_output(output_id.to_string(), Value::Object(merged));
            if let Some(e) = err {
                return Err(e);
            }
            Ok(())
        }
    }

    async fn execute_foreach(
        &self,
        step: &Step,
        ctx: &StepContext,
        exec_ctx: &ExecutionContext,
        output_id: &str,
    ) -> Result<()> {
        let foreach_expr = step.foreach.as_ref().expect("checked by caller");
        let as_var = step
            .as_
            .as_ref()
            .ok_or_else(|| BeemFlowError::internal("foreach step missing 'as'"))?;
        let do_steps = step
            .do_
            .as_ref()
            .ok_or_else(|| BeemFlowError::internal("foreach step missing 'do'"))?;

        let data = ctx.template_data();
        let list_val = self
            .templater
            .evaluate_expression(foreach_expr, &data)
            .map_err(|e| match e {
                BeemFlowError::Template { source, .. } => {
                    BeemFlowError::template(step.id.clone(), source)
                }
                other => other,
            })?;

        let list = list_val.as_array().cloned().ok_or_else(|| {
            BeemFlowError::ForeachNotList {
                step_id: step.id.clone(),
            }
        })?;

        if list.is_empty() {
            ctx.set_output(output_id.to_string(), Value::Object(Default::default()));
            return Ok(());
        }

        if step.parallel == Some(true) {
            self.execute_foreach_parallel(&list, as_var, do_steps, ctx, exec_ctx)
                .await?;
        } else {
            self.execute_foreach_sequential(&list, as_var, do_steps, ctx, exec_ctx)
                .await?;
        }

        ctx.set_output(output_id.to_string(), Value::Object(Default::default()));
        Ok(())
    }

    async fn execute_foreach_sequential(
        &self,
        list: &[Value],
        as_var: &str,
        do_steps: &[Step],
        ctx: &StepContext,
        exec_ctx: &ExecutionContext,
    ) -> Result<()> {
        for item in list {
            ctx.set_var(as_var.to_string(), item.clone());
            for body_step in do_steps {
                let data = ctx.template_data();
                let rendered_id = self.templater.render(&body_step.id, &data)?;
                self.execute_step(body_step, ctx, exec_ctx, &rendered_id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn execute_foreach_parallel(
        &self,
        list: &[Value],
        as_var: &str,
        do_steps: &[Step],
        ctx: &StepContext,
        exec_ctx: &ExecutionContext,
    ) -> Result<()> {
        let mut handles = Vec::with_capacity(list.len());

        for item in list {
            let item = item.clone();
            let as_var = as_var.to_string();
            let do_steps = do_steps.to_vec();
            let snapshot = ctx.snapshot();
            let adapters = self.adapters.clone();
            let templater = self.templater.clone();
            let exec_ctx = exec_ctx.clone();

            handles.push(tokio::spawn(async move {
                let iter_ctx = StepContext::new(snapshot.event, snapshot.vars, snapshot.secrets);
                for (k, v) in snapshot.outputs {
                    iter_ctx.set_output(k, v);
                }
                iter_ctx.set_var(as_var, item);

                let executor = Executor::new(adapters, templater.clone());
                for body_step in &do_steps {
                    let data = iter_ctx.template_data();
                    let rendered_id = templater.render(&body_step.id, &data)?;
                    executor
                        .execute_step(body_step, &iter_ctx, &exec_ctx, &rendered_id)
                        .await?;
                }

                Ok::<_, BeemFlowError>(iter_ctx.snapshot())
            }));
        }

        for handle in handles {
            let snapshot = handle
                .await
                .map_err(|e| BeemFlowError::internal(format!("foreach task panicked: {e}")))??;
            for (k, v) in snapshot.outputs {
                ctx.set_output(k, v);
            }
        }

        Ok(())
    }

    async fn execute_tool_call(
        &self,
        use_: &str,
        step: &Step,
        ctx: &StepContext,
        exec_ctx: &ExecutionContext,
        output_id: &str,
    ) -> Result<()> {
        let adapter = self.resolve_adapter(use_).map_err(|e| {
            ctx.set_output(output_id.to_string(), Value::Object(Default::default()));
            e
        })?;

        let data = ctx.template_data();
        let mut inputs = match &step.with {
            Some(with) => render_map(&self.templater, with, &data, &step.id)?,
            None => HashMap::new(),
        };

        if use_.starts_with(ADAPTER_PREFIX_CORE) || use_.starts_with(ADAPTER_PREFIX_MCP) {
            inputs.insert(
                PARAM_SPECIAL_USE.to_string(),
                Value::String(use_.to_string()),
            );
        }

        if let Some(manifest) = adapter.manifest() {
            autofill_env_defaults(&manifest, &ctx.snapshot().secrets, &mut inputs);
        }

        let outputs = adapter.execute(inputs, exec_ctx).await.map_err(|e| {
            ctx.set_output(output_id.to_string(), Value::Object(Default::default()));
            BeemFlowError::step_failed(step.id.clone(), e)
        })?;

        ctx.set_output(
            output_id.to_string(),
            Value::Object(outputs.into_iter().collect()),
        );
        Ok(())
    }

    fn resolve_adapter(&self, use_: &str) -> Result<Arc<dyn Adapter>> {
        if let Some(adapter) = self.adapters.get(use_) {
            return Ok(adapter);
        }
        if use_.starts_with(ADAPTER_PREFIX_CORE)
            && let Some(adapter) = self.adapters.get(ADAPTER_CORE)
        {
            return Ok(adapter);
        }
        if use_.starts_with(ADAPTER_PREFIX_MCP)
            && let Some(adapter) = self.adapters.get(ADAPTER_MCP)
        {
            return Ok(adapter);
        }
        Err(BeemFlowError::AdapterNotFound(use_.to_string()))
    }
}

/// Auto-fills required inputs whose manifest default is `{"$env": "NAME"}` from
/// secrets, when the caller didn't already supply a value.
fn autofill_env_defaults(
    manifest: &ToolManifest,
    secrets: &HashMap<String, Value>,
    inputs: &mut HashMap<String, Value>,
) {
    let Some(properties) = manifest
        .parameters
        .get(SCHEMA_KEY_PROPERTIES)
        .and_then(Value::as_object)
    else {
        return;
    };

    for (name, schema) in properties {
        if inputs.contains_key(name) {
            continue;
        }
        let Some(default) = schema.get(SCHEMA_KEY_DEFAULT).and_then(Value::as_object) else {
            continue;
        };
        let Some(env_name) = default.get(SCHEMA_KEY_ENV).and_then(Value::as_str) else {
            continue;
        };
        if let Some(secret) = secrets.get(env_name) {
            inputs.insert(name.clone(), secret.clone());
        }
    }
}

/// Recursively renders template strings in a `with` map: strings via the templater,
/// arrays/objects element-wise, other values unchanged.
fn render_map(
    templater: &Templater,
    with: &serde_json::Map<String, Value>,
    data: &HashMap<String, Value>,
    step_id: &str,
) -> Result<HashMap<String, Value>> {
    with.iter()
        .map(|(k, v)| {
            render_value(templater, v, data, step_id).map(|rendered| (k.clone(), rendered))
        })
        .collect()
}

fn render_value(
    templater: &Templater,
    value: &Value,
    data: &HashMap<String, Value>,
    step_id: &str,
) -> Result<Value> {
    match value {
        Value::String(s) => templater
            .render(s, data)
            .map(Value::String)
            .map_err(|e| match e {
                BeemFlowError::Template { source, .. } => {
                    BeemFlowError::template(step_id.to_string(), source)
                }
                other => other,
            }),
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(templater, item, data, step_id))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| {
                render_value(templater, v, data, step_id).map(|rendered| (k.clone(), rendered))
            })
            .collect::<Result<serde_json::Map<String, Value>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod executor_test;
