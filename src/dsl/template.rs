//! Templating layer: renders template strings and evaluates expressions against a
//! flattened context map, using minijinja's native Django/Jinja2-style syntax.

use crate::Result;
use crate::error::TemplateError;
use minijinja::{Environment, Value};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Renders template strings and evaluates expressions against a context map.
pub struct Templater {
    env: Arc<Environment<'static>>,
}

impl Templater {
    pub fn new() -> Self {
        let mut env = Environment::new();
        Self::register_extensions(&mut env);

        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);

        // Missing values render as empty instead of erroring: {{nonexistent.field}}
        // chains through undefined rather than raising, matching the templating
        // contract's "accessor expressions that fail gracefully" requirement.
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Chainable);

        Self { env: Arc::new(env) }
    }

    /// We do not register minijinja's standard filter set by hand — the engine
    /// already provides it. Only `defined`/`undefined` tests are added here, for
    /// flow authors who want to branch on whether a value was supplied.
    fn register_extensions(env: &mut Environment<'static>) {
        env.add_test("defined", |value: Value| !value.is_undefined());
        env.add_test("undefined", |value: Value| value.is_undefined());
    }

    /// Renders `template` against `data`. Empty input renders to the empty string;
    /// malformed templates return a [`TemplateError::Syntax`].
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use serde_json::json;
    /// use beemflow::dsl::Templater;
    ///
    /// let templater = Templater::new();
    /// let mut data = HashMap::new();
    /// data.insert("name".to_string(), json!("BeemFlow"));
    ///
    /// let result = templater.render("Hello, {{ name }}!", &data).unwrap();
    /// assert_eq!(result, "Hello, BeemFlow!");
    /// ```
    pub fn render(&self, template: &str, data: &HashMap<String, JsonValue>) -> Result<String> {
        if template.is_empty() {
            return Ok(String::new());
        }

        let context = self.json_to_minijinja_context(data);

        self.env
            .render_str(template, context)
            .map_err(|e| TemplateError::Syntax(e.to_string()).into())
    }

    /// Evaluates `expr` and returns its native value rather than a rendered string —
    /// used by `foreach` to get back an actual sequence instead of its `Display` form.
    ///
    /// ```
    /// use beemflow::dsl::Templater;
    /// use std::collections::HashMap;
    /// use serde_json::json;
    ///
    /// let templater = Templater::new();
    /// let mut data = HashMap::new();
    /// data.insert("items".to_string(), json!(["a", "b", "c"]));
    ///
    /// let result = templater.evaluate_expression("{{ items }}", &data).unwrap();
    /// assert!(result.is_array());
    /// ```
    pub fn evaluate_expression(
        &self,
        expr: &str,
        data: &HashMap<String, JsonValue>,
    ) -> Result<JsonValue> {
        let trimmed = expr.trim();

        if let Some(var_path) = trimmed
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
        {
            let var_path = var_path.trim();

            let is_simple_path = !var_path.contains(['|', '(', '+', '-', '*', '/']);
            if is_simple_path {
                if let Some(val) = data.get(var_path) {
                    return Ok(val.clone());
                }
                if var_path.contains('.')
                    && let Some(val) = self.lookup_nested_path(data, var_path)
                {
                    return Ok(val.clone());
                }
            }
        }

        let rendered = self.render(expr, data)?;

        if let Ok(value) = serde_json::from_str::<JsonValue>(&rendered) {
            return Ok(value);
        }

        Ok(JsonValue::String(rendered))
    }

    /// Looks up a dotted path against `data`, supporting both object-field access
    /// (`event.arr`) and numeric array-index access (`event.arr.0.val`).
    fn lookup_nested_path<'a>(
        &self,
        data: &'a HashMap<String, JsonValue>,
        path: &str,
    ) -> Option<&'a JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        let mut current = data.get(parts[0])?;

        for part in &parts[1..] {
            if let Some(obj) = current.as_object()
                && let Some(val) = obj.get(*part)
            {
                current = val;
                continue;
            }

            if let Some(arr) = current.as_array()
                && let Ok(idx) = part.parse::<usize>()
            {
                current = arr.get(idx)?;
                continue;
            }

            return None;
        }

        Some(current)
    }

    fn json_to_minijinja_context(&self, data: &HashMap<String, JsonValue>) -> Value {
        let mut obj = serde_json::Map::new();
        for (key, value) in data {
            obj.insert(key.clone(), value.clone());
        }
        Value::from_serialize(JsonValue::Object(obj))
    }
}

impl Default for Templater {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod template_test;
