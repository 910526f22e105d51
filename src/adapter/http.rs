//! Generic HTTP adapter.
//!
//! Builds a request from `inputs` (`url`, `method`, `headers`, `body`) or, when
//! constructed with a [`ToolManifest`], from the manifest's `endpoint`/`headers`
//! with `{param}` path-template substitution. Manifest-declared `$env` defaults are
//! filled in by the executor before `execute` is called — this adapter only sees
//! already-resolved inputs.

use super::*;
use crate::constants::*;
use reqwest::{Client, Method};
use std::str::FromStr;

type HttpRequestComponents = (String, String, HashMap<String, String>, Option<Value>);

pub struct HttpAdapter {
    adapter_id: String,
    tool_manifest: Option<ToolManifest>,
    client: Client,
}

impl HttpAdapter {
    pub fn new(adapter_id: String, tool_manifest: Option<ToolManifest>) -> Self {
        Self {
            adapter_id,
            tool_manifest,
            client: Client::new(),
        }
    }

    async fn execute_request(
        &self,
        inputs: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let (url, method, headers, body) = match &self.tool_manifest {
            Some(manifest) if manifest.endpoint.is_some() => {
                self.build_from_manifest(manifest, &inputs)?
            }
            _ => self.build_from_inputs(&inputs)?,
        };

        let method_str = method.clone();
        let method = Method::from_str(&method)
            .map_err(|e| crate::BeemFlowError::adapter(format!("invalid HTTP method: {e}")))?;

        let mut request = self.client.request(method, &url);
        for (k, v) in &headers {
            Self::validate_header_value(k, v)?;
            request = request.header(k, v);
        }

        if let Some(body_val) = body {
            if body_val.is_object() || body_val.is_array() {
                request = request.json(&body_val);
            } else if let Some(s) = body_val.as_str() {
                request = request.body(s.to_string());
            }
        }

        let response = request.send().await.map_err(|e| {
            crate::BeemFlowError::Network(crate::error::NetworkError::Http(e.to_string()))
        })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| {
            crate::BeemFlowError::Network(crate::error::NetworkError::Http(e.to_string()))
        })?;

        if !status.is_success() {
            return Err(crate::BeemFlowError::Network(
                crate::error::NetworkError::Http(format!(
                    "HTTP {method_str} {url}: status {}: {body_text}",
                    status.as_u16()
                )),
            ));
        }

        if let Ok(json_value) = serde_json::from_str::<Value>(&body_text) {
            if let Some(obj) = json_value.as_object() {
                return Ok(obj.clone().into_iter().collect());
            }
            let mut result = HashMap::new();
            result.insert("body".to_string(), json_value);
            return Ok(result);
        }

        let mut result = HashMap::new();
        result.insert("body".to_string(), Value::String(body_text));
        Ok(result)
    }

    fn build_from_manifest(
        &self,
        manifest: &ToolManifest,
        inputs: &HashMap<String, Value>,
    ) -> Result<HttpRequestComponents> {
        let mut url = manifest
            .endpoint
            .as_ref()
            .ok_or_else(|| crate::BeemFlowError::adapter("manifest missing endpoint"))?
            .clone();

        let mut path_params = std::collections::HashSet::new();
        for (key, value) in inputs {
            let placeholder = format!("{{{key}}}");
            if url.contains(&placeholder) {
                path_params.insert(key.clone());
                let value_str = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => serde_json::to_string(value)?,
                };
                url = url.replace(&placeholder, &value_str);
            }
        }

        let headers = manifest.headers.clone().unwrap_or_default();
        let method = self.extract_method(inputs);

        let body = if method.to_uppercase() != HTTP_METHOD_GET {
            let body_inputs: HashMap<String, Value> = inputs
                .iter()
                .filter(|(k, _)| !path_params.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (!body_inputs.is_empty()).then(|| serde_json::to_value(body_inputs)).transpose()?
        } else {
            None
        };

        Ok((url, method, headers, body))
    }

    fn build_from_inputs(&self, inputs: &HashMap<String, Value>) -> Result<HttpRequestComponents> {
        let url = inputs
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::BeemFlowError::adapter("missing url for HTTP request"))?
            .to_string();

        let method = self.extract_method(inputs);
        let headers = self.extract_headers(inputs);
        let body = inputs.get("body").cloned();

        Ok((url, method, headers, body))
    }

    pub(crate) fn extract_headers(&self, inputs: &HashMap<String, Value>) -> HashMap<String, String> {
        inputs
            .get("headers")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn extract_method(&self, inputs: &HashMap<String, Value>) -> String {
        inputs
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or(HTTP_METHOD_GET)
            .to_string()
    }

    fn validate_header_value(name: &str, value: &str) -> Result<()> {
        if value.chars().any(|c| c.is_control() && c != '\t') {
            return Err(crate::BeemFlowError::adapter(format!(
                "header '{name}' contains invalid control characters"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn id(&self) -> &str {
        &self.adapter_id
    }

    async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        _ctx: &super::ExecutionContext,
    ) -> Result<HashMap<String, Value>> {
        self.execute_request(inputs).await
    }

    fn manifest(&self) -> Option<ToolManifest> {
        self.tool_manifest.clone()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
