//! Reserved names and keys shared across the engine, adapters, and templating layer.

/// Adapter registered to handle `core.*` tool calls.
pub const ADAPTER_CORE: &str = "core";
/// Adapter registered to handle `mcp://...` tool calls.
pub const ADAPTER_MCP: &str = "mcp";
/// Adapter registered to handle generic HTTP tool calls.
pub const ADAPTER_HTTP: &str = "http";

/// Prefix identifying a tool routed through the `mcp` adapter.
pub const ADAPTER_PREFIX_MCP: &str = "mcp://";
/// Prefix identifying a tool routed through the `core` adapter.
pub const ADAPTER_PREFIX_CORE: &str = "core.";

/// Reserved input key carrying the original tool name into a generic adapter.
///
/// Not usable by flow authors; stripped before most adapters see their inputs.
pub const PARAM_SPECIAL_USE: &str = "__use";

pub const CORE_ECHO: &str = "core.echo";
pub const CORE_LOG: &str = "core.log";

/// Event bus topic prefix for resume signals: `resume:<token>`.
pub const EVENT_TOPIC_RESUME_PREFIX: &str = "resume:";

/// Key under `event` carrying a caller-supplied secrets mapping.
pub const SECRETS_EVENT_KEY: &str = "secrets";
/// Prefix identifying an `event` key that should be folded into `secrets`.
pub const ENV_VAR_PREFIX: &str = "$env";

/// Template context field names (see the templating layer's context-flattening rule).
pub const TEMPLATE_FIELD_EVENT: &str = "event";
pub const TEMPLATE_FIELD_VARS: &str = "vars";
pub const TEMPLATE_FIELD_OUTPUTS: &str = "outputs";
pub const TEMPLATE_FIELD_SECRETS: &str = "secrets";
pub const TEMPLATE_FIELD_STEPS: &str = "steps";

/// Manifest parameter-schema keys used for default auto-fill.
pub const SCHEMA_KEY_PROPERTIES: &str = "properties";
pub const SCHEMA_KEY_DEFAULT: &str = "default";
pub const SCHEMA_KEY_ENV: &str = "$env";

/// Default HTTP method for generic requests when none is given.
pub const HTTP_METHOD_GET: &str = "GET";
