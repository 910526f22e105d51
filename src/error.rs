//! Error types for the workflow engine.
//!
//! This module provides a comprehensive error hierarchy using thiserror. All errors can
//! be converted to `BeemFlowError` for unified error handling, and every kind named by
//! the engine's error taxonomy has its own variant so callers can match on it.

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum BeemFlowError {
    /// The run is suspended at an `await_event` step. Not a failure: carries the
    /// awaiting step's rendered id.
    #[error("await pause at step: {0}")]
    AwaitPause(String),

    /// An `await_event` step's `match.token` rendered to an empty string.
    #[error("await_event step '{0}' rendered an empty token")]
    AwaitEventMissingToken(String),

    /// Template rendering or expression evaluation failed.
    #[error("template error in step '{step_id}': {source}")]
    Template {
        step_id: String,
        #[source]
        source: TemplateError,
    },

    /// A `foreach` expression evaluated to a non-sequence value.
    #[error("foreach in step '{step_id}' did not evaluate to a list")]
    ForeachNotList { step_id: String },

    /// No adapter matched `use` by exact name or prefix rule.
    #[error("no adapter found for tool '{0}'")]
    AdapterNotFound(String),

    /// A tool-call step's adapter returned an error.
    #[error("step '{step_id}' failed: {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: Box<BeemFlowError>,
    },

    /// Top-level execution failed and `flow.catch` ran best-effort against a fresh
    /// context. Carries the catch steps' successful outputs alongside the original
    /// error, matching the engine's "outputs plus error" result for a caught failure.
    #[error("flow failed: {source}")]
    FlowFailed {
        outputs: serde_json::Map<String, serde_json::Value>,
        #[source]
        source: Box<BeemFlowError>,
    },

    /// Propagated from a storage operation.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Propagated from the adapter layer (network, protocol, or tool misuse).
    #[error("adapter error: {0}")]
    Adapter(String),

    /// Propagated from the HTTP adapter's transport.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Template-specific errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(String),

    #[error("variable not found: {0}")]
    VariableNotFound(String),

    #[error("template render error: {0}")]
    Render(#[from] minijinja::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found: {entity} '{id}'")]
    NotFound { entity: String, id: String },

    #[error("storage connection error: {0}")]
    Connection(String),

    #[error("UUID parse error: {0}")]
    UuidParse(#[from] uuid::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Network-specific errors raised by the HTTP adapter.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Converts a bare template failure with no step context yet attached. Callers that
/// know the step id re-wrap via [`BeemFlowError::template`] to fill it in.
impl From<TemplateError> for BeemFlowError {
    fn from(source: TemplateError) -> Self {
        BeemFlowError::Template {
            step_id: String::new(),
            source,
        }
    }
}

/// Convenient result type for engine operations.
pub type Result<T> = std::result::Result<T, BeemFlowError>;

impl BeemFlowError {
    #[inline]
    pub fn adapter<S: Into<String>>(msg: S) -> Self {
        BeemFlowError::Adapter(msg.into())
    }

    #[inline]
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        BeemFlowError::Storage(StorageError::Connection(msg.into()))
    }

    #[inline]
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        BeemFlowError::Storage(StorageError::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    #[inline]
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        BeemFlowError::Internal(msg.into())
    }

    #[inline]
    pub fn step_failed(step_id: impl Into<String>, source: BeemFlowError) -> Self {
        BeemFlowError::StepFailed {
            step_id: step_id.into(),
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn template(step_id: impl Into<String>, source: TemplateError) -> Self {
        BeemFlowError::Template {
            step_id: step_id.into(),
            source,
        }
    }

    #[inline]
    pub fn flow_failed(
        outputs: serde_json::Map<String, serde_json::Value>,
        source: BeemFlowError,
    ) -> Self {
        BeemFlowError::FlowFailed {
            outputs,
            source: Box::new(source),
        }
    }

    /// Returns the awaiting step id if this error is an [`BeemFlowError::AwaitPause`].
    pub fn await_pause_step_id(&self) -> Option<&str> {
        match self {
            BeemFlowError::AwaitPause(id) => Some(id),
            _ => None,
        }
    }
}
