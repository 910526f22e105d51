//! beemflow — a workflow execution engine.
//!
//! Interprets declarative flow specifications (directed graphs of steps) and runs
//! them with concurrency, iteration, pausing on external events, durable resumption,
//! templated data flow between steps, and pluggable tool adapters.
//!
//! Flow-file parsing, CLI/HTTP/MCP transports, and concrete production adapters and
//! storage backends are not part of this crate — it exposes the engine as a library
//! over whatever `Flow` a caller constructs, with an in-memory storage implementation
//! and the minimal `core`/`http`/`mcp` adapters the engine's contract names.
//!
//! # Example
//!
//! ```rust,no_run
//! use beemflow::Engine;
//! use serde_json::{json, Map};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::for_testing();
//!     let flow = serde_json::from_value(json!({
//!         "name": "hello",
//!         "steps": [{"id": "s1", "use": "core.echo", "with": {"text": "hi"}}]
//!     }))?;
//!     let event: Map<String, serde_json::Value> = Map::new();
//!     let result = engine.execute(&flow, event).await?;
//!     println!("{:?}", result.outputs);
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod error;
pub mod model;

pub mod adapter;
pub mod dsl;
pub mod engine;
pub mod event;
pub mod storage;

#[cfg(test)]
mod model_test;

pub use engine::{Engine, ExecutionResult};
pub use error::{BeemFlowError, Result};
pub use model::{Flow, Run, Step};

/// Initialize logging for applications embedding this crate.
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "beemflow=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
