//! forumctl-server: the threaded discussion engine behind HTTP
//!
//! Wires the pure domain from `forumctl-core` to a durable post store
//! (PostgreSQL or in-memory), the [`engine::ForumEngine`] operations and
//! an Axum router.

pub mod config;
pub mod engine;
pub mod http;
pub mod rate_limit;
pub mod store;
pub mod telemetry;

pub use config::{Cli, EngineConfig, ServerConfig};
pub use engine::ForumEngine;
pub use http::{build_router, run_server, AppState};
