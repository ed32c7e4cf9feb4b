//! Configuration - command line flags with environment fallbacks
//!
//! Every flag can also be set through its environment variable, and a
//! `.env` file in the working directory is loaded first by the binary.
//!
//! | flag                 | env                         | default          |
//! |----------------------|-----------------------------|------------------|
//! | `--bind`             | `FORUM_BIND`                | `127.0.0.1:3030` |
//! | `--database-url`     | `DATABASE_URL`              | in-memory store  |
//! | `--max-connections`  | `FORUM_DB_MAX_CONNECTIONS`  | 5                |
//! | `--store-timeout-ms` | `FORUM_STORE_TIMEOUT_MS`    | 5000             |
//! | `--max-post-length`  | `FORUM_MAX_POST_LENGTH`     | 10000            |
//! | `--render-depth`     | `FORUM_RENDER_DEPTH`        | 5                |
//! | `--delete-policy`    | `FORUM_DELETE_POLICY`       | `cascade`        |
//! | `--rate-limit`       | `FORUM_RATE_LIMIT`          | 120              |
//! | `--rate-window-secs` | `FORUM_RATE_WINDOW_SECS`    | 60               |
//! | `--cors-permissive`  | `FORUM_CORS_PERMISSIVE`     | false            |

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use forumctl_core::models::{DEFAULT_MAX_CONTENT_LEN, MAX_LIMIT};
use forumctl_core::DEFAULT_RENDER_DEPTH;

use crate::store::DeletePolicy;

/// Default per-call store timeout
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Engine-facing settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum post and thread body length, in characters
    pub max_post_length: usize,
    /// Levels rendered before a continue-thread marker
    pub render_depth: u32,
    pub delete_policy: DeletePolicy,
    /// Upper bound for any caller-supplied limit
    pub max_page_size: u32,
    /// Caller-enforced deadline on every store call
    pub store_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_post_length: DEFAULT_MAX_CONTENT_LEN,
            render_depth: DEFAULT_RENDER_DEPTH,
            delete_policy: DeletePolicy::Cascade,
            max_page_size: MAX_LIMIT,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

/// HTTP-facing settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    /// Allow any origin (default: localhost only)
    pub cors_permissive: bool,

    /// Requests allowed per client per window
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
            rate_limit: 120,
            rate_window: Duration::from_secs(60),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "forumctl-server",
    author,
    version,
    about = "Threaded discussion engine over HTTP"
)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "FORUM_BIND", default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    /// PostgreSQL connection string; omit to run on the in-memory store
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "FORUM_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Deadline for each store call, in milliseconds
    #[arg(long, env = "FORUM_STORE_TIMEOUT_MS", default_value_t = DEFAULT_STORE_TIMEOUT_MS)]
    pub store_timeout_ms: u64,

    /// Maximum post length in characters
    #[arg(long, env = "FORUM_MAX_POST_LENGTH", default_value_t = DEFAULT_MAX_CONTENT_LEN)]
    pub max_post_length: usize,

    /// Levels rendered in tree views
    #[arg(long, env = "FORUM_RENDER_DEPTH", default_value_t = DEFAULT_RENDER_DEPTH)]
    pub render_depth: u32,

    /// What deleting a post with replies does: cascade or reject
    #[arg(long, env = "FORUM_DELETE_POLICY", default_value = "cascade")]
    pub delete_policy: DeletePolicy,

    /// Requests per client per window
    #[arg(long, env = "FORUM_RATE_LIMIT", default_value_t = 120)]
    pub rate_limit: u32,

    #[arg(long, env = "FORUM_RATE_WINDOW_SECS", default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Allow any CORS origin
    #[arg(long, env = "FORUM_CORS_PERMISSIVE")]
    pub cors_permissive: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_post_length: self.max_post_length,
            render_depth: self.render_depth.max(1),
            delete_policy: self.delete_policy,
            max_page_size: MAX_LIMIT,
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind,
            cors_permissive: self.cors_permissive,
            rate_limit: self.rate_limit,
            rate_window: Duration::from_secs(self.rate_window_secs.max(1)),
        }
    }
}
