use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use forumctl_core::{DecayingEngagement, HotScore};
use forumctl_server::store::{migrations, postgres, MemoryPostStore, PgPostStore, PostStore};
use forumctl_server::telemetry::init_tracing;
use forumctl_server::{run_server, AppState, Cli, ForumEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let hot: Arc<dyn HotScore> = Arc::new(DecayingEngagement::default());
    let store: Arc<dyn PostStore> = match cli.database_url.as_deref() {
        Some(url) => {
            let pool = postgres::create_pool(url, cli.max_connections)
                .await
                .context("Failed to create database pool")?;
            migrations::run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("using PostgreSQL post store");
            Arc::new(PgPostStore::new(pool, hot))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory post store (data is lost on exit)");
            Arc::new(MemoryPostStore::new(hot))
        }
    };

    let engine_config = cli.engine_config();
    let server_config = cli.server_config();
    tracing::info!(
        delete_policy = %engine_config.delete_policy,
        render_depth = engine_config.render_depth,
        "starting forumctl server on {}",
        server_config.bind_addr
    );

    let state = AppState::new(ForumEngine::new(store, engine_config), &server_config);
    run_server(state, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
