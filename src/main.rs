use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use litsieve::api::{start_server, ApiContext};
use litsieve::config::AppConfig;
use litsieve::db::sqlite::open_database;
use litsieve::llm::HttpCompletionClient;
use litsieve::pipeline::{CycleConfig, ReaperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Run migrations up front so the first invocation doesn't pay for them.
    let conn = open_database(&config.db_path)?;
    drop(conn);
    tracing::info!(db_path = %config.db_path.display(), "database ready");

    let llm = Arc::new(HttpCompletionClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        config.llm_timeout_secs,
    ));

    let ctx = ApiContext::new(
        config.db_path.clone(),
        llm,
        CycleConfig {
            reaper: ReaperConfig {
                stuck_timeout_minutes: config.stuck_timeout_minutes,
            },
        },
    );

    let mut server = start_server(ctx, config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown();

    Ok(())
}
