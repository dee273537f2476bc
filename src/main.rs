use std::net::SocketAddr;

use agora::config::{Cli, Config};
use agora::{build_router, build_state, db, maintenance};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Tables are created by the installation wizard, not at startup
    let pool = db::create_pool(&config.db_path())?;
    match maintenance::recorded_version(&*pool.get()?)? {
        Some(version) => tracing::info!("Forum version {}", version),
        None => tracing::warn!("Forum is not installed yet, open /install to set it up"),
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = build_router(build_state(pool, config));

    // Start server
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
