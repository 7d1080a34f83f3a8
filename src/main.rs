use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sportsin::auth::password;
use sportsin::config::{Cli, Config};
use sportsin::db;
use sportsin::routes;
use sportsin::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    let db_path = config
        .db_path()
        .context("database path was not resolved")?
        .clone();
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    tracing::info!("{} registered user(s)", db::users::count(&pool)?);

    if let Some(admin) = &config.admin {
        let hash = password::hash_password(&admin.password, config.auth.bcrypt_cost)?;
        let id = db::users::ensure_admin(&pool, &admin.full_name, &admin.email, &hash)?;
        tracing::info!(user_id = id, "Admin account ready: {}", admin.email);
    }

    let state = AppState::new(pool, config.clone());
    let app = routes::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
