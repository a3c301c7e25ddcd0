use std::sync::Arc;

use tracing::info;

use syntra_db::Database;
use syntra_server::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syntra=debug,syntra_server=debug,syntra_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = Arc::new(Database::open(&config.db_path)?);
    let gateway = syntra_server::gateway(&db);
    let app = syntra_server::app(db, gateway.clone(), config.jwt_secret.clone());

    let addr = config.addr()?;
    info!("Syntra server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    gateway.shutdown().await;
    Ok(())
}
