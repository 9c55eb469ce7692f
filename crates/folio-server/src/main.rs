use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use folio_api::config::AppConfig;
use folio_api::credentials::PasswordHashing;
use folio_api::storage::LocalBlobStore;
use folio_api::tokens::TokenService;
use folio_api::{AppState, AppStateInner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_server=debug,folio_api=debug,folio_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config; refuses to start without real signing secrets
    let config = AppConfig::from_env()?;
    info!(carrier = ?config.carrier, allowed_types = ?config.uploads.allowed_types, "Loaded configuration");

    let db = folio_db::Database::open(&config.db_path)?;
    let blobs = LocalBlobStore::new(config.upload_dir.clone()).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&config.tokens),
        passwords: PasswordHashing::new(&config.hashing)?,
        blobs: Arc::new(blobs),
        carrier: config.carrier,
        cookie_secure: config.cookie_secure,
        uploads: config.uploads.clone(),
    });

    let app = folio_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Folio server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
