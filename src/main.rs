use std::sync::Arc;

use kerala_trips::config::{AppConfig, IdentityConfig};
use kerala_trips::db::{init_pool, run_migrations};
use kerala_trips::error::AppError;
use kerala_trips::routes::create_router;
use kerala_trips::services::{
    identity::{GoTrueIdentity, IdentityProvider, StaticIdentity},
    storage::SqliteKvStore,
};
use kerala_trips::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = run_migrations(&db).await {
        error!("migration failed: {err:?}");
        return Err(err);
    }

    let identity: Arc<dyn IdentityProvider> = match &config.identity {
        IdentityConfig::Remote { url, service_key } => {
            info!("verifying tokens against {url}");
            Arc::new(GoTrueIdentity::new(url.clone(), service_key.clone()))
        }
        IdentityConfig::Static { tokens } => {
            warn!(
                "AUTH_URL not set, using {} static token(s) for authentication",
                tokens.len()
            );
            Arc::new(StaticIdentity::new(tokens))
        }
    };

    let state = AppState::new(Arc::new(SqliteKvStore::new(db)), identity);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,kerala_trips=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
