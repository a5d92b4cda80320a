use mtg_stats::{
    auth::AuthConfig,
    build_router,
    db::{connect_postgres, Repositories},
    files::LocalFileStore,
    user::service::UserService,
    AppConfig, AppState, SystemClock,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mtg_stats=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting card-game statistics server");

    let config = AppConfig::from_env();

    let repositories = match &config.database_url {
        Some(url) => match connect_postgres(url).await {
            Ok(pool) => Repositories::postgres(pool),
            Err(e) => {
                error!(error = %e, "Cannot start without the configured database");
                std::process::exit(1);
            }
        },
        None => {
            warn!("DATABASE_URL not set, running on in-memory storage");
            Repositories::in_memory()
        }
    };

    let auth = AuthConfig::from_config(&config);
    if !auth.is_enabled() {
        warn!("Neither API_TOKEN nor JWT_SECRET set, authentication is disabled");
    }

    let app_state = AppState::new(
        repositories,
        Arc::new(LocalFileStore::new(config.upload_dir.clone())),
        Arc::new(SystemClock::new()),
        auth,
    );

    if let Some((name, password)) = config.bootstrap_admin() {
        let users = UserService::new(
            Arc::clone(&app_state.user_repository),
            Arc::clone(&app_state.clock),
        );
        if let Err(e) = users.ensure_admin(name, password).await {
            error!(error = %e, "Failed to seed the administrator");
            std::process::exit(1);
        }
    }

    let app = build_router(app_state, &config.upload_dir);

    let address = config.listen_address();
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, address = %address, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    info!("Server running on http://{}", address);
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server stopped with an error");
        std::process::exit(1);
    }
}
