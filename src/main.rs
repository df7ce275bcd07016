use rbac_admin::{
    AppState, PostgresRepository,
    config::{AppConfig, Env},
    create_router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The application entry point: loads configuration, initializes the tracing
/// subscriber, connects to Postgres and applies the migrations, builds the
/// shared state, and serves the router.
///
/// Startup is fail-fast: a missing production secret, an unreachable database,
/// a failed migration or an unbindable address aborts the process before it
/// accepts traffic.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing production secrets)
    // A `.env` file is optional; real environment variables take precedence.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production
    // `RUST_LOG` overrides the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rbac_admin=debug,tower_http=info,axum=info,sqlx=warn".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    // 3a. Connection pool sized by DB_MAX_CONNECTIONS.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // 3b. Schema, default menus and the revoked-token table.
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool));

    // 4. State
    // Services are wired once here and cloned into every request.
    let bind_addr = config.bind_addr.clone();
    let bootstrap_password = config.bootstrap_admin_password.clone();
    let app_state = AppState::new(config, repo);

    // 4a. First-run admin account, when ADMIN_BOOTSTRAP_PASSWORD is set.
    if let Some(password) = bootstrap_password {
        match app_state.admins.ensure_bootstrap_admin(&password).await {
            Ok(Some(admin)) => tracing::info!(admin_id = admin.id, "bootstrap admin created"),
            Ok(None) => tracing::debug!("bootstrap admin already present"),
            Err(e) => tracing::error!(error = %e, "failed to create bootstrap admin"),
        }
    }

    if app_state.config.auth_dev_bypass {
        tracing::warn!("AUTH_DEV_BYPASS is on: x-admin-id is accepted in place of a token");
    }

    // 5. Server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    // Peer addresses feed the audit log and the login ip.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("FATAL: HTTP server terminated unexpectedly.");
}
