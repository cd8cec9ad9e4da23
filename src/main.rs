use readiq_backend::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    mailer,
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalDiskStore, ReadingStore, StorageState},
    token::TokenService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Boot order: configuration, logging, token service, database (plus
/// migrations), upload directory, mailer, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "readiq_backend=debug,tower_http=info".into());

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

    let tokens = TokenService::from_config(&config);
    if !tokens.expires() {
        tracing::warn!(
            "TOKEN_TTL_SECS is not set: access and verification tokens never expire"
        );
    }

    // 3. Database.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Reading uploads on local disk.
    let store = LocalDiskStore::new(config.upload_dir.clone());
    store
        .ensure_dir()
        .await
        .expect("FATAL: UPLOAD_DIR could not be created.");
    let storage = Arc::new(store) as StorageState;

    // 5. Outbound mail.
    let mailer = mailer::from_config(&config);

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        mailer,
        tokens,
        config,
    };

    // 6. Router and server.
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Could not bind BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
