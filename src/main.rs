use rusty_library_backend::{
    adapters::postgres::{PostgresBookStore, PostgresPatronStore, PostgresTransactionStore},
    api::{handlers::AppState, router::create_router},
    application::circulation::ServiceDependencies,
    config::Config,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rusty_library_backend=debug,tower_http=debug,axum=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from the environment
    let config = Config::from_env().expect("Failed to load configuration");

    tracing::info!("Database URL: {}", config.database_url);

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Apply migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Initialize adapters
    let book_store = Arc::new(PostgresBookStore::new(pool.clone()));
    let patron_store = Arc::new(PostgresPatronStore::new(pool.clone()));
    let transaction_store = Arc::new(PostgresTransactionStore::new(pool.clone()));

    // Create service dependencies
    let deps = ServiceDependencies {
        book_store,
        patron_store,
        transaction_store,
    };

    // Create application state
    let app_state = Arc::new(AppState {
        deps,
        cost: config.cost,
    });

    // Create router
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
