use contrarian_ai::OpenAiCompatibleProvider;
use contrarian_conversation::InMemoryConversationStore;
use contrarian_debate::DebateOrchestrator;
use contrarian_server::{
    config::{Environment, ServerConfig},
    db::PgConversationStore,
    routes::{self, AppState, SharedProvider, SharedStore},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.environment.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let violations = config.validate();
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!(%violation, "invalid configuration");
        }
        std::process::exit(1);
    }
    tracing::info!(environment = %config.environment, "Loaded configuration");

    let store: SharedStore = match config.database_url.as_deref() {
        Some(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("failed to connect to database");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .expect("failed to run migrations");

            Arc::new(PgConversationStore::with_topic_deriver(
                db_pool,
                config.topic_deriver(),
            ))
        }
        None => {
            if config.environment != Environment::Testing {
                tracing::warn!("DATABASE_URL not set, conversations are kept in memory");
            }
            Arc::new(InMemoryConversationStore::with_topic_deriver(
                config.topic_deriver(),
            ))
        }
    };

    let provider: SharedProvider = Arc::new(
        OpenAiCompatibleProvider::new(config.openai_config())
            .expect("failed to build completion provider"),
    );

    let orchestrator = DebateOrchestrator::new(store, provider)
        .with_stance(config.stance())
        .with_retry_policy(config.retry_policy());

    let mut app = routes::router(AppState::new(orchestrator), config.request_timeout());
    if let Some(static_dir) = &config.static_dir {
        tracing::info!(%static_dir, "Serving static files");
        app = routes::with_static_dir(app, static_dir);
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
