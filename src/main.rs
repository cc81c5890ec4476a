use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emojiguess::{
    abuse::AbuseConfig,
    auth::AuthConfig,
    config::AppConfig,
    questions::QuestionBank,
    routes::build_router,
    state::AppState,
    store::{create_pool, DbPoolConfig, MemoryStore, PgStore, Store},
    tasks,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emojiguess=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Emoji Guess...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    let auth_config = AuthConfig::from_env();
    let abuse_config = AbuseConfig::from_env();

    let store: Arc<dyn Store> = match config.database_url {
        Some(ref url) => {
            let pool = create_pool(url, DbPoolConfig::from_env()).await?;
            Arc::new(PgStore::connect(pool).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts and history are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let questions = QuestionBank::load(&config.questions_path).await?;
    tracing::info!(count = questions.count().await, "Question bank loaded");

    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config, store, questions).with_abuse_config(abuse_config));
    state.ensure_admin(&auth_config).await?;

    tasks::spawn_session_sweeper(state.clone(), tasks::SWEEP_INTERVAL);

    let app = build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
