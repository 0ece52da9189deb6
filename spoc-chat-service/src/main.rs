use spoc_chat_service::{AppState, ServiceConfig, build_router, spawn_session_sweeper};
use spoc_flow::{DialogEngine, DialogSchema, InMemorySessionStore, JobRunner, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "spoc_chat_service=debug,spoc_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env()?;
    info!(
        interpreter = %config.job.interpreter,
        script = %config.job.script.display(),
        timeout_secs = ?config.job.timeout.map(|t| t.as_secs()),
        "Loaded configuration"
    );

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let engine = DialogEngine::new(
        DialogSchema::spoc_default(),
        store.clone(),
        JobRunner::with_process(config.job.clone()),
    );

    match config.session_ttl {
        Some(ttl) => {
            spawn_session_sweeper(store, ttl, config.sweep_interval);
        }
        None => info!("Session expiry disabled"),
    }

    let app = build_router(AppState { engine });

    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    info!("SPoC chatbot listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
