use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_server::http::{AppState, SessionRegistry, build_router};
use shared::SessionServices;
use shared::config::{ChatServerConfig, load_dotenv};
use shared::llm::GroqClientFactory;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "chat_server=info,shared=info,axum=info".to_string()),
        )
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .init();

    let config = match ChatServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load chat server config");
            std::process::exit(1);
        }
    };

    let client_factory = match GroqClientFactory::new(config.groq.clone()) {
        Ok(factory) => factory,
        Err(err) => {
            error!(error = %err, "failed to initialize groq http client");
            std::process::exit(1);
        }
    };

    let credential_sources: Vec<String> = config
        .credentials
        .sources()
        .iter()
        .map(|source| source.label())
        .collect();
    info!(
        model = %config.groq.model,
        credential_sources = ?credential_sources,
        reference_path = %config.reference.path().display(),
        session_idle_ttl_seconds = config.session_idle_ttl_seconds,
        "chat server configured"
    );

    let sessions = SessionRegistry::new(Duration::from_secs(config.session_idle_ttl_seconds));
    let _session_pruner =
        sessions.spawn_pruner(Duration::from_secs(config.session_prune_interval_seconds));

    let app = build_router(AppState {
        sessions,
        services: SessionServices {
            credentials: config.credentials,
            reference: config.reference,
            client_factory: Arc::new(client_factory),
        },
    });

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, bind_addr = %config.bind_addr, "invalid bind address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, %addr, "failed to bind chat server listener");
            std::process::exit(1);
        }
    };

    info!(
        addr = %listener.local_addr().unwrap_or(addr),
        "chat server listening"
    );
    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "chat server stopped");
        std::process::exit(1);
    }
}
