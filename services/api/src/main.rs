use anyhow::Context;
use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
    routing::get,
};
use interview_api::config::Config;
use interview_api::socket::{AppState, handle_socket};
use interview_service::prompt_loader::load_prompt_set;
use interview_service::providers::build_interviewer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Handles WebSocket upgrade requests.
///
/// Every accepted connection gets a fresh interview session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.interview.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let prompts = load_prompt_set(config.interview.prompts_dir.as_deref())
        .context("Failed to load LLM prompts")?;
    let state = AppState {
        interviewer: build_interviewer(&config.interview, prompts, config.interview.question_count),
        provider_timeout: config.interview.provider_timeout,
    };

    // Configure a permissive CORS policy to allow connections from any origin.
    // This is necessary for a separate frontend to connect to the WebSocket API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    info!("Starting WebSocket server, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(listener, app).await?;

    Ok(())
}
