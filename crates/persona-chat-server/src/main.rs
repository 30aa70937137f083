use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use persona_chat_server::config::Settings;
use persona_chat_server::router::build_router;
use persona_chat_server::services::GeminiService;
use persona_chat_server::state::AppState;
use persona_chat_server::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logger()?;

    info!("🚀 Starting persona chat server...");

    // Load configuration
    let settings = Settings::load()?;
    let persona = settings.active_persona()?;
    info!(
        "✅ Configuration loaded (persona: {}, default model: {})",
        persona.assistant_name, settings.generation.default_model
    );

    let gemini = Arc::new(GeminiService::new(settings.gemini.clone())?);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    let cleanup_interval = Duration::from_secs(settings.session.cleanup_interval_seconds);

    let state = Arc::new(AppState::new(settings, gemini)?);

    // Sweep idle sessions in the background
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            ticker.tick().await;
            sessions.cleanup_expired();
        }
    });
    info!("✅ Session cleanup task started (every {:?})", cleanup_interval);

    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
