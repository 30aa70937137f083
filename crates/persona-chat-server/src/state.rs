use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PersonaConfig, Settings};
use crate::models::chat::SessionConfiguration;
use crate::services::conversation::{ResponseStreamer, SessionRegistry};
use crate::services::GenerationProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub persona: Arc<PersonaConfig>,
    pub sessions: SessionRegistry,
    pub streamer: Arc<ResponseStreamer>,
}

impl AppState {
    pub fn new(settings: Settings, provider: Arc<dyn GenerationProvider>) -> Result<Self> {
        let persona = Arc::new(settings.active_persona()?.clone());
        let sessions =
            SessionRegistry::new(Duration::from_secs(settings.session.idle_timeout_seconds));
        let streamer = Arc::new(ResponseStreamer::new(
            provider,
            persona.clone(),
            settings.generation.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            persona,
            sessions,
            streamer,
        })
    }

    /// Configuration a new session starts with.
    pub fn default_session_config(&self) -> SessionConfiguration {
        SessionConfiguration {
            temperature: self.settings.generation.default_temperature,
            model: self.settings.generation.default_model.clone(),
            language: self.settings.generation.default_language,
        }
    }
}
