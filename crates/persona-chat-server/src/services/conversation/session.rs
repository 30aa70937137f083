use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use super::store::ConversationLog;
use crate::config::PersonaConfig;
use crate::models::chat::{SessionConfiguration, SessionId, SessionView, UpdateConfigRequest};
use crate::utils::error::ApiError;

/// State owned by one interactive session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub log: ConversationLog,
    pub config: SessionConfiguration,
    pub created_at: DateTime<Utc>,
    /// Last user action (for idle expiration)
    pub last_activity: Instant,
}

impl Session {
    pub fn new(id: SessionId, system_instruction: &str, config: SessionConfiguration) -> Self {
        Self {
            id,
            log: ConversationLog::new(system_instruction),
            config,
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() > idle_timeout
    }

    /// Apply a partial configuration change. Nothing is modified unless every
    /// supplied field is valid for the persona.
    pub fn update_config(
        &mut self,
        update: UpdateConfigRequest,
        persona: &PersonaConfig,
    ) -> Result<(), ApiError> {
        let mut next = self.config.clone();

        if let Some(temperature) = update.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ApiError::BadRequest(format!(
                    "temperature must be within [0, 1], got {}",
                    temperature
                )));
            }
            next.temperature = temperature;
        }

        if let Some(model) = update.model {
            if !persona.models.contains(&model) {
                return Err(ApiError::BadRequest(format!("model '{}' is not offered", model)));
            }
            next.model = model;
        }

        if let Some(language) = update.language {
            if !persona.languages.contains(&language) {
                return Err(ApiError::BadRequest(format!(
                    "language '{}' is not offered",
                    language
                )));
            }
            next.language = language;
        }

        self.config = next;
        self.touch();
        Ok(())
    }

    pub fn view(&self, persona: &PersonaConfig) -> SessionView {
        SessionView {
            session_id: self.id,
            created_at: self.created_at,
            config: self.config.clone(),
            turns: self.log.render_view(),
            welcome_message: if self.log.is_empty() {
                persona.welcome_message.clone()
            } else {
                None
            },
        }
    }
}
