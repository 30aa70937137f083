use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::chat::ResponseLanguage;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub generation: GenerationConfig,
    pub session: SessionLifecycleConfig,
    pub persona: PersonaSelection,
    pub personas: HashMap<String, PersonaConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    /// Empty when unset; every generation call then fails at setup.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

/// Sampling defaults and the fixed parameters users cannot change.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    pub default_model: String,
    pub default_temperature: f32,
    pub default_language: ResponseLanguage,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_top_p() -> f32 {
    0.95
}

fn default_top_k() -> u32 {
    40
}

fn default_max_output_tokens() -> u32 {
    1024
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionLifecycleConfig {
    pub idle_timeout_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersonaSelection {
    pub active: String,
}

/// Branding, copy and behavioral instruction of one deployment variant.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersonaConfig {
    pub assistant_name: String,
    pub title: String,
    pub icon: String,
    pub about: String,
    #[serde(default)]
    pub disclaimers: Vec<String>,
    pub input_placeholder: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    pub thinking_message: String,
    pub fallback_message: String,
    pub error_prefix: String,
    pub footer: String,
    pub user_display_name: String,
    pub system_prompt: String,
    pub models: Vec<String>,
    pub languages: Vec<ResponseLanguage>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with(environment())
    }

    fn load_with(environment: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(environment)
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        // Same variable name the hosted SDK reads.
        if settings.gemini.api_key.is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                settings.gemini.api_key = key;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let persona = self.active_persona()?;

        if !(0.0..=1.0).contains(&self.generation.default_temperature) {
            anyhow::bail!(
                "generation.default_temperature must be within [0, 1], got {}",
                self.generation.default_temperature
            );
        }

        if !persona.models.contains(&self.generation.default_model) {
            anyhow::bail!(
                "Default model '{}' is not offered by persona '{}'",
                self.generation.default_model,
                self.persona.active
            );
        }

        if !persona.languages.contains(&self.generation.default_language) {
            anyhow::bail!(
                "Default language '{}' is not offered by persona '{}'",
                self.generation.default_language,
                self.persona.active
            );
        }

        if self.session.cleanup_interval_seconds == 0 {
            anyhow::bail!("session.cleanup_interval_seconds must be greater than zero");
        }

        Ok(())
    }

    pub fn active_persona(&self) -> Result<&PersonaConfig> {
        self.personas
            .get(&self.persona.active)
            .with_context(|| format!("Persona '{}' is not defined under [personas]", self.persona.active))
    }
}

/// Overrides such as `APP_GEMINI__API_KEY=...` or `APP_PERSONA__ACTIVE=lyly`.
fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn persona() -> PersonaConfig {
        PersonaConfig {
            assistant_name: "MediAssist".to_string(),
            title: "MediAssist - Medical Chatbot".to_string(),
            icon: "🩺".to_string(),
            about: "General medical information only.".to_string(),
            disclaimers: vec!["Not a substitute for professional medical advice".to_string()],
            input_placeholder: "Ask a medical question...".to_string(),
            welcome_message: Some("Hello! How can I help?".to_string()),
            thinking_message: "MediAssist is thinking...".to_string(),
            fallback_message: "I'm sorry, I couldn't generate a response. Please try again."
                .to_string(),
            error_prefix: "Error generating response".to_string(),
            footer: "Always consult with healthcare professionals.".to_string(),
            user_display_name: "You".to_string(),
            system_prompt: "You are MediAssist.".to_string(),
            models: vec!["gemini-2.0-flash".to_string(), "gemini-1.5-flash".to_string()],
            languages: vec![ResponseLanguage::Vietnamese, ResponseLanguage::English],
        }
    }

    pub fn settings() -> Settings {
        let mut personas = HashMap::new();
        personas.insert("mediassist".to_string(), persona());

        Settings {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                static_dir: default_static_dir(),
            },
            gemini: GeminiConfig {
                api_key: "test-key".to_string(),
                base_url: default_gemini_base_url(),
                connect_timeout_seconds: default_connect_timeout(),
            },
            generation: GenerationConfig {
                default_model: "gemini-2.0-flash".to_string(),
                default_temperature: 0.3,
                default_language: ResponseLanguage::Vietnamese,
                top_p: default_top_p(),
                top_k: default_top_k(),
                max_output_tokens: default_max_output_tokens(),
            },
            session: SessionLifecycleConfig {
                idle_timeout_seconds: 3600,
                cleanup_interval_seconds: 60,
            },
            persona: PersonaSelection {
                active: "mediassist".to_string(),
            },
            personas,
        }
    }
}
