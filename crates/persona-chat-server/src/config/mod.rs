pub mod settings;

pub use settings::{
    GeminiConfig, GenerationConfig, PersonaConfig, PersonaSelection, ServerConfig,
    SessionLifecycleConfig, Settings,
};
