use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::chat::PersonaInfo;
use crate::state::AppState;

/// Branding and selector options for the page chrome.
pub async fn get_persona(State(state): State<Arc<AppState>>) -> Json<PersonaInfo> {
    let persona = &state.persona;

    Json(PersonaInfo {
        assistant_name: persona.assistant_name.clone(),
        title: persona.title.clone(),
        icon: persona.icon.clone(),
        about: persona.about.clone(),
        disclaimers: persona.disclaimers.clone(),
        input_placeholder: persona.input_placeholder.clone(),
        footer: persona.footer.clone(),
        user_display_name: persona.user_display_name.clone(),
        models: persona.models.clone(),
        languages: persona.languages.clone(),
        defaults: state.default_session_config(),
    })
}
