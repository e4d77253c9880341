//! Per-client profile and settings endpoints.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use liftlog_session::ClientToken;
use liftlog_types::{CoachSettings, UserProfile};

use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedResponse {
    pub success: bool,
    pub message: String,
}

impl SavedResponse {
    fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDataResponse {
    pub profile: UserProfile,
    pub settings: CoachSettings,
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ServerError::BadRequest(format!("Invalid {what}: {e}")))
}

/// GET /settings
pub async fn get_settings_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
) -> Json<CoachSettings> {
    Json(state.contexts.settings(&client))
}

/// POST /settings - store coaching preferences.
///
/// The body may carry the profile form under `profile_data`; it is saved
/// alongside the settings.
pub async fn save_settings_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    Json(mut body): Json<Value>,
) -> Result<Json<SavedResponse>> {
    let profile = match body.as_object_mut().and_then(|o| o.remove("profile_data")) {
        Some(Value::Null) | None => None,
        Some(raw) => Some(decode::<UserProfile>(raw, "profile")?),
    };
    let settings: CoachSettings = decode(body, "settings")?;

    state.contexts.update(&client, |ctx| {
        ctx.settings = settings;
        if let Some(profile) = profile {
            ctx.profile = profile;
        }
    });
    info!(client = %client, "Settings saved");

    Ok(Json(SavedResponse::new(
        "Settings saved! AI assistant updated with your preferences.",
    )))
}

/// POST /profile - store the user's profile.
pub async fn save_profile_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    Json(body): Json<Value>,
) -> Result<Json<SavedResponse>> {
    let profile: UserProfile = decode(body, "profile")?;
    state.contexts.set_profile(&client, profile);
    info!(client = %client, "Profile saved");

    Ok(Json(SavedResponse::new(
        "Profile saved! AI assistant now knows your personal data and will provide personalized recommendations.",
    )))
}

/// GET /user-data - profile and settings together.
pub async fn user_data_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
) -> Json<UserDataResponse> {
    let ctx = state.contexts.get(&client);
    Json(UserDataResponse {
        profile: ctx.profile,
        settings: ctx.settings,
    })
}
