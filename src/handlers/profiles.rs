use crate::core::error::{ApiError, ValidationError};
use crate::core::state::AppState;
use crate::handlers::blocking_write;
use crate::models::api::{CreateProfileRequest, ProfileResponse, UpdateSettingsRequest};
use crate::models::profile::UserProfile;
use crate::ops::mutations::Mutation;
use crate::stores::profile_store::Commit;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::info;

fn profile_response(status: StatusCode, commit: Commit) -> Response {
    (
        status,
        Json(ProfileResponse {
            success: true,
            version: commit.version,
            profile: (*commit.profile).clone(),
        }),
    )
        .into_response()
}

/// Create the profile document for a user
///
/// POST /users/{user_id}
pub async fn create_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<Response, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingField("name".to_string()).into());
    }
    let email = req.email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email".to_string()).into());
    }

    let profile = UserProfile::new(name.to_string(), email.to_string(), req.settings);
    let id = user_id.clone();
    let commit = blocking_write(&state.store, move |store| store.create_profile(&id, profile)).await?;

    info!(user_id = %user_id, "Profile created via API");

    Ok(profile_response(StatusCode::CREATED, commit))
}

/// GET /users/{user_id}
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let commit = state.store.get_with_version(&user_id)?;
    Ok(profile_response(StatusCode::OK, commit))
}

/// Replace notification settings and optionally the display name
///
/// PUT /users/{user_id}/settings
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Response, ApiError> {
    let mutation = Mutation::UpdateSettings {
        settings: req.settings,
        name: req.name,
    };
    let id = user_id.clone();
    let commit = blocking_write(&state.store, move |store| store.apply(&id, &mutation)).await?;

    info!(user_id = %user_id, version = commit.version, "Settings updated");

    Ok(profile_response(StatusCode::OK, commit))
}
