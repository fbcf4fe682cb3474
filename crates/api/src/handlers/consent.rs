//! Consent handlers
//!
//! Participants reach these through signed links emailed after an upload.
//! The token identifies one participant of one session; no login is
//! required. A decision recorded here takes effect on the very next read
//! of any listing, because visibility is recomputed per request.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::AppState;
use gabber_common::errors::{AppError, Result};
use gabber_common::metrics;
use gabber_common::validate::validate_consent;

#[derive(Serialize)]
pub struct ConsentResponse {
    pub session_id: String,
    pub project_title: String,
    /// The participant's current decision: "private", "public" or "delete"
    pub consent: String,
    /// Time-limited playback URL so the participant can review what they
    /// are consenting to
    pub recording_url: String,
}

/// Show the session a consent link refers to, with the participant's
/// current decision. Participants can revise their decision for as long
/// as the link is valid.
pub async fn show_consent(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ConsentResponse>> {
    let claims = state.jwt.verify_consent(&token)?;
    let user_id = claims.user_id()?;

    let repo = state.repo();

    let session = repo
        .find_session(&claims.session_id)
        .await?
        .ok_or_else(AppError::session_not_found)?;

    let participant = repo
        .participants_for_session(&session.id)
        .await?
        .into_iter()
        .find(|p| p.user_id == user_id)
        .ok_or_else(AppError::session_not_found)?;

    let project = repo
        .find_project_including_deleted(session.project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let recording_url = state
        .store
        .signed_url(session.project_id, &session.id)
        .await?;

    Ok(Json(ConsentResponse {
        session_id: session.id,
        project_title: project.title,
        consent: participant.consent_type,
        recording_url,
    }))
}

/// Record a consent decision. Last write wins; concurrent updates from
/// two tabs are acceptable because every read re-evaluates the stored
/// state.
pub async fn update_consent(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ConsentResponse>> {
    let claims = state.jwt.verify_consent(&token)?;
    let user_id = claims.user_id()?;

    let consent = validate_consent(&body)?;

    let repo = state.repo();

    let session = repo
        .find_session(&claims.session_id)
        .await?
        .ok_or_else(AppError::session_not_found)?;

    let participant = repo.update_consent(&session.id, user_id, consent).await?;

    metrics::record_consent_update(&participant.consent_type);

    tracing::info!(
        session_id = %session.id,
        user_id,
        consent = %participant.consent_type,
        "Consent recorded"
    );

    let project = repo
        .find_project_including_deleted(session.project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let recording_url = state
        .store
        .signed_url(session.project_id, &session.id)
        .await?;

    Ok(Json(ConsentResponse {
        session_id: session.id,
        project_title: project.title,
        consent: participant.consent_type,
        recording_url,
    }))
}
