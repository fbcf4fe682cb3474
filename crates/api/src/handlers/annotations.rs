//! Annotation handlers
//!
//! Annotations are user-authored, time-ranged comments on a session
//! recording, taggable against the project codebook. They are validated
//! with accumulated error codes and soft-deleted, never removed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::extract::{AuthUser, MaybeAuthUser};
use crate::AppState;
use gabber_common::consent::Audience;
use gabber_common::db::models::Annotation;
use gabber_common::errors::{AppError, Result};
use gabber_common::metrics;
use gabber_common::validate::validate_annotation;
use gabber_common::Repository;

#[derive(Serialize)]
pub struct TagView {
    pub id: i64,
    pub text: String,
}

#[derive(Serialize)]
pub struct AnnotationResponse {
    pub id: i64,
    pub session_id: String,
    pub user_id: i64,
    pub content: String,
    pub start_interval: i64,
    pub end_interval: i64,
    pub created_at: String,
    pub tags: Vec<TagView>,
}

pub(super) async fn annotation_view(
    repo: &Repository,
    annotation: &Annotation,
) -> Result<AnnotationResponse> {
    let tags = repo.tags_for_annotation(annotation.id).await?;
    Ok(AnnotationResponse {
        id: annotation.id,
        session_id: annotation.session_id.clone(),
        user_id: annotation.user_id,
        content: annotation.content.clone(),
        start_interval: annotation.start_interval,
        end_interval: annotation.end_interval,
        created_at: annotation.created_at.to_rfc3339(),
        tags: tags
            .into_iter()
            .map(|c| TagView { id: c.id, text: c.text })
            .collect(),
    })
}

/// List the active annotations of a session
pub async fn list_annotations(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path((project_id, session_id)): Path<(i64, String)>,
) -> Result<Json<Vec<AnnotationResponse>>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, user.0.as_ref(), &project).await?;
    super::require_private_access(&project, audience, user.0.as_ref())?;

    let session =
        super::visible_session(&repo, &project, &session_id, audience, user.user_id()).await?;

    let annotations = repo.active_annotations_for_session(&session.id).await?;
    let mut views = Vec::with_capacity(annotations.len());
    for annotation in &annotations {
        views.push(annotation_view(&repo, annotation).await?);
    }

    Ok(Json(views))
}

/// Annotate a session segment. Tags must resolve against the project's
/// active codebook; all structural violations come back in one response.
pub async fn create_annotation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, session_id)): Path<(i64, String)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<AnnotationResponse>)> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, Some(&auth), &project).await?;
    super::require_private_access(&project, audience, Some(&auth))?;

    let session =
        super::visible_session(&repo, &project, &session_id, audience, Some(auth.user_id)).await?;

    let codes = repo.active_codes_for_project(project_id).await?;
    let code_ids: Vec<i64> = codes.iter().map(|c| c.id).collect();

    let input = validate_annotation(&body, &code_ids)?;

    let annotation = repo
        .create_annotation(&session.id, auth.user_id, &input)
        .await?;

    metrics::record_annotation_created();

    tracing::info!(
        annotation_id = annotation.id,
        session_id = %session.id,
        user_id = auth.user_id,
        "Annotation created"
    );

    let view = annotation_view(&repo, &annotation).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Soft-delete an annotation. Allowed for its author and for privileged
/// project roles; the row stays for audit history.
pub async fn delete_annotation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, session_id, annotation_id)): Path<(i64, String, i64)>,
) -> Result<StatusCode> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, Some(&auth), &project).await?;
    super::require_private_access(&project, audience, Some(&auth))?;

    let annotation = repo
        .find_annotation(annotation_id)
        .await?
        .filter(|a| a.session_id == session_id)
        .ok_or_else(AppError::annotation_not_found)?;

    if annotation.user_id != auth.user_id && audience != Audience::Privileged {
        return Err(AppError::Forbidden { code: "USER_ANNOTATIONS_NOT_CREATOR" });
    }

    repo.soft_delete_annotation(annotation).await?;

    tracing::info!(annotation_id, user_id = auth.user_id, "Annotation soft-deleted");

    Ok(StatusCode::NO_CONTENT)
}
