//! Codebook handlers
//!
//! Each project carries one controlled tag vocabulary. Codes are what
//! annotations resolve their integer tag ids against.

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
use gabber_common::errors::{AppError, Result};
use gabber_common::validate::CodeValidator;

#[derive(Serialize)]
pub struct CodeView {
    pub id: i64,
    pub text: String,
}

/// List the project's active codes
pub async fn list_codes(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<CodeView>>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, user.0.as_ref(), &project).await?;
    super::require_private_access(&project, audience, user.0.as_ref())?;

    let codes = repo.active_codes_for_project(project_id).await?;

    Ok(Json(
        codes
            .into_iter()
            .map(|c| CodeView { id: c.id, text: c.text })
            .collect(),
    ))
}

/// Add a code to the project's codebook, creating the codebook on first
/// use. Restricted to the creator and researcher/administrator members.
pub async fn add_code(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CodeView>)> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, Some(&auth), &project).await?;
    if audience != Audience::Privileged {
        return Err(AppError::Forbidden { code: "CODES_NOT_PRIVILEGED" });
    }

    let mut v = CodeValidator::new("CODES");
    let text = v.require_str(&body, "text").map(str::to_owned);
    v.finish()?;
    let text = text.unwrap_or_default();

    let codebook = match repo.codebook_for_project(project_id).await? {
        Some(codebook) => codebook,
        None => repo.create_codebook(project_id, project.title.clone()).await?,
    };

    let code = repo.add_code(codebook.id, text).await?;

    tracing::info!(project_id, code_id = code.id, "Code added to codebook");

    Ok((
        StatusCode::CREATED,
        Json(CodeView { id: code.id, text: code.text }),
    ))
}
