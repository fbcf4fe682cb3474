//! Project management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::extract::{AuthUser, MaybeAuthUser};
use crate::AppState;
use gabber_common::db::models::{Membership, Project, Topic};
use gabber_common::errors::{AppError, Result};
use gabber_common::validate::{validate_project_create, validate_project_update};
use gabber_common::Repository;

#[derive(Serialize)]
pub struct TopicView {
    pub id: i64,
    pub text: String,
}

#[derive(Serialize)]
pub struct MemberView {
    pub user_id: i64,
    pub role: String,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub privacy: String,
    pub creator_id: i64,
    pub created_at: String,
    pub topics: Vec<TopicView>,
    pub members: Vec<MemberView>,
}

fn privacy_of(project: &Project) -> String {
    if project.is_public { "public" } else { "private" }.to_string()
}

async fn project_response(repo: &Repository, project: Project) -> Result<ProjectResponse> {
    let topics = repo.active_topics_for_project(project.id).await?;
    let members = repo.members_of_project(project.id).await?;
    Ok(build_response(project, topics, members))
}

fn build_response(project: Project, topics: Vec<Topic>, members: Vec<Membership>) -> ProjectResponse {
    ProjectResponse {
        privacy: privacy_of(&project),
        id: project.id,
        title: project.title,
        slug: project.slug,
        description: project.description,
        creator_id: project.creator_id,
        created_at: project.created_at.to_rfc3339(),
        topics: topics
            .into_iter()
            .map(|t| TopicView { id: t.id, text: t.text })
            .collect(),
        members: members
            .into_iter()
            .map(|m| MemberView { user_id: m.user_id, role: m.role })
            .collect(),
    }
}

/// List projects visible to the caller: all public projects, plus the
/// private ones they hold an active membership in.
pub async fn list_projects(
    State(state): State<AppState>,
    user: MaybeAuthUser,
) -> Result<Json<Vec<ProjectResponse>>> {
    let repo = state.repo();
    let projects = repo.list_projects_visible_to(user.user_id()).await?;

    let mut responses = Vec::with_capacity(projects.len());
    for project in projects {
        responses.push(project_response(&repo, project).await?);
    }

    Ok(Json(responses))
}

/// Create a project. The slug is derived from the title and must not
/// collide with any existing project, soft-deleted ones included.
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    let repo = state.repo();

    let mut draft = validate_project_create(&body);
    if let Some(input) = &draft.input {
        if draft.check_slug && repo.slug_taken(&input.slug).await? {
            draft.reject_slug_taken();
        }
    }
    let input = draft.finish()?;

    let project = repo
        .create_project(
            auth.user_id,
            input.title,
            input.slug,
            input.description,
            input.is_public,
            input.topics,
        )
        .await?;

    tracing::info!(
        project_id = project.id,
        creator_id = auth.user_id,
        "Project created"
    );

    let response = project_response(&repo, project).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a project. Private projects are members-only.
pub async fn get_project(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(project_id): Path<i64>,
) -> Result<Json<ProjectResponse>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, user.0.as_ref(), &project).await?;
    super::require_private_access(&project, audience, user.0.as_ref())?;

    let response = project_response(&repo, project).await?;
    Ok(Json(response))
}

/// Update a project. Creator only. The slug is recomputed, and re-checked
/// for collisions, only when the title actually changed.
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<ProjectResponse>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    if project.creator_id != auth.user_id {
        return Err(AppError::not_project_creator());
    }

    let mut draft = validate_project_update(&body, &project.title, &project.slug);
    if let Some(input) = &draft.input {
        if draft.check_slug && repo.slug_taken(&input.slug).await? {
            draft.reject_slug_taken();
        }
    }
    let input = draft.finish()?;

    let updated = repo
        .update_project(
            project,
            input.title,
            input.slug,
            input.description,
            input.is_public,
            input.topics,
        )
        .await?;

    tracing::info!(project_id, "Project updated");

    let response = project_response(&repo, updated).await?;
    Ok(Json(response))
}

/// Soft-delete a project. Creator only; the row and its slug remain for
/// audit history and the slug stays reserved.
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
) -> Result<StatusCode> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    if project.creator_id != auth.user_id {
        return Err(AppError::not_project_creator());
    }

    repo.soft_delete_project(project).await?;

    tracing::info!(project_id, "Project soft-deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct MembershipResponse {
    pub project_id: i64,
    pub user_id: i64,
    pub role: String,
    pub confirmed: bool,
    pub deactivated: bool,
}

impl From<Membership> for MembershipResponse {
    fn from(m: Membership) -> Self {
        MembershipResponse {
            project_id: m.project_id,
            user_id: m.user_id,
            role: m.role,
            confirmed: m.confirmed,
            deactivated: m.deactivated,
        }
    }
}

/// Join a public project. Appends a confirmed membership row; joining a
/// private project needs an invitation from its researchers instead.
pub async fn join_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
) -> Result<(StatusCode, Json<MembershipResponse>)> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    if !project.is_public {
        return Err(AppError::not_project_member());
    }

    let membership = repo.join_project(auth.user_id, project_id).await?;

    tracing::info!(project_id, user_id = auth.user_id, "Joined project");

    Ok((StatusCode::CREATED, Json(membership.into())))
}

/// Leave a project: the most recent active membership row is deactivated
/// and kept, so the join/leave history survives.
pub async fn leave_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
) -> Result<Json<MembershipResponse>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let membership = repo.leave_project(auth.user_id, project.id).await?;

    tracing::info!(project_id, user_id = auth.user_id, "Left project");

    Ok(Json(membership.into()))
}
