//! Request handlers

pub mod annotations;
pub mod auth;
pub mod codebook;
pub mod comments;
pub mod consent;
pub mod health;
pub mod projects;
pub mod sessions;

use crate::extract::AuthUser;
use chrono::Utc;
use gabber_common::consent::{Audience, SessionAccess};
use gabber_common::db::models::{InterviewSession, Project};
use gabber_common::errors::{AppError, Result};
use gabber_common::Repository;

/// Standing of the requesting principal on a project. The creator and
/// researcher/administrator members are privileged; other active members
/// are members; everyone else counts as anonymous.
pub(crate) async fn audience_for(
    repo: &Repository,
    user: Option<&AuthUser>,
    project: &Project,
) -> Result<Audience> {
    let Some(user) = user else {
        return Ok(Audience::Anonymous);
    };

    if project.creator_id == user.user_id {
        return Ok(Audience::Privileged);
    }

    match repo.active_membership(user.user_id, project.id).await? {
        Some(membership) if membership.is_active() => {
            if membership.member_role().is_privileged() {
                Ok(Audience::Privileged)
            } else {
                Ok(Audience::Member)
            }
        }
        _ => Ok(Audience::Anonymous),
    }
}

/// Private projects are members-only: anonymous callers get 401,
/// authenticated non-members get 403.
pub(crate) fn require_private_access(
    project: &Project,
    audience: Audience,
    user: Option<&AuthUser>,
) -> Result<()> {
    if project.is_public || audience != Audience::Anonymous {
        return Ok(());
    }
    match user {
        None => Err(AppError::unauthorized()),
        Some(_) => Err(AppError::not_project_member()),
    }
}

/// Build the resolver input for one session, reading consent state fresh
/// from the participant rows of this request.
pub(crate) async fn session_access(
    repo: &Repository,
    session: &InterviewSession,
    project: &Project,
    viewer: Option<i64>,
) -> Result<SessionAccess> {
    let participants = repo.participants_for_session(&session.id).await?;
    let viewer_is_participant = viewer
        .map(|user_id| participants.iter().any(|p| p.user_id == user_id))
        .unwrap_or(false);

    Ok(SessionAccess {
        project_is_public: project.is_public,
        consents: participants.iter().map(|p| p.consent()).collect(),
        created_at: session.created_at.with_timezone(&Utc),
        viewer_is_participant,
    })
}

/// Resolve a session that must both exist and be visible to the viewer.
/// Invisible sessions 404 rather than 403, so their existence leaks
/// nothing.
pub(crate) async fn visible_session(
    repo: &Repository,
    project: &Project,
    session_id: &str,
    audience: Audience,
    viewer: Option<i64>,
) -> Result<InterviewSession> {
    let session = repo
        .find_session(session_id)
        .await?
        .filter(|s| s.project_id == project.id)
        .ok_or_else(AppError::session_not_found)?;

    let access = session_access(repo, &session, project, viewer).await?;
    if !access.visible_to(audience, Utc::now()) {
        return Err(AppError::session_not_found());
    }

    Ok(session)
}
