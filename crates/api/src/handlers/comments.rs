//! Annotation comment handlers
//!
//! Comments thread one level deep: a root comment replies to the
//! annotation, a nested comment replies to a root. Replies to replies are
//! rejected. Reply notifications are fire-and-forget.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::extract::{AuthUser, MaybeAuthUser};
use crate::AppState;
use gabber_common::db::models::AnnotationComment;
use gabber_common::errors::{AppError, Result};
use gabber_common::mail::{Notification, NotificationKind};
use gabber_common::metrics;
use gabber_common::validate::validate_comment;
use gabber_common::Repository;

#[derive(Serialize)]
pub struct CommentView {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub replies: Vec<CommentView>,
}

/// Assemble the one-level tree: roots carry their replies, newest first.
fn comment_tree(comments: Vec<AnnotationComment>) -> Vec<CommentView> {
    let (roots, replies): (Vec<_>, Vec<_>) = comments.into_iter().partition(|c| c.is_root());

    roots
        .into_iter()
        .map(|root| CommentView {
            replies: replies
                .iter()
                .filter(|reply| reply.parent_id == Some(root.id))
                .map(|reply| CommentView {
                    id: reply.id,
                    user_id: reply.user_id,
                    content: reply.content.clone(),
                    created_at: reply.created_at.to_rfc3339(),
                    replies: Vec::new(),
                })
                .collect(),
            id: root.id,
            user_id: root.user_id,
            content: root.content.clone(),
            created_at: root.created_at.to_rfc3339(),
        })
        .collect()
}

async fn annotation_in_visible_session(
    repo: &Repository,
    user: Option<&AuthUser>,
    project_id: i64,
    session_id: &str,
    annotation_id: i64,
) -> Result<(gabber_common::db::models::Project, gabber_common::db::models::Annotation)> {
    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(repo, user, &project).await?;
    super::require_private_access(&project, audience, user)?;

    let session = super::visible_session(
        repo,
        &project,
        session_id,
        audience,
        user.map(|u| u.user_id),
    )
    .await?;

    let annotation = repo
        .find_annotation(annotation_id)
        .await?
        .filter(|a| a.session_id == session.id)
        .ok_or_else(AppError::annotation_not_found)?;

    Ok((project, annotation))
}

/// List the comment threads of an annotation
pub async fn list_comments(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path((project_id, session_id, annotation_id)): Path<(i64, String, i64)>,
) -> Result<Json<Vec<CommentView>>> {
    let repo = state.repo();

    let (_, annotation) = annotation_in_visible_session(
        &repo,
        user.0.as_ref(),
        project_id,
        &session_id,
        annotation_id,
    )
    .await?;

    let comments = repo.comments_for_annotation(annotation.id).await?;
    Ok(Json(comment_tree(comments)))
}

/// Comment on an annotation, or reply to a root comment. A root reply
/// notifies the annotation author; a nested reply notifies the session's
/// participants. Notification failures never fail the request.
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, session_id, annotation_id)): Path<(i64, String, i64)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CommentView>)> {
    let repo = state.repo();

    let (project, annotation) = annotation_in_visible_session(
        &repo,
        Some(&auth),
        project_id,
        &session_id,
        annotation_id,
    )
    .await?;

    let input = validate_comment(&body)?;

    let comment = repo.create_comment(annotation.id, auth.user_id, &input).await?;

    metrics::record_comment_created();

    tracing::info!(
        comment_id = comment.id,
        annotation_id,
        user_id = auth.user_id,
        "Comment created"
    );

    let session_link = format!(
        "{}/projects/{}/conversations/{}",
        state.config.server.web_host, project_id, session_id
    );

    if comment.is_root() {
        // Notify the annotation author, unless they replied to themselves
        if annotation.user_id != auth.user_id {
            if let Some(author) = repo.find_user_by_id(annotation.user_id).await? {
                state.notifier.send(Notification {
                    kind: NotificationKind::CommentReply,
                    recipient_email: author.email,
                    recipient_name: author.fullname,
                    project_title: project.title.clone(),
                    link: session_link.clone(),
                });
            }
        }
    } else {
        // Notify everyone who took part in the recording, except the
        // commenter
        for participant in repo.participants_for_session(&session_id).await? {
            if participant.user_id == auth.user_id {
                continue;
            }
            if let Some(user) = repo.find_user_by_id(participant.user_id).await? {
                state.notifier.send(Notification {
                    kind: NotificationKind::ThreadReply,
                    recipient_email: user.email,
                    recipient_name: user.fullname,
                    project_title: project.title.clone(),
                    link: session_link.clone(),
                });
            }
        }
    }

    let view = CommentView {
        id: comment.id,
        user_id: comment.user_id,
        content: comment.content.clone(),
        created_at: comment.created_at.to_rfc3339(),
        replies: Vec::new(),
    };

    Ok((StatusCode::CREATED, Json(view)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(id: i64, parent_id: Option<i64>) -> AnnotationComment {
        let now = Utc::now();
        AnnotationComment {
            id,
            annotation_id: 1,
            user_id: 1,
            parent_id,
            content: format!("comment {id}"),
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_tree_is_one_level() {
        let comments = vec![comment(1, None), comment(2, Some(1)), comment(3, Some(1)), comment(4, None)];
        let tree = comment_tree(comments);
        assert_eq!(tree.len(), 2);
        let root = tree.iter().find(|c| c.id == 1).unwrap();
        assert_eq!(root.replies.len(), 2);
        assert!(root.replies.iter().all(|r| r.replies.is_empty()));
    }

    #[test]
    fn test_tree_empty() {
        assert!(comment_tree(Vec::new()).is_empty());
    }
}
