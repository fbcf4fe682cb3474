//! Interview session handlers
//!
//! Uploading a session is one request: the recording goes to object
//! storage first, and only then are the session, participant and prompt
//! rows committed in a single transaction. A storage failure therefore
//! leaves no session row behind. Consent request emails go out after the
//! commit, fire-and-forget.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::extract::{AuthUser, MaybeAuthUser};
use crate::AppState;
use gabber_common::db::models::InterviewSession;
use gabber_common::db::{NewParticipant, NewPromptRegion};
use gabber_common::errors::{AppError, Result};
use gabber_common::mail::{Notification, NotificationKind};
use gabber_common::metrics;
use gabber_common::validate::{validate_participants, validate_prompts, CodeValidator};
use gabber_common::Repository;

#[derive(Serialize)]
pub struct ParticipantView {
    pub user_id: i64,
    pub fullname: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct PromptRegionView {
    pub topic_id: i64,
    pub start_interval: i64,
    pub end_interval: i64,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub project_id: i64,
    pub creator_id: i64,
    pub created_at: String,
    pub participants: Vec<ParticipantView>,
    pub topics: Vec<PromptRegionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

pub(super) async fn session_view(
    repo: &Repository,
    session: &InterviewSession,
    recording_url: Option<String>,
) -> Result<SessionResponse> {
    let participants = repo.participants_for_session(&session.id).await?;
    let regions = repo.prompt_regions_for_session(&session.id).await?;

    let mut views = Vec::with_capacity(participants.len());
    for participant in &participants {
        let fullname = repo
            .find_user_by_id(participant.user_id)
            .await?
            .map(|u| u.fullname)
            .unwrap_or_default();
        views.push(ParticipantView {
            user_id: participant.user_id,
            fullname,
            role: participant.role.clone(),
        });
    }

    Ok(SessionResponse {
        id: session.id.clone(),
        project_id: session.project_id,
        creator_id: session.creator_id,
        created_at: session.created_at.to_rfc3339(),
        participants: views,
        topics: regions
            .into_iter()
            .map(|r| PromptRegionView {
                topic_id: r.topic_id,
                start_interval: r.start_interval,
                end_interval: r.end_interval,
            })
            .collect(),
        recording_url,
    })
}

/// List a project's sessions, filtered by the consent resolver. Consent
/// state is read fresh on every request, so a revocation hides a session
/// from the very next listing.
pub async fn list_sessions(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<SessionResponse>>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, user.0.as_ref(), &project).await?;
    super::require_private_access(&project, audience, user.0.as_ref())?;

    let now = Utc::now();
    let mut visible = Vec::new();
    for session in repo.sessions_for_project(project_id).await? {
        let access = super::session_access(&repo, &session, &project, user.user_id()).await?;
        if access.visible_to(audience, now) {
            visible.push(session_view(&repo, &session, None).await?);
        }
    }

    Ok(Json(visible))
}

struct UploadParts {
    recording: Option<(Vec<u8>, String)>,
    participants_raw: Option<String>,
    prompts_raw: Option<String>,
    creator_email: Option<String>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadParts> {
    let mut parts = UploadParts {
        recording: None,
        participants_raw: None,
        prompts_raw: None,
        creator_email: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::validation("SESSIONS_MULTIPART_INVALID"))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "recording" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("audio/mp4")
                    .to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::validation("SESSIONS_RECORDING_UNREADABLE"))?;
                parts.recording = Some((bytes.to_vec(), content_type));
            }
            "participants" => {
                parts.participants_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::validation("SESSIONS_PARTICIPANTS_UNREADABLE"))?,
                );
            }
            "prompts" => {
                parts.prompts_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::validation("SESSIONS_PROMPTS_UNREADABLE"))?,
                );
            }
            "creator_email" => {
                parts.creator_email = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::validation("SESSIONS_CREATOR_EMAIL_UNREADABLE"))?,
                );
            }
            _ => {}
        }
    }

    Ok(parts)
}

fn parse_json_part(raw: &str, v: &mut CodeValidator, field: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => {
            v.push(&format!("{}_INVALID_JSON", field));
            None
        }
    }
}

/// Upload a new session: a multipart request carrying the recording, the
/// participant list and the prompt regions discussed.
pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    // Members only for private projects; anyone signed-in may upload to
    // public ones
    let audience = super::audience_for(&repo, Some(&auth), &project).await?;
    super::require_private_access(&project, audience, Some(&auth))?;

    let parts = read_upload(&mut multipart).await?;

    let mut v = CodeValidator::new("SESSIONS");
    if parts.recording.is_none() {
        v.push("RECORDING_KEY_REQUIRED");
    }
    if parts.participants_raw.is_none() {
        v.push("PARTICIPANTS_KEY_REQUIRED");
    }
    if parts.prompts_raw.is_none() {
        v.push("PROMPTS_KEY_REQUIRED");
    }
    let participants_json = parts
        .participants_raw
        .as_deref()
        .and_then(|raw| parse_json_part(raw, &mut v, "participants"));
    let prompts_json = parts
        .prompts_raw
        .as_deref()
        .and_then(|raw| parse_json_part(raw, &mut v, "prompts"));
    v.finish()?;

    let participants = validate_participants(&participants_json.unwrap_or(Value::Null))?;
    let prompts = validate_prompts(&prompts_json.unwrap_or(Value::Null))?;

    // Prompt regions must reference this project's active topics
    let topics = repo.active_topics_for_project(project_id).await?;
    if prompts
        .iter()
        .any(|p| !topics.iter().any(|t| t.id == p.topic_id))
    {
        return Err(AppError::validation("PROMPTS_TOPIC_NOT_IN_PROJECT"));
    }

    // An unknown creator email falls back to the authenticated uploader
    let creator_id = match parts.creator_email.as_deref() {
        Some(email) => repo
            .find_user_by_email(email)
            .await?
            .map(|u| u.id)
            .unwrap_or(auth.user_id),
        None => auth.user_id,
    };

    // Link participants to known accounts, creating stubs for newcomers
    let mut participant_users = Vec::with_capacity(participants.len());
    let mut new_participants = Vec::with_capacity(participants.len());
    for p in &participants {
        let user = match repo.find_user_by_email(&p.email).await? {
            Some(user) => user,
            None => {
                repo.create_unregistered_user(p.name.clone(), p.email.clone())
                    .await?
            }
        };
        new_participants.push(NewParticipant {
            user_id: user.id,
            role: p.role,
        });
        participant_users.push(user);
    }

    let session_id = Uuid::new_v4().simple().to_string();

    // Upload before any session row exists; a failure here aborts the
    // request with nothing committed
    let (bytes, content_type) = parts
        .recording
        .ok_or_else(|| AppError::validation("SESSIONS_RECORDING_KEY_REQUIRED"))?;
    state
        .store
        .upload(project_id, &session_id, bytes, &content_type)
        .await?;

    let regions = prompts
        .into_iter()
        .map(|p| NewPromptRegion {
            topic_id: p.topic_id,
            start_interval: p.start_interval,
            end_interval: p.end_interval,
        })
        .collect();

    let session = repo
        .create_session(session_id, creator_id, project_id, new_participants, regions)
        .await?;

    metrics::record_session_created();

    tracing::info!(
        session_id = %session.id,
        project_id,
        creator_id,
        "Session uploaded"
    );

    // Ask every participant to review and consent
    for user in &participant_users {
        let token = state.jwt.issue_consent(user.id, &session.id)?;
        state.notifier.send(Notification {
            kind: NotificationKind::ConsentRequest,
            recipient_email: user.email.clone(),
            recipient_name: user.fullname.clone(),
            project_title: project.title.clone(),
            link: format!("{}/consent/{}", state.config.server.web_host, token),
        });
    }

    let response = session_view(&repo, &session, None).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get one session with a time-limited playback URL. Invisible sessions
/// are indistinguishable from missing ones.
pub async fn get_session(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path((project_id, session_id)): Path<(i64, String)>,
) -> Result<Json<SessionResponse>> {
    let repo = state.repo();

    let project = repo
        .find_project(project_id)
        .await?
        .ok_or_else(AppError::project_not_found)?;

    let audience = super::audience_for(&repo, user.0.as_ref(), &project).await?;
    super::require_private_access(&project, audience, user.0.as_ref())?;

    let session =
        super::visible_session(&repo, &project, &session_id, audience, user.user_id()).await?;

    let recording_url = state.store.signed_url(project_id, &session.id).await?;

    let response = session_view(&repo, &session, Some(recording_url)).await?;
    Ok(Json(response))
}
