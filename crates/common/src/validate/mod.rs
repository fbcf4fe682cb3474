//! Accumulating request validation
//!
//! Structural validation over raw JSON bodies. Every violated rule
//! contributes one stable `{SCHEMA}_{FIELD}_{REASON}` code and all codes
//! are collected before reporting, so a client can fix every field in a
//! single round trip.

use crate::db::models::SessionRole;
use crate::errors::{AppError, Result};
use crate::slug::slugify;
use serde_json::Value;

pub const MAX_TITLE_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 256;
pub const MAX_TOPIC_LEN: usize = 260;
pub const MAX_CONTENT_LEN: usize = 1024;

/// Collects error codes for one schema, prefixing and uppercasing each.
#[derive(Debug)]
pub struct CodeValidator {
    schema: &'static str,
    errors: Vec<String>,
}

impl CodeValidator {
    pub fn new(schema: &'static str) -> Self {
        Self { schema, errors: Vec::new() }
    }

    pub fn push(&mut self, code: &str) {
        self.errors.push(format!("{}_{}", self.schema, code).to_uppercase());
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn codes(&self) -> &[String] {
        &self.errors
    }

    /// Consume the validator, raising if any code accumulated.
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation { codes: self.errors })
        }
    }

    /// Required non-empty string field.
    pub fn require_str<'a>(&mut self, data: &'a Value, field: &str) -> Option<&'a str> {
        match data.get(field) {
            None => {
                self.push(&format!("{}_KEY_REQUIRED", field));
                None
            }
            Some(value) => match value.as_str() {
                None => {
                    self.push(&format!("{}_IS_NOT_STRING", field));
                    None
                }
                Some(s) if s.trim().is_empty() => {
                    self.push(&format!("{}_IS_EMPTY", field));
                    None
                }
                Some(s) => Some(s),
            },
        }
    }

    /// Required integer field (JSON numbers with a fractional part fail).
    pub fn require_int(&mut self, data: &Value, field: &str) -> Option<i64> {
        match data.get(field) {
            None => {
                self.push(&format!("{}_KEY_REQUIRED", field));
                None
            }
            Some(value) => match value.as_i64() {
                None => {
                    self.push(&format!("{}_IS_NOT_INT", field));
                    None
                }
                Some(n) => Some(n),
            },
        }
    }

    /// Required list field.
    pub fn require_list<'a>(&mut self, data: &'a Value, field: &str) -> Option<&'a Vec<Value>> {
        match data.get(field) {
            None => {
                self.push(&format!("{}_KEY_REQUIRED", field));
                None
            }
            Some(value) => match value.as_array() {
                None => {
                    self.push(&format!("{}_IS_NOT_LIST", field));
                    None
                }
                Some(items) => Some(items),
            },
        }
    }

    /// Length ceiling on an already-extracted string.
    pub fn check_len(&mut self, value: Option<&str>, max: usize, field: &str) {
        if let Some(s) = value {
            if s.len() > max {
                self.push(&format!("{}_LENGTH_TOO_LONG", field));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// A structurally valid annotation, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationInput {
    pub content: String,
    pub start_interval: i64,
    pub end_interval: i64,
    pub tags: Vec<i64>,
}

fn interval(v: &mut CodeValidator, data: &Value, field: &str) -> Option<i64> {
    let value = v.require_int(data, field)?;
    if value < 0 {
        v.push(&format!("{}_MUST_BE_POSITIVE_INT", field));
        return None;
    }
    Some(value)
}

/// Validate an annotation body against the project's active codebook.
///
/// `known_codes` is the set of active code ids for the session's project;
/// tags must be integers resolvable against it.
pub fn validate_annotation(data: &Value, known_codes: &[i64]) -> Result<AnnotationInput> {
    let mut v = CodeValidator::new("USER_ANNOTATIONS");

    let content = v.require_str(data, "content").map(str::to_owned);
    v.check_len(content.as_deref(), MAX_CONTENT_LEN, "content");

    let start = interval(&mut v, data, "start_interval");
    let end = interval(&mut v, data, "end_interval");

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            v.push("START_BEFORE_END");
        }
    }

    let mut tags = Vec::new();
    if let Some(raw) = data.get("tags") {
        match raw.as_array() {
            None => v.push("TAGS_IS_NOT_LIST"),
            Some(items) => {
                for item in items {
                    match item.as_i64() {
                        None => v.push("TAG_IS_NOT_INT"),
                        Some(id) if !known_codes.contains(&id) => v.push("TAG_NOT_IN_CODEBOOK"),
                        Some(id) => tags.push(id),
                    }
                }
            }
        }
    }

    v.finish()?;
    Ok(AnnotationInput {
        content: content.unwrap_or_default(),
        start_interval: start.unwrap_or_default(),
        end_interval: end.unwrap_or_default(),
        tags,
    })
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentInput {
    pub content: String,
    pub parent_id: Option<i64>,
}

pub fn validate_comment(data: &Value) -> Result<CommentInput> {
    let mut v = CodeValidator::new("COMMENTS");

    let content = v.require_str(data, "content").map(str::to_owned);
    v.check_len(content.as_deref(), MAX_CONTENT_LEN, "content");

    let parent_id = match data.get("parent_id") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            None => {
                v.push("PARENT_ID_IS_NOT_INT");
                None
            }
            Some(id) => Some(id),
        },
    };

    v.finish()?;
    Ok(CommentInput { content: content.unwrap_or_default(), parent_id })
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub is_public: bool,
    pub topics: Vec<String>,
}

/// Partially validated project body. The slug collision check needs the
/// database, so the handler flags it and then calls [`ProjectDraft::finish`].
#[derive(Debug)]
pub struct ProjectDraft {
    pub input: Option<ProjectInput>,
    /// Whether the slug must be checked for collisions (always on create,
    /// only on update when the title changed)
    pub check_slug: bool,
    validator: CodeValidator,
}

impl ProjectDraft {
    pub fn reject_slug_taken(&mut self) {
        self.validator.push("TITLE_EXISTS");
    }

    pub fn finish(self) -> Result<ProjectInput> {
        self.validator.finish()?;
        // Codes empty implies all required fields parsed
        Ok(self.input.expect("validated project input"))
    }
}

fn project_fields(v: &mut CodeValidator, data: &Value) -> (Option<String>, Option<String>, Option<bool>, Vec<String>) {
    let title = v.require_str(data, "title").map(str::to_owned);
    v.check_len(title.as_deref(), MAX_TITLE_LEN, "title");

    let description = v.require_str(data, "description").map(str::to_owned);
    v.check_len(description.as_deref(), MAX_DESCRIPTION_LEN, "description");

    let is_public = match v.require_str(data, "privacy") {
        Some("public") => Some(true),
        Some("private") => Some(false),
        Some(_) => {
            v.push("PRIVACY_INVALID");
            None
        }
        None => None,
    };

    let mut topics = Vec::new();
    if let Some(items) = v.require_list(data, "topics") {
        for item in items {
            match item.as_str() {
                None => v.push("TOPIC_IS_NOT_STRING"),
                Some(text) if text.trim().is_empty() => v.push("TOPIC_IS_EMPTY"),
                Some(text) => {
                    if text.len() > MAX_TOPIC_LEN {
                        v.push("TOPIC_LENGTH_TOO_LONG");
                    } else {
                        topics.push(text.to_owned());
                    }
                }
            }
        }
    }

    (title, description, is_public, topics)
}

/// Validate a project creation body and derive its slug.
pub fn validate_project_create(data: &Value) -> ProjectDraft {
    let mut v = CodeValidator::new("PROJECTS");
    let (title, description, is_public, topics) = project_fields(&mut v, data);

    let input = match (title, description, is_public) {
        (Some(title), Some(description), Some(is_public)) if v.is_ok() => {
            let slug = slugify(&title);
            Some(ProjectInput { title, slug, description, is_public, topics })
        }
        _ => None,
    };

    ProjectDraft { input, check_slug: true, validator: v }
}

/// Validate a project update body. The slug is recomputed, and flagged for
/// a collision check, only when the title actually changed.
pub fn validate_project_update(data: &Value, current_title: &str, current_slug: &str) -> ProjectDraft {
    let mut v = CodeValidator::new("PROJECTS");
    let (title, description, is_public, topics) = project_fields(&mut v, data);

    let title_changed = title.as_deref().map(|t| t != current_title).unwrap_or(false);

    let input = match (title, description, is_public) {
        (Some(title), Some(description), Some(is_public)) if v.is_ok() => {
            let slug = if title_changed { slugify(&title) } else { current_slug.to_owned() };
            Some(ProjectInput { title, slug, description, is_public, topics })
        }
        _ => None,
    };

    ProjectDraft { input, check_slug: title_changed, validator: v }
}

// ---------------------------------------------------------------------------
// Session upload metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInput {
    pub name: String,
    pub email: String,
    pub role: SessionRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRegionInput {
    pub topic_id: i64,
    pub start_interval: i64,
    pub end_interval: i64,
}

/// Validate the participants list uploaded with a recording. The list must
/// be non-empty: a session with no participants could never be consented.
pub fn validate_participants(data: &Value) -> Result<Vec<ParticipantInput>> {
    let mut v = CodeValidator::new("PARTICIPANTS");
    let mut out = Vec::new();

    match data.as_array() {
        None => v.push("IS_NOT_LIST"),
        Some(items) if items.is_empty() => v.push("IS_EMPTY"),
        Some(items) => {
            for item in items {
                let name = v.require_str(item, "name").map(str::to_owned);
                let email = v.require_str(item, "email").map(str::to_owned);
                if let Some(email) = email.as_deref() {
                    if !email.contains('@') {
                        v.push("EMAIL_INVALID");
                    }
                }
                let role = match v.require_str(item, "role") {
                    Some(raw) => {
                        let role = SessionRole::parse(raw);
                        if role.is_none() {
                            v.push("ROLE_INVALID");
                        }
                        role
                    }
                    None => None,
                };
                if let (Some(name), Some(email), Some(role)) = (name, email, role) {
                    out.push(ParticipantInput { name, email, role });
                }
            }
        }
    }

    v.finish()?;
    Ok(out)
}

/// Validate the structural prompt regions captured during recording.
pub fn validate_prompts(data: &Value) -> Result<Vec<PromptRegionInput>> {
    let mut v = CodeValidator::new("PROMPTS");
    let mut out = Vec::new();

    match data.as_array() {
        None => v.push("IS_NOT_LIST"),
        Some(items) if items.is_empty() => v.push("IS_EMPTY"),
        Some(items) => {
            for item in items {
                let topic_id = v.require_int(item, "topic_id");
                let start = interval(&mut v, item, "start_interval");
                let end = interval(&mut v, item, "end_interval");
                if let (Some(start), Some(end)) = (start, end) {
                    if start > end {
                        v.push("START_BEFORE_END");
                    }
                }
                if let (Some(topic_id), Some(start), Some(end)) = (topic_id, start, end) {
                    out.push(PromptRegionInput {
                        topic_id,
                        start_interval: start,
                        end_interval: end,
                    });
                }
            }
        }
    }

    v.finish()?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Consent decisions
// ---------------------------------------------------------------------------

/// Validate a consent decision body: `{"consent": "public" | "private" | "delete"}`.
pub fn validate_consent(data: &Value) -> Result<crate::consent::Consent> {
    let mut v = CodeValidator::new("CONSENT");

    let consent = match v.require_str(data, "consent") {
        Some(raw) => {
            let parsed = crate::consent::Consent::parse(raw);
            if parsed.is_none() {
                v.push("CONSENT_INVALID");
            }
            parsed
        }
        None => None,
    };

    v.finish()?;
    Ok(consent.expect("validated consent"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes_of(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation { codes } => codes,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_annotation_valid() {
        let body = json!({
            "content": "Interesting turn of phrase here",
            "start_interval": 1000,
            "end_interval": 2500,
            "tags": [1, 3]
        });
        let input = validate_annotation(&body, &[1, 2, 3]).unwrap();
        assert_eq!(input.tags, vec![1, 3]);
        assert_eq!(input.start_interval, 1000);
    }

    #[test]
    fn test_annotation_start_before_end() {
        let body = json!({"content": "x", "start_interval": 10, "end_interval": 5});
        let codes = codes_of(validate_annotation(&body, &[]).unwrap_err());
        assert!(codes.iter().any(|c| c.contains("START_BEFORE_END")), "{codes:?}");
    }

    #[test]
    fn test_annotation_tag_not_int() {
        let body = json!({"content": "x", "start_interval": 0, "end_interval": 5, "tags": [1, "x"]});
        let codes = codes_of(validate_annotation(&body, &[1]).unwrap_err());
        assert!(codes.iter().any(|c| c.contains("TAG_IS_NOT_INT")), "{codes:?}");
    }

    #[test]
    fn test_annotation_tag_unknown() {
        let body = json!({"content": "x", "start_interval": 0, "end_interval": 5, "tags": [9]});
        let codes = codes_of(validate_annotation(&body, &[1, 2]).unwrap_err());
        assert_eq!(codes, vec!["USER_ANNOTATIONS_TAG_NOT_IN_CODEBOOK"]);
    }

    #[test]
    fn test_annotation_accumulates_all_codes() {
        // Not fail-fast: every violated rule is reported at once
        let body = json!({"start_interval": -2, "end_interval": "soon", "tags": "many"});
        let codes = codes_of(validate_annotation(&body, &[]).unwrap_err());
        assert!(codes.contains(&"USER_ANNOTATIONS_CONTENT_KEY_REQUIRED".to_string()));
        assert!(codes.contains(&"USER_ANNOTATIONS_START_INTERVAL_MUST_BE_POSITIVE_INT".to_string()));
        assert!(codes.contains(&"USER_ANNOTATIONS_END_INTERVAL_IS_NOT_INT".to_string()));
        assert!(codes.contains(&"USER_ANNOTATIONS_TAGS_IS_NOT_LIST".to_string()));
    }

    #[test]
    fn test_comment_requires_content() {
        let codes = codes_of(validate_comment(&json!({"content": "  "})).unwrap_err());
        assert_eq!(codes, vec!["COMMENTS_CONTENT_IS_EMPTY"]);
    }

    #[test]
    fn test_project_create_valid() {
        let body = json!({
            "title": "My Study",
            "description": "Conversations about the neighbourhood",
            "privacy": "private",
            "topics": ["Where did you grow up?"]
        });
        let draft = validate_project_create(&body);
        assert!(draft.check_slug);
        let input = draft.finish().unwrap();
        assert_eq!(input.slug, "my-study");
        assert!(!input.is_public);
    }

    #[test]
    fn test_project_privacy_invalid() {
        let body = json!({
            "title": "My Study",
            "description": "d",
            "privacy": "friends",
            "topics": []
        });
        let codes = codes_of(validate_project_create(&body).finish().unwrap_err());
        assert!(codes.contains(&"PROJECTS_PRIVACY_INVALID".to_string()));
    }

    #[test]
    fn test_project_slug_collision_flag() {
        let body = json!({
            "title": "My Study",
            "description": "d",
            "privacy": "public",
            "topics": []
        });
        let mut draft = validate_project_create(&body);
        draft.reject_slug_taken();
        let codes = codes_of(draft.finish().unwrap_err());
        assert_eq!(codes, vec!["PROJECTS_TITLE_EXISTS"]);
    }

    #[test]
    fn test_project_update_slug_only_on_title_change() {
        let body = json!({
            "title": "My Study",
            "description": "updated",
            "privacy": "public",
            "topics": []
        });
        let draft = validate_project_update(&body, "My Study", "my-study");
        assert!(!draft.check_slug);
        assert_eq!(draft.finish().unwrap().slug, "my-study");

        let renamed = json!({
            "title": "Our Study",
            "description": "updated",
            "privacy": "public",
            "topics": []
        });
        let draft = validate_project_update(&renamed, "My Study", "my-study");
        assert!(draft.check_slug);
        assert_eq!(draft.finish().unwrap().slug, "our-study");
    }

    #[test]
    fn test_participants_must_not_be_empty() {
        let codes = codes_of(validate_participants(&json!([])).unwrap_err());
        assert_eq!(codes, vec!["PARTICIPANTS_IS_EMPTY"]);
    }

    #[test]
    fn test_participants_roles() {
        let body = json!([
            {"name": "Ada", "email": "ada@example.com", "role": "interviewer"},
            {"name": "Brin", "email": "brin@example.com", "role": "interviewee"}
        ]);
        let participants = validate_participants(&body).unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].role, SessionRole::Interviewer);
    }

    #[test]
    fn test_participant_bad_email_and_role() {
        let body = json!([{"name": "Ada", "email": "nowhere", "role": "observer"}]);
        let codes = codes_of(validate_participants(&body).unwrap_err());
        assert!(codes.contains(&"PARTICIPANTS_EMAIL_INVALID".to_string()));
        assert!(codes.contains(&"PARTICIPANTS_ROLE_INVALID".to_string()));
    }

    #[test]
    fn test_consent_body() {
        assert_eq!(
            validate_consent(&json!({"consent": "public"})).unwrap(),
            crate::consent::Consent::Public
        );
        let codes = codes_of(validate_consent(&json!({"consent": "everyone"})).unwrap_err());
        assert_eq!(codes, vec!["CONSENT_CONSENT_INVALID"]);
    }
}
