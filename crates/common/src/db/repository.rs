//! Repository for database operations
//!
//! All data access goes through here. Soft-deleted rows are excluded by
//! the default finders; callers that need deleted rows say so explicitly
//! through the `*_including_deleted` variants, so intent is visible at
//! every call site. Multi-row mutations run in a single transaction with
//! commit-or-discard semantics.

use crate::consent::Consent;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::validate::{AnnotationInput, CommentInput};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

/// A participant to attach to a session at creation time
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub user_id: i64,
    pub role: SessionRole,
}

/// A structural prompt region to attach to a session at creation time
#[derive(Debug, Clone)]
pub struct NewPromptRegion {
    pub topic_id: i64,
    pub start_interval: i64,
    pub end_interval: i64,
}

/// Given all active membership rows for one (user, project), pick the one
/// that leave must deactivate. Ids are monotonic, so highest id wins.
fn latest_membership(rows: &[Membership]) -> Option<&Membership> {
    rows.iter().max_by_key(|m| m.id)
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a registered user with a password hash
    pub async fn create_user(
        &self,
        fullname: String,
        email: String,
        password_hash: String,
    ) -> Result<User> {
        let now = Utc::now();

        let user = UserActiveModel {
            fullname: Set(fullname),
            email: Set(email),
            password_hash: Set(Some(password_hash)),
            registered: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Create a stub account for a participant named in an upload who is
    /// not yet known to the system
    pub async fn create_unregistered_user(&self, fullname: String, email: String) -> Result<User> {
        let now = Utc::now();

        let user = UserActiveModel {
            fullname: Set(fullname),
            email: Set(email),
            password_hash: Set(None),
            registered: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Claim a participant stub created from an upload: set the password
    /// and mark the account registered.
    pub async fn claim_unregistered_user(
        &self,
        user: User,
        fullname: String,
        password_hash: String,
    ) -> Result<User> {
        let mut active: UserActiveModel = user.into();
        active.fullname = Set(fullname);
        active.password_hash = Set(Some(password_hash));
        active.registered = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Project Operations
    // ========================================================================

    /// Find an active project by ID
    pub async fn find_project(&self, id: i64) -> Result<Option<Project>> {
        ProjectEntity::find_by_id(id)
            .filter(ProjectColumn::IsActive.eq(true))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a project by ID, soft-deleted rows included
    pub async fn find_project_including_deleted(&self, id: i64) -> Result<Option<Project>> {
        ProjectEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Slug collision check. Deleted projects keep their slug reserved, so
    /// this always looks across both active and deleted rows.
    pub async fn slug_taken(&self, slug: &str) -> Result<bool> {
        let found = ProjectEntity::find()
            .filter(ProjectColumn::Slug.eq(slug))
            .one(self.read_conn())
            .await?;
        Ok(found.is_some())
    }

    /// All active projects visible to the given user: public projects plus
    /// the private ones they hold an active membership in.
    pub async fn list_projects_visible_to(&self, user_id: Option<i64>) -> Result<Vec<Project>> {
        let mut projects = ProjectEntity::find()
            .filter(ProjectColumn::IsActive.eq(true))
            .filter(ProjectColumn::IsPublic.eq(true))
            .order_by_desc(ProjectColumn::CreatedAt)
            .all(self.read_conn())
            .await?;

        if let Some(user_id) = user_id {
            let memberships = MembershipEntity::find()
                .filter(MembershipColumn::UserId.eq(user_id))
                .filter(MembershipColumn::Deactivated.eq(false))
                .filter(MembershipColumn::Confirmed.eq(true))
                .all(self.read_conn())
                .await?;

            for membership in memberships {
                if projects.iter().any(|p| p.id == membership.project_id) {
                    continue;
                }
                if let Some(project) = self.find_project(membership.project_id).await? {
                    projects.push(project);
                }
            }
        }

        Ok(projects)
    }

    /// Create a project and its initial topics in one transaction.
    /// The slug must already be validated for collisions.
    pub async fn create_project(
        &self,
        creator_id: i64,
        title: String,
        slug: String,
        description: String,
        is_public: bool,
        topics: Vec<String>,
    ) -> Result<Project> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let project = ProjectActiveModel {
            title: Set(title),
            slug: Set(slug),
            description: Set(description),
            is_public: Set(is_public),
            is_active: Set(true),
            creator_id: Set(creator_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let project = project.insert(&txn).await?;

        for text in topics {
            let topic = TopicActiveModel {
                project_id: Set(project.id),
                text: Set(text),
                is_active: Set(true),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            };
            topic.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(project)
    }

    /// Update a project's fields and reconcile its topic list in one
    /// transaction: topics missing from `topics` are soft-deleted, new
    /// texts are appended.
    pub async fn update_project(
        &self,
        project: Project,
        title: String,
        slug: String,
        description: String,
        is_public: bool,
        topics: Vec<String>,
    ) -> Result<Project> {
        let now = Utc::now();
        let project_id = project.id;
        let txn = self.write_conn().begin().await?;

        let mut active: ProjectActiveModel = project.into();
        active.title = Set(title);
        active.slug = Set(slug);
        active.description = Set(description);
        active.is_public = Set(is_public);
        active.updated_at = Set(now.into());
        let updated = active.update(&txn).await?;

        let existing = TopicEntity::find()
            .filter(TopicColumn::ProjectId.eq(project_id))
            .filter(TopicColumn::IsActive.eq(true))
            .all(&txn)
            .await?;

        for topic in &existing {
            if !topics.iter().any(|t| *t == topic.text) {
                let mut gone: TopicActiveModel = topic.clone().into();
                gone.is_active = Set(false);
                gone.updated_at = Set(now.into());
                gone.update(&txn).await?;
            }
        }

        for text in topics {
            if !existing.iter().any(|t| t.text == text) {
                let topic = TopicActiveModel {
                    project_id: Set(project_id),
                    text: Set(text),
                    is_active: Set(true),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                topic.insert(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Soft-delete a project. The row and its slug remain.
    pub async fn soft_delete_project(&self, project: Project) -> Result<Project> {
        let mut active: ProjectActiveModel = project.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Active topics for a project
    pub async fn active_topics_for_project(&self, project_id: i64) -> Result<Vec<Topic>> {
        TopicEntity::find()
            .filter(TopicColumn::ProjectId.eq(project_id))
            .filter(TopicColumn::IsActive.eq(true))
            .order_by_asc(TopicColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Membership Operations
    // ========================================================================

    /// The user's active membership for a project, if any
    pub async fn active_membership(&self, user_id: i64, project_id: i64) -> Result<Option<Membership>> {
        let rows = MembershipEntity::find()
            .filter(MembershipColumn::UserId.eq(user_id))
            .filter(MembershipColumn::ProjectId.eq(project_id))
            .filter(MembershipColumn::Deactivated.eq(false))
            .all(self.read_conn())
            .await?;
        Ok(latest_membership(&rows).cloned())
    }

    /// Every membership row for (user, project), deactivated history included
    pub async fn membership_history(&self, user_id: i64, project_id: i64) -> Result<Vec<Membership>> {
        MembershipEntity::find()
            .filter(MembershipColumn::UserId.eq(user_id))
            .filter(MembershipColumn::ProjectId.eq(project_id))
            .order_by_desc(MembershipColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Active, confirmed members of a project
    pub async fn members_of_project(&self, project_id: i64) -> Result<Vec<Membership>> {
        MembershipEntity::find()
            .filter(MembershipColumn::ProjectId.eq(project_id))
            .filter(MembershipColumn::Deactivated.eq(false))
            .filter(MembershipColumn::Confirmed.eq(true))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Join a project. Appends a fresh confirmed row; if an active row
    /// already exists it is returned unchanged, preserving the invariant
    /// of at most one active row per (user, project).
    pub async fn join_project(&self, user_id: i64, project_id: i64) -> Result<Membership> {
        if let Some(existing) = self.active_membership(user_id, project_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let membership = MembershipActiveModel {
            user_id: Set(user_id),
            project_id: Set(project_id),
            role: Set(String::from(MemberRole::Participant)),
            confirmed: Set(true),
            deactivated: Set(false),
            date_sent: Set(now.into()),
            date_accepted: Set(now.into()),
            ..Default::default()
        };

        membership.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Leave a project: deactivate the most recent active membership row,
    /// keeping the full join/leave history.
    pub async fn leave_project(&self, user_id: i64, project_id: i64) -> Result<Membership> {
        let rows = MembershipEntity::find()
            .filter(MembershipColumn::UserId.eq(user_id))
            .filter(MembershipColumn::ProjectId.eq(project_id))
            .filter(MembershipColumn::Deactivated.eq(false))
            .all(self.write_conn())
            .await?;

        let target = latest_membership(&rows)
            .cloned()
            .ok_or_else(AppError::membership_not_found)?;

        let mut active: MembershipActiveModel = target.into();
        active.deactivated = Set(true);
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Create a session with its participants and structural prompt
    /// regions in one transaction. Callers must have uploaded the
    /// recording first: a storage failure means this never runs, so no
    /// session row can reference a missing recording.
    pub async fn create_session(
        &self,
        session_id: String,
        creator_id: i64,
        project_id: i64,
        participants: Vec<NewParticipant>,
        prompts: Vec<NewPromptRegion>,
    ) -> Result<InterviewSession> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let session = SessionActiveModel {
            id: Set(session_id.clone()),
            creator_id: Set(creator_id),
            project_id: Set(project_id),
            created_at: Set(now.into()),
        };
        let session = session.insert(&txn).await?;

        for p in participants {
            let participant = ParticipantActiveModel {
                user_id: Set(p.user_id),
                session_id: Set(session_id.clone()),
                consent_type: Set(String::from(Consent::default())),
                role: Set(String::from(p.role)),
                ..Default::default()
            };
            participant.insert(&txn).await?;
        }

        for region in prompts {
            let row = SessionTopicActiveModel {
                session_id: Set(session_id.clone()),
                topic_id: Set(region.topic_id),
                start_interval: Set(region.start_interval),
                end_interval: Set(region.end_interval),
                ..Default::default()
            };
            row.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(session)
    }

    /// Find session by ID
    pub async fn find_session(&self, id: &str) -> Result<Option<InterviewSession>> {
        SessionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// All sessions of a project, newest first
    pub async fn sessions_for_project(&self, project_id: i64) -> Result<Vec<InterviewSession>> {
        SessionEntity::find()
            .filter(SessionColumn::ProjectId.eq(project_id))
            .order_by_desc(SessionColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Participants of a session
    pub async fn participants_for_session(&self, session_id: &str) -> Result<Vec<SessionParticipant>> {
        ParticipantEntity::find()
            .filter(ParticipantColumn::SessionId.eq(session_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Structural prompt regions of a session
    pub async fn prompt_regions_for_session(&self, session_id: &str) -> Result<Vec<SessionTopic>> {
        SessionTopicEntity::find()
            .filter(SessionTopicColumn::SessionId.eq(session_id))
            .order_by_asc(SessionTopicColumn::StartInterval)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The consent multiset for a session, read fresh on every call.
    /// Visibility decisions are never cached, so a revocation takes
    /// effect on the next read.
    pub async fn consents_for_session(&self, session_id: &str) -> Result<Vec<Consent>> {
        let participants = self.participants_for_session(session_id).await?;
        Ok(participants.iter().map(|p| p.consent()).collect())
    }

    /// Record a participant's consent decision. Last write wins; the
    /// resolver re-reads on every request, so no locking is needed.
    pub async fn update_consent(
        &self,
        session_id: &str,
        user_id: i64,
        consent: Consent,
    ) -> Result<SessionParticipant> {
        let participant = ParticipantEntity::find()
            .filter(ParticipantColumn::SessionId.eq(session_id))
            .filter(ParticipantColumn::UserId.eq(user_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(AppError::session_not_found)?;

        let mut active: ParticipantActiveModel = participant.into();
        active.consent_type = Set(String::from(consent));
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Annotation Operations
    // ========================================================================

    /// Create an annotation and its tag associations in one transaction.
    /// The input must already be validated against the project codebook.
    pub async fn create_annotation(
        &self,
        session_id: &str,
        user_id: i64,
        input: &AnnotationInput,
    ) -> Result<Annotation> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let annotation = AnnotationActiveModel {
            session_id: Set(session_id.to_owned()),
            user_id: Set(user_id),
            content: Set(input.content.clone()),
            start_interval: Set(input.start_interval),
            end_interval: Set(input.end_interval),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let annotation = annotation.insert(&txn).await?;

        for code_id in &input.tags {
            let tag = AnnotationTagActiveModel {
                annotation_id: Set(annotation.id),
                code_id: Set(*code_id),
            };
            tag.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(annotation)
    }

    /// Find an annotation regardless of soft-delete state
    pub async fn find_annotation_including_deleted(&self, id: i64) -> Result<Option<Annotation>> {
        AnnotationEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find an active annotation by ID
    pub async fn find_annotation(&self, id: i64) -> Result<Option<Annotation>> {
        AnnotationEntity::find_by_id(id)
            .filter(AnnotationColumn::IsActive.eq(true))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Active annotations of a session, newest first
    pub async fn active_annotations_for_session(&self, session_id: &str) -> Result<Vec<Annotation>> {
        AnnotationEntity::find()
            .filter(AnnotationColumn::SessionId.eq(session_id))
            .filter(AnnotationColumn::IsActive.eq(true))
            .order_by_desc(AnnotationColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Soft-delete an annotation
    pub async fn soft_delete_annotation(&self, annotation: Annotation) -> Result<Annotation> {
        let mut active: AnnotationActiveModel = annotation.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Codes tagged on an annotation
    pub async fn tags_for_annotation(&self, annotation_id: i64) -> Result<Vec<Code>> {
        let tags = AnnotationTagEntity::find()
            .filter(AnnotationTagColumn::AnnotationId.eq(annotation_id))
            .all(self.read_conn())
            .await?;

        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let code_ids: Vec<i64> = tags.iter().map(|t| t.code_id).collect();
        CodeEntity::find()
            .filter(CodeColumn::Id.is_in(code_ids))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Comment Operations
    // ========================================================================

    /// Create a comment on an annotation. Threading is one level deep:
    /// a parent, when given, must be a root comment of the same
    /// annotation.
    pub async fn create_comment(
        &self,
        annotation_id: i64,
        user_id: i64,
        input: &CommentInput,
    ) -> Result<AnnotationComment> {
        if let Some(parent_id) = input.parent_id {
            let parent = CommentEntity::find_by_id(parent_id)
                .filter(CommentColumn::IsActive.eq(true))
                .one(self.write_conn())
                .await?
                .ok_or_else(|| AppError::validation("COMMENTS_PARENT_NOT_FOUND"))?;

            if parent.annotation_id != annotation_id {
                return Err(AppError::validation("COMMENTS_PARENT_WRONG_ANNOTATION"));
            }
            if !parent.is_root() {
                return Err(AppError::validation("COMMENTS_PARENT_IS_NOT_ROOT"));
            }
        }

        let now = Utc::now();
        let comment = CommentActiveModel {
            annotation_id: Set(annotation_id),
            user_id: Set(user_id),
            parent_id: Set(input.parent_id),
            content: Set(input.content.clone()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        comment.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Active comments of an annotation, roots and replies together,
    /// newest first
    pub async fn comments_for_annotation(&self, annotation_id: i64) -> Result<Vec<AnnotationComment>> {
        CommentEntity::find()
            .filter(CommentColumn::AnnotationId.eq(annotation_id))
            .filter(CommentColumn::IsActive.eq(true))
            .order_by_desc(CommentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Codebook Operations
    // ========================================================================

    /// The codebook of a project, if one exists
    pub async fn codebook_for_project(&self, project_id: i64) -> Result<Option<Codebook>> {
        CodebookEntity::find()
            .filter(CodebookColumn::ProjectId.eq(project_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Active codes of a project's codebook
    pub async fn active_codes_for_project(&self, project_id: i64) -> Result<Vec<Code>> {
        let Some(codebook) = self.codebook_for_project(project_id).await? else {
            return Ok(Vec::new());
        };

        CodeEntity::find()
            .filter(CodeColumn::CodebookId.eq(codebook.id))
            .filter(CodeColumn::IsActive.eq(true))
            .order_by_asc(CodeColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a codebook for a project
    pub async fn create_codebook(&self, project_id: i64, name: String) -> Result<Codebook> {
        let codebook = CodebookActiveModel {
            project_id: Set(project_id),
            name: Set(name),
            ..Default::default()
        };
        codebook.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Add a code to a codebook
    pub async fn add_code(&self, codebook_id: i64, text: String) -> Result<Code> {
        let code = CodeActiveModel {
            codebook_id: Set(codebook_id),
            text: Set(text),
            is_active: Set(true),
            ..Default::default()
        };
        code.insert(self.write_conn()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn membership(id: i64, deactivated: bool) -> Membership {
        let now = Utc::now();
        Membership {
            id,
            user_id: 1,
            project_id: 1,
            role: "participant".to_string(),
            confirmed: true,
            deactivated,
            date_sent: now.into(),
            date_accepted: now.into(),
        }
    }

    #[test]
    fn test_latest_membership_picks_highest_id() {
        let rows = vec![membership(3, false), membership(7, false), membership(5, false)];
        assert_eq!(latest_membership(&rows).unwrap().id, 7);
    }

    #[test]
    fn test_latest_membership_empty() {
        assert!(latest_membership(&[]).is_none());
    }
}
