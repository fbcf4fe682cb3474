//! Session participant entity
//!
//! One row per person in a recorded conversation, holding their role and
//! their independently mutable consent decision.

use crate::consent::Consent;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role a participant played during the recording
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Interviewee,
    Interviewer,
}

impl SessionRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "interviewee" => Some(SessionRole::Interviewee),
            "interviewer" => Some(SessionRole::Interviewer),
            _ => None,
        }
    }
}

impl From<String> for SessionRole {
    fn from(s: String) -> Self {
        SessionRole::parse(&s).unwrap_or(SessionRole::Interviewee)
    }
}

impl From<SessionRole> for String {
    fn from(role: SessionRole) -> Self {
        match role {
            SessionRole::Interviewee => "interviewee".to_string(),
            SessionRole::Interviewer => "interviewer".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_participants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i64,

    pub session_id: String,

    /// "private", "public" or "delete"; defaults to "delete" (undecided)
    #[sea_orm(column_type = "Text")]
    pub consent_type: String,

    #[sea_orm(column_type = "Text")]
    pub role: String,
}

impl Model {
    pub fn consent(&self) -> Consent {
        Consent::from(self.consent_type.as_str())
    }

    pub fn session_role(&self) -> SessionRole {
        SessionRole::from(self.role.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [SessionRole::Interviewee, SessionRole::Interviewer] {
            assert_eq!(SessionRole::from(String::from(role)), role);
        }
        assert_eq!(SessionRole::parse("moderator"), None);
    }
}
