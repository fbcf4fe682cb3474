//! Project membership entity
//!
//! History preserving: leaving a project deactivates the most recent
//! active row rather than deleting it, and rejoining appends a fresh row.
//! At most one row per (user, project) is active at a time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role a member holds within a project
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Participant,
    Researcher,
    Administrator,
}

impl MemberRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "participant" => Some(MemberRole::Participant),
            "researcher" => Some(MemberRole::Researcher),
            "administrator" => Some(MemberRole::Administrator),
            _ => None,
        }
    }

    /// Roles that see all project sessions regardless of consent state
    pub fn is_privileged(&self) -> bool {
        matches!(self, MemberRole::Researcher | MemberRole::Administrator)
    }
}

impl From<String> for MemberRole {
    fn from(s: String) -> Self {
        MemberRole::parse(&s).unwrap_or(MemberRole::Participant)
    }
}

impl From<MemberRole> for String {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Participant => "participant".to_string(),
            MemberRole::Researcher => "researcher".to_string(),
            MemberRole::Administrator => "administrator".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i64,

    pub project_id: i64,

    #[sea_orm(column_type = "Text")]
    pub role: String,

    /// Whether the user accepted the membership
    pub confirmed: bool,

    /// Set on leave instead of deleting the row
    pub deactivated: bool,

    pub date_sent: DateTimeWithTimeZone,

    pub date_accepted: DateTimeWithTimeZone,
}

impl Model {
    pub fn member_role(&self) -> MemberRole {
        MemberRole::from(self.role.clone())
    }

    /// A membership only counts while confirmed and not deactivated
    pub fn is_active(&self) -> bool {
        self.confirmed && !self.deactivated
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
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [MemberRole::Participant, MemberRole::Researcher, MemberRole::Administrator] {
            assert_eq!(MemberRole::from(String::from(role)), role);
        }
        assert_eq!(MemberRole::parse("owner"), None);
    }

    #[test]
    fn test_privileged_roles() {
        assert!(!MemberRole::Participant.is_privileged());
        assert!(MemberRole::Researcher.is_privileged());
        assert!(MemberRole::Administrator.is_privileged());
    }
}
