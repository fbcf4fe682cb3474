//! Code entity
//!
//! One textual tag within a codebook.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub codebook_id: i64,

    #[sea_orm(column_type = "Text")]
    pub text: String,

    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::codebook::Entity",
        from = "Column::CodebookId",
        to = "super::codebook::Column::Id"
    )]
    Codebook,

    #[sea_orm(has_many = "super::annotation_tag::Entity")]
    Tags,
}

impl Related<super::codebook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Codebook.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
