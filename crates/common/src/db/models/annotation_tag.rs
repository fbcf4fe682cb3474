//! Annotation-to-code association
//!
//! Many-to-many join between annotations and codebook entries; codes are
//! shared references, never owned by an annotation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "annotation_tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub annotation_id: i64,

    #[sea_orm(primary_key, auto_increment = false)]
    pub code_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::annotation::Entity",
        from = "Column::AnnotationId",
        to = "super::annotation::Column::Id"
    )]
    Annotation,

    #[sea_orm(
        belongs_to = "super::code::Entity",
        from = "Column::CodeId",
        to = "super::code::Column::Id"
    )]
    Code,
}

impl Related<super::annotation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Annotation.def()
    }
}

impl Related<super::code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Code.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
