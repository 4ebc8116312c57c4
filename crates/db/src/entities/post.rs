//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub text: String,

    /// Sum of all updoot values for this post (denormalized).
    ///
    /// Only the vote coordinator writes this column, always as a relative
    /// delta inside the vote transaction.
    #[sea_orm(default_value = 0)]
    pub points: i32,

    /// Author user ID
    #[sea_orm(indexed)]
    pub creator_id: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,

    #[sea_orm(has_many = "super::updoot::Entity")]
    Updoot,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::updoot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Updoot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
