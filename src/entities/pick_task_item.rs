use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pick_task_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pick_task_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub requested_qty: i32,
    pub picked_qty: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pick_task::Entity",
        from = "Column::PickTaskId",
        to = "super::pick_task::Column::Id"
    )]
    PickTask,
}

impl Related<super::pick_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickTask.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
