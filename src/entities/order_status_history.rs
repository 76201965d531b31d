//! Order status history entity - Append-only log of status changes.
//!
//! One row is written for every transition, including the initial PENDING entry
//! created at checkout.

use super::order::OrderStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status history database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_status_history")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order whose status changed
    pub order_id: i64,
    /// Status the order moved into
    pub status: OrderStatus,
    /// Free-text reason supplied with the transition
    pub comment: String,
    /// When the transition happened
    pub timestamp: DateTimeUtc,
}

/// Defines relationships between OrderStatusHistory and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one order and is deleted with it
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
