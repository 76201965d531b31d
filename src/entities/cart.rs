//! Cart entity - The mutable pre-order basket.
//!
//! A user has at most one cart with `active = true`. Anonymous carts have no `user_id`
//! and are folded into a user's cart at login. Carts are deactivated, not deleted,
//! when converted into an order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    /// Unique identifier for the cart
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user, `None` for anonymous carts
    pub user_id: Option<i64>,
    /// Only active carts can be mutated or checked out
    pub active: bool,
    /// When the cart was created
    pub created_at: DateTimeUtc,
    /// Touched by every cart mutation
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Cart and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each cart optionally belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One cart owns many cart items
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
