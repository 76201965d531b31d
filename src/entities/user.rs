//! User entity - Represents a customer account in the user directory.
//!
//! Credentials live outside this crate; the core only needs identity (id, email)
//! and the `active` flag to resolve cart and order ownership.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login email, unique across all users
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub username: String,
    /// Default shipping address, if the user has one on file
    pub address: Option<String>,
    /// Inactive users cannot own new carts
    pub active: bool,
    /// When the user was created
    pub created_at: DateTimeUtc,
    /// When the user was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many carts (at most one active)
    #[sea_orm(has_many = "super::cart::Entity")]
    Carts,
    /// One user has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carts.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
