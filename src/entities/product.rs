//! Product entity - A sellable catalog item and its stock count.
//!
//! `quantity` is the authoritative inventory for the product. It is never negative and
//! is only written through `core::inventory::adjust_stock`. Cart and order lines
//! reference products but never own them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Desk Lamp")
    pub name: String,
    /// Current list price per unit
    pub price: f64,
    /// Units in stock
    pub quantity: i32,
    /// Inactive products cannot be added to carts
    pub active: bool,
    /// Catalog category, if assigned
    pub category_id: Option<i64>,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product optionally belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// Cart lines referencing this product
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    /// Order lines referencing this product
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
