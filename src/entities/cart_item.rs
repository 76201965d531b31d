//! Cart item entity - One product line inside a cart.
//!
//! There is at most one line per (cart, product) pair. `unit_price` is the product
//! price captured when the line was first added.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning cart
    pub cart_id: i64,
    /// Referenced product
    pub product_id: i64,
    /// Units requested, always positive
    pub quantity: i32,
    /// Price snapshot per unit
    pub unit_price: f64,
    /// When the line was created
    pub created_at: DateTimeUtc,
    /// When the line was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Line total (`unit_price × quantity`).
    #[must_use]
    pub fn total_price(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Defines relationships between CartItem and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one cart and is deleted with it
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id",
        on_delete = "Cascade"
    )]
    Cart,
    /// Each line references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
