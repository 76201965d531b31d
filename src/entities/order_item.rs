//! Order item entity - A priced line of a placed order.
//!
//! `unit_price` is copied from the cart line at checkout, so later catalog price
//! changes never alter historical orders.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning order
    pub order_id: i64,
    /// Referenced product
    pub product_id: i64,
    /// Units ordered, always positive
    pub quantity: i32,
    /// Price snapshot per unit
    pub unit_price: f64,
}

impl Model {
    /// Line total (`unit_price × quantity`).
    #[must_use]
    pub fn total_price(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Defines relationships between OrderItem and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order and is deleted with it
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    /// Each line references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
