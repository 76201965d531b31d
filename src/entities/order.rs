//! Order entity - A placed order and its lifecycle status.
//!
//! `total_amount` always equals the sum of the order's line totals. `status` only moves
//! along the edges of [`OrderStatus::allowed_transitions`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status, persisted as an upper-case string.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum OrderStatus {
    /// Created from a cart, awaiting payment
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Paid, being prepared
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    /// Handed to the carrier
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    /// Received by the customer
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    /// Cancelled before shipping (terminal)
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    /// Sent back after shipping (terminal)
    #[sea_orm(string_value = "RETURNED")]
    Returned,
}

impl OrderStatus {
    /// Transition table: the statuses reachable in one step from `self`.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered, Self::Returned],
            Self::Delivered => &[Self::Returned],
            Self::Cancelled | Self::Returned => &[],
        }
    }

    /// Whether `self → next` is an edge of the transition table.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Terminal statuses accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// Upper-case name, identical to the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer who placed the order
    pub user_id: i64,
    /// Calendar date the order was placed
    pub order_date: Date,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Sum of `unit_price × quantity` over all order items
    pub total_amount: f64,
    /// Street address for delivery
    pub shipping_address: Option<String>,
    /// Delivery city
    pub shipping_city: Option<String>,
    /// Delivery postal code
    pub shipping_zip_code: Option<String>,
    /// Delivery country
    pub shipping_country: Option<String>,
    /// Carrier tracking number once shipped
    pub tracking_number: Option<String>,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One order owns many items
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    /// One order owns its status history
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
    /// One order owns its payment attempts
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
