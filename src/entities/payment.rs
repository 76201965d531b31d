//! Payment entity - A recorded payment attempt for an order.
//!
//! Payments start PENDING and end COMPLETED or FAILED; both end states are terminal.
//! An order has at most one COMPLETED payment. Failed attempts are kept as history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How the customer paid.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum PaymentMethod {
    /// Credit card
    #[sea_orm(string_value = "CREDIT_CARD")]
    CreditCard,
    /// Debit card
    #[sea_orm(string_value = "DEBIT_CARD")]
    DebitCard,
    /// PayPal account
    #[sea_orm(string_value = "PAYPAL")]
    PayPal,
    /// Bank transfer
    #[sea_orm(string_value = "BANK_TRANSFER")]
    BankTransfer,
    /// Cash paid on delivery
    #[sea_orm(string_value = "CASH_ON_DELIVERY")]
    CashOnDelivery,
}

/// Outcome of a payment attempt.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentStatus {
    /// Awaiting confirmation
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Money received
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Declined or errored
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order being paid for
    pub order_id: i64,
    /// Payment method chosen by the customer
    pub method: PaymentMethod,
    /// Outcome of the attempt
    pub status: PaymentStatus,
    /// External transaction reference, present once completed
    pub transaction_id: Option<String>,
    /// Amount charged (the order total at payment time)
    pub amount: f64,
    /// When the payment completed
    pub payment_date: Option<DateTimeUtc>,
    /// Reason recorded for a failed attempt
    pub failure_reason: Option<String>,
    /// When the payment row was created
    pub created_at: DateTimeUtc,
    /// When the payment row was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one order and is deleted with it
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
