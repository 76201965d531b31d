//! Payment recording.
//!
//! A successful payment is stored as COMPLETED and drives the order from PENDING to
//! PROCESSING in the same transaction. Failed attempts are kept as FAILED rows and do not
//! touch the order, so the caller can retry. An order has at most one COMPLETED payment.

use crate::{
    core::order,
    entities::{OrderStatus, Payment, PaymentMethod, PaymentStatus, payment},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, warn};

/// All payment attempts for an order, oldest first.
pub async fn get_payments_for_order(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<payment::Model>> {
    Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The COMPLETED payment of an order, if it has been paid.
pub async fn get_completed_payment<C>(db: &C, order_id: i64) -> Result<Option<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .filter(payment::Column::Status.eq(PaymentStatus::Completed))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Records a successful payment for the full order total and moves the order to
/// PROCESSING.
///
/// # Errors
/// - `InvalidArgument` if `transaction_id` is blank
/// - `NotFound` if the order does not exist
/// - `InvalidOrderState` if the order is already paid or is not PENDING
pub async fn process_payment(
    db: &DatabaseConnection,
    order_id: i64,
    method: PaymentMethod,
    transaction_id: &str,
) -> Result<payment::Model> {
    let transaction_id = transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(Error::InvalidArgument {
            message: "Transaction id cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;

    let target = order::require_order(&txn, order_id).await?;

    if let Some(existing) = get_completed_payment(&txn, order_id).await? {
        return Err(Error::InvalidOrderState {
            message: format!(
                "Order {order_id} is already paid (payment {})",
                existing.id
            ),
        });
    }

    let amount = target.total_amount;
    // Validates PENDING → PROCESSING before the payment row is written
    order::ensure_transition(target.status, OrderStatus::Processing)?;

    let now = Utc::now();
    let payment = payment::ActiveModel {
        order_id: Set(order_id),
        method: Set(method),
        status: Set(PaymentStatus::Completed),
        transaction_id: Set(Some(transaction_id.to_string())),
        amount: Set(amount),
        payment_date: Set(Some(now)),
        failure_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    order::transition_in(&txn, target, OrderStatus::Processing, "Payment processed").await?;
    txn.commit().await?;

    info!(order_id, payment_id = payment.id, amount, "Payment processed");
    Ok(payment)
}

/// Records a failed payment attempt. The order stays PENDING.
///
/// # Errors
/// - `NotFound` if the order does not exist
/// - `InvalidOrderState` if the order is not PENDING
pub async fn record_failed_payment(
    db: &DatabaseConnection,
    order_id: i64,
    method: PaymentMethod,
    reason: &str,
) -> Result<payment::Model> {
    let target = order::require_order(db, order_id).await?;
    order::ensure_pending(&target, "record a payment for")?;

    let now = Utc::now();
    let payment = payment::ActiveModel {
        order_id: Set(order_id),
        method: Set(method),
        status: Set(PaymentStatus::Failed),
        transaction_id: Set(None),
        amount: Set(target.total_amount),
        payment_date: Set(None),
        failure_reason: Set(Some(reason.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    warn!(order_id, reason, "Payment failed");
    Ok(payment)
}
