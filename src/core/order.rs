//! Order lifecycle business logic.
//!
//! Checkout converts an active cart into a PENDING order, taking stock out of the
//! inventory ledger in the same transaction. Afterwards the order only moves along the
//! edges of [`OrderStatus::allowed_transitions`]; every status change goes through
//! [`ensure_transition`] and appends one row to the status history. Cancelling or
//! returning an order puts its units back into stock.

use crate::{
    core::{cart, inventory, order_item},
    entities::{
        Order, OrderStatus, OrderStatusHistory, Payment, User, order, order_item as item,
        order_status_history, payment,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, warn};

/// Where an order is shipped. Only the street address is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingDetails {
    /// Street address
    pub address: String,
    /// City
    pub city: Option<String>,
    /// Postal code
    pub zip_code: Option<String>,
    /// Country
    pub country: Option<String>,
}

impl ShippingDetails {
    /// Shipping details with only the street address set.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}

/// Partial update of an order's shipping fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingUpdate {
    /// New street address, must not be blank
    pub address: Option<String>,
    /// New city
    pub city: Option<String>,
    /// New postal code
    pub zip_code: Option<String>,
    /// New country
    pub country: Option<String>,
    /// Carrier tracking number
    pub tracking_number: Option<String>,
}

/// An order with everything hanging off it.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    /// The order row
    pub order: order::Model,
    /// Lines ordered by id
    pub items: Vec<item::Model>,
    /// Status changes, oldest first
    pub history: Vec<order_status_history::Model>,
    /// Payment attempts, oldest first
    pub payments: Vec<payment::Model>,
}

/// Criteria for [`filter_orders`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Orders placed by this user
    pub user_id: Option<i64>,
    /// Orders currently in this status
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on `order_date`
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on `order_date`
    pub end_date: Option<NaiveDate>,
    /// Inclusive lower bound on `total_amount`
    pub min_amount: Option<f64>,
}

/// Fails with `InvalidOrderState` unless `from → to` is an edge of the transition table.
pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidOrderState {
            message: format!("Invalid status transition from {from} to {to}"),
        })
    }
}

/// Finds an order by id.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<Option<order::Model>> {
    Order::find_by_id(order_id).one(db).await.map_err(Into::into)
}

/// Finds an order by id, failing with `NotFound` if it does not exist.
pub async fn require_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))
}

/// Fails with `InvalidOrderState` unless the order is still PENDING.
pub(crate) fn ensure_pending(order: &order::Model, action: &str) -> Result<()> {
    if order.status == OrderStatus::Pending {
        Ok(())
    } else {
        Err(Error::InvalidOrderState {
            message: format!(
                "Cannot {action} order {} in status {}",
                order.id, order.status
            ),
        })
    }
}

pub(crate) async fn append_history<C>(
    db: &C,
    order_id: i64,
    status: OrderStatus,
    comment: &str,
) -> Result<order_status_history::Model>
where
    C: ConnectionTrait,
{
    order_status_history::ActiveModel {
        order_id: Set(order_id),
        status: Set(status),
        comment: Set(comment.to_string()),
        timestamp: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Puts every line of an order back into stock.
async fn restore_stock<C>(db: &C, order_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    for line in order_item::get_order_items(db, order_id).await? {
        inventory::adjust_stock(db, line.product_id, line.quantity).await?;
    }
    Ok(())
}

/// Applies a validated status change inside the caller's transaction.
pub(crate) async fn transition_in<C>(
    db: &C,
    order: order::Model,
    new_status: OrderStatus,
    comment: &str,
) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let previous = order.status;
    ensure_transition(previous, new_status)?;

    let order_id = order.id;
    let mut active: order::ActiveModel = order.into();
    active.status = Set(new_status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    append_history(db, order_id, new_status, comment).await?;

    match new_status {
        OrderStatus::Cancelled | OrderStatus::Returned => {
            restore_stock(db, order_id).await?;
            debug!(order_id, status = %new_status, "Restored stock");
        }
        OrderStatus::Delivered => {
            info!(order_id, "Order delivered");
        }
        _ => {}
    }

    info!(order_id, from = %previous, to = %new_status, "Order status changed");
    Ok(updated)
}

/// Moves an order to `new_status` and records the change in its history.
///
/// Cancelling or returning an order restores every line's quantity to stock.
///
/// # Errors
/// - `NotFound` if the order does not exist
/// - `InvalidOrderState` if the transition is not allowed
pub async fn update_status(
    db: &DatabaseConnection,
    order_id: i64,
    new_status: OrderStatus,
    comment: &str,
) -> Result<order::Model> {
    let txn = db.begin().await?;

    let order = require_order(&txn, order_id).await?;
    let updated = transition_in(&txn, order, new_status, comment).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Cancels an order and restores its stock.
pub async fn cancel_order(
    db: &DatabaseConnection,
    order_id: i64,
    comment: &str,
) -> Result<order::Model> {
    update_status(db, order_id, OrderStatus::Cancelled, comment).await
}

/// Checks out an active cart: creates a PENDING order, takes its lines out of stock and
/// deactivates the cart.
///
/// Stock is validated for every line before anything is written; the first short line
/// fails the whole call and nothing changes.
///
/// # Errors
/// - `InvalidArgument` if the shipping address is blank
/// - `NotFound` if the cart does not exist
/// - `InvalidOrderState` if the cart is inactive, empty or anonymous
/// - `InsufficientInventory` if any line exceeds current stock
pub async fn create_order_from_cart(
    db: &DatabaseConnection,
    cart_id: i64,
    shipping: ShippingDetails,
) -> Result<OrderDetails> {
    if shipping.address.trim().is_empty() {
        return Err(Error::InvalidArgument {
            message: "Shipping address cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;

    let cart = cart::get_cart(&txn, cart_id)
        .await?
        .ok_or_else(|| Error::not_found("Cart", cart_id))?;

    if !cart.active {
        return Err(Error::InvalidOrderState {
            message: format!("Cart {cart_id} has already been checked out"),
        });
    }

    let lines = cart::get_cart_items(&txn, cart_id).await?;
    if lines.is_empty() {
        return Err(Error::InvalidOrderState {
            message: format!("Cannot create an order from empty cart {cart_id}"),
        });
    }

    let Some(user_id) = cart.user_id else {
        return Err(Error::InvalidOrderState {
            message: format!("Cart {cart_id} has no owner; merge it into a user cart first"),
        });
    };

    // Fail fast before any write
    for line in &lines {
        let product = crate::core::product::require_product(&txn, line.product_id).await?;
        inventory::ensure_available(&product, line.quantity)?;
    }

    let now = Utc::now();
    let order = order::ActiveModel {
        user_id: Set(user_id),
        order_date: Set(now.date_naive()),
        status: Set(OrderStatus::Pending),
        total_amount: Set(0.0),
        shipping_address: Set(Some(shipping.address.trim().to_string())),
        shipping_city: Set(shipping.city),
        shipping_zip_code: Set(shipping.zip_code),
        shipping_country: Set(shipping.country),
        tracking_number: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    append_history(&txn, order.id, OrderStatus::Pending, "Order created").await?;

    let mut total = 0.0;
    for line in &lines {
        inventory::adjust_stock(&txn, line.product_id, -line.quantity).await?;

        let created = item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        total += created.total_price();
    }

    let mut order: order::ActiveModel = order.into();
    order.total_amount = Set(total);
    let order = order.update(&txn).await?;

    let mut cart: crate::entities::cart::ActiveModel = cart.into();
    cart.active = Set(false);
    cart.updated_at = Set(now);
    cart.update(&txn).await?;

    let details = load_details(&txn, order).await?;
    txn.commit().await?;

    info!(
        order_id = details.order.id,
        cart_id,
        user_id,
        total = details.order.total_amount,
        "Order created from cart"
    );

    Ok(details)
}

/// Patches shipping fields and the tracking number. Only provided fields change.
///
/// # Errors
/// - `NotFound` if the order does not exist
/// - `InvalidArgument` if a provided address is blank
/// - `InvalidOrderState` if the order is in a terminal status
pub async fn update_shipping_details(
    db: &DatabaseConnection,
    order_id: i64,
    update: ShippingUpdate,
) -> Result<order::Model> {
    if update
        .address
        .as_deref()
        .is_some_and(|address| address.trim().is_empty())
    {
        return Err(Error::InvalidArgument {
            message: "Shipping address cannot be empty".to_string(),
        });
    }

    let order = require_order(db, order_id).await?;
    if order.status.is_terminal() {
        return Err(Error::InvalidOrderState {
            message: format!(
                "Cannot change shipping details of order {order_id} in status {}",
                order.status
            ),
        });
    }

    let mut active: order::ActiveModel = order.into();
    if let Some(address) = update.address {
        active.shipping_address = Set(Some(address.trim().to_string()));
    }
    if let Some(city) = update.city {
        active.shipping_city = Set(Some(city));
    }
    if let Some(zip_code) = update.zip_code {
        active.shipping_zip_code = Set(Some(zip_code));
    }
    if let Some(country) = update.country {
        active.shipping_country = Set(Some(country));
    }
    if let Some(tracking_number) = update.tracking_number {
        active.tracking_number = Set(Some(tracking_number));
    }
    active.updated_at = Set(Utc::now());

    active.update(db).await.map_err(Into::into)
}

/// Deletes a PENDING order together with its items, history and payments, restoring
/// its stock.
///
/// # Errors
/// - `NotFound` if the order does not exist
/// - `InvalidOrderState` if the order is past PENDING
pub async fn delete_order(db: &DatabaseConnection, order_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let order = require_order(&txn, order_id).await?;
    ensure_pending(&order, "delete")?;

    restore_stock(&txn, order_id).await?;

    crate::entities::OrderItem::delete_many()
        .filter(item::Column::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    OrderStatusHistory::delete_many()
        .filter(order_status_history::Column::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    Payment::delete_many()
        .filter(payment::Column::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    order.delete(&txn).await?;

    txn.commit().await?;

    warn!(order_id, "Deleted pending order");
    Ok(())
}

/// Recomputes `total_amount` from the order's lines and stores it.
pub(crate) async fn recalculate_total<C>(db: &C, order: order::Model) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let total: f64 = order_item::get_order_items(db, order.id)
        .await?
        .iter()
        .map(item::Model::total_price)
        .sum();

    let mut active: order::ActiveModel = order.into();
    active.total_amount = Set(total);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

async fn load_details<C>(db: &C, order: order::Model) -> Result<OrderDetails>
where
    C: ConnectionTrait,
{
    let items = order_item::get_order_items(db, order.id).await?;
    let history = status_history(db, order.id).await?;
    let payments = Payment::find()
        .filter(payment::Column::OrderId.eq(order.id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await?;

    Ok(OrderDetails {
        order,
        items,
        history,
        payments,
    })
}

async fn status_history<C>(db: &C, order_id: i64) -> Result<Vec<order_status_history::Model>>
where
    C: ConnectionTrait,
{
    OrderStatusHistory::find()
        .filter(order_status_history::Column::OrderId.eq(order_id))
        .order_by_asc(order_status_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads an order with its items, status history and payments.
pub async fn get_order_details(db: &DatabaseConnection, order_id: i64) -> Result<OrderDetails> {
    let order = require_order(db, order_id).await?;
    load_details(db, order).await
}

/// Status history of an order, oldest first.
pub async fn get_status_history(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<order_status_history::Model>> {
    status_history(db, order_id).await
}

/// Orders placed by a user, newest first.
pub async fn get_orders_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<order::Model>> {
    filter_orders(
        db,
        &OrderFilter {
            user_id: Some(user_id),
            ..Default::default()
        },
    )
    .await
}

/// Orders placed by the user with this email, newest first.
pub async fn get_orders_for_user_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Vec<order::Model>> {
    let user = User::find()
        .filter(crate::entities::user::Column::Email.eq(email))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", email))?;

    get_orders_for_user(db, user.id).await
}

/// Orders currently in `status`, newest first.
pub async fn get_orders_by_status(
    db: &DatabaseConnection,
    status: OrderStatus,
) -> Result<Vec<order::Model>> {
    filter_orders(
        db,
        &OrderFilter {
            status: Some(status),
            ..Default::default()
        },
    )
    .await
}

/// Orders whose `order_date` falls within `[start, end]`.
pub async fn get_orders_by_date_range(
    db: &DatabaseConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<order::Model>> {
    if start > end {
        return Err(Error::InvalidArgument {
            message: format!("Start date {start} is after end date {end}"),
        });
    }

    filter_orders(
        db,
        &OrderFilter {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        },
    )
    .await
}

/// Orders matching every set field of `filter`, newest first.
pub async fn filter_orders(
    db: &DatabaseConnection,
    filter: &OrderFilter,
) -> Result<Vec<order::Model>> {
    let mut query = Order::find();

    if let Some(user_id) = filter.user_id {
        query = query.filter(order::Column::UserId.eq(user_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(order::Column::Status.eq(status));
    }
    if let Some(start) = filter.start_date {
        query = query.filter(order::Column::OrderDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(order::Column::OrderDate.lte(end));
    }
    if let Some(min_amount) = filter.min_amount {
        query = query.filter(order::Column::TotalAmount.gte(min_amount));
    }

    query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The `limit` most recently created orders.
pub async fn get_recent_orders(db: &DatabaseConnection, limit: u64) -> Result<Vec<order::Model>> {
    Order::find()
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{entities::Product, test_utils::*};

    async fn stock(db: &DatabaseConnection, product_id: i64) -> i32 {
        Product::find_by_id(product_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    #[test]
    fn test_ensure_transition_message() {
        assert!(ensure_transition(OrderStatus::Pending, OrderStatus::Processing).is_ok());

        let error = ensure_transition(OrderStatus::Delivered, OrderStatus::Pending).unwrap_err();
        assert!(matches!(error, Error::InvalidOrderState { .. }));
        assert!(
            error
                .to_string()
                .contains("Invalid status transition from DELIVERED to PENDING")
        );
    }

    #[tokio::test]
    async fn test_checkout_totals_stock_and_cart() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 3).await?;
        let chair = create_test_product(&db, "Chair", 5.0, 1).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 3).await?;
        cart::add_product(&db, user_cart.id, chair.id, 1).await?;

        let details =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;

        assert_eq!(details.order.total_amount, 35.0);
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.order.user_id, user.id);
        assert_eq!(details.items.len(), 2);
        assert_eq!(details.history.len(), 1);
        assert_eq!(details.history[0].status, OrderStatus::Pending);
        assert_eq!(details.history[0].comment, "Order created");

        assert_eq!(stock(&db, lamp.id).await, 0);
        assert_eq!(stock(&db, chair.id).await, 0);

        let checked_out = cart::get_cart(&db, user_cart.id).await?.unwrap();
        assert!(!checked_out.active);

        // The next get-or-create yields a fresh cart
        let next = cart::get_or_create_active_cart(&db, user.id).await?;
        assert_ne!(next.id, user_cart.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_uses_cart_price_snapshot() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 2).await?;
        crate::core::product::update_product_price(&db, lamp.id, 12.5).await?;

        let details =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;

        assert_eq!(details.items[0].unit_price, 10.0);
        assert_eq!(details.order.total_amount, 20.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_shortfall_changes_nothing() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let chair = create_test_product(&db, "Chair", 15.0, 3).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 2).await?;
        cart::add_product(&db, user_cart.id, chair.id, 3).await?;

        // Another buyer takes one chair after it was added to this cart
        inventory::adjust_stock(&db, chair.id, -1).await?;

        let result =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientInventory {
                available: 2,
                requested: 3,
                ..
            })
        ));

        assert_eq!(stock(&db, lamp.id).await, 5);
        assert_eq!(stock(&db, chair.id).await, 2);
        assert!(cart::get_cart(&db, user_cart.id).await?.unwrap().active);
        assert!(get_orders_for_user(&db, user.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_preconditions() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;

        let result = create_order_from_cart(&db, 999, ShippingDetails::new("1 Main St")).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "Cart", .. })));

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        let result =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await;
        assert!(matches!(result, Err(Error::InvalidOrderState { .. })));

        cart::add_product(&db, user_cart.id, lamp.id, 1).await?;
        let result = create_order_from_cart(&db, user_cart.id, ShippingDetails::new("  ")).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;
        let result =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await;
        assert!(matches!(result, Err(Error::InvalidOrderState { .. })));

        let anonymous = cart::create_anonymous_cart(&db).await?;
        cart::add_product(&db, anonymous.id, lamp.id, 1).await?;
        let result =
            create_order_from_cart(&db, anonymous.id, ShippingDetails::new("1 Main St")).await;
        assert!(matches!(result, Err(Error::InvalidOrderState { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_forward_transitions_append_history() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        update_status(&db, order.id, OrderStatus::Processing, "Paid").await?;
        update_status(&db, order.id, OrderStatus::Shipped, "Handed to carrier").await?;

        let lamp = crate::core::product::get_product_by_name(&db, "Lamp")
            .await?
            .unwrap();
        let before_delivery = stock(&db, lamp.id).await;
        let delivered = update_status(&db, order.id, OrderStatus::Delivered, "Signed").await?;
        assert_eq!(delivered.status, OrderStatus::Delivered);
        // Delivery has no inventory effect
        assert_eq!(stock(&db, lamp.id).await, before_delivery);
        assert_eq!(before_delivery, 4);

        let history = get_status_history(&db, order.id).await?;
        let statuses: Vec<_> = history.iter().map(|row| row.status).collect();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::Pending,
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ]
        );
        assert_eq!(history[2].comment, "Handed to carrier");

        Ok(())
    }

    #[tokio::test]
    async fn test_illegal_transition_changes_nothing() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        let result = update_status(&db, order.id, OrderStatus::Delivered, "skip").await;
        assert!(matches!(result, Err(Error::InvalidOrderState { .. })));

        let unchanged = require_order(&db, order.id).await?;
        assert_eq!(unchanged.status, OrderStatus::Pending);
        assert_eq!(get_status_history(&db, order.id).await?.len(), 1);

        let result = update_status(&db, 999, OrderStatus::Processing, "").await;
        assert!(matches!(result, Err(Error::NotFound { entity: "Order", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 3).await?;
        let details =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;
        assert_eq!(stock(&db, lamp.id).await, 2);

        let cancelled = cancel_order(&db, details.order.id, "Changed my mind").await?;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock(&db, lamp.id).await, 5);

        let history = get_status_history(&db, details.order.id).await?;
        let cancelled_rows = history
            .iter()
            .filter(|row| row.status == OrderStatus::Cancelled)
            .count();
        assert_eq!(cancelled_rows, 1);

        // Terminal: no way out, and no second restore
        let result = cancel_order(&db, details.order.id, "again").await;
        assert!(matches!(result, Err(Error::InvalidOrderState { .. })));
        assert_eq!(stock(&db, lamp.id).await, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_restores_multiple_lines() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 2).await?;
        let chair = create_test_product(&db, "Chair", 5.0, 5).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 2).await?;
        cart::add_product(&db, user_cart.id, chair.id, 1).await?;
        let details =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;
        assert_eq!(stock(&db, lamp.id).await, 0);
        assert_eq!(stock(&db, chair.id).await, 4);

        update_status(&db, details.order.id, OrderStatus::Processing, "Paid").await?;
        cancel_order(&db, details.order.id, "Warehouse fire").await?;

        assert_eq!(stock(&db, lamp.id).await, 2);
        assert_eq!(stock(&db, chair.id).await, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_return_restores_stock() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 4).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 4).await?;
        let details =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;

        update_status(&db, details.order.id, OrderStatus::Processing, "").await?;
        update_status(&db, details.order.id, OrderStatus::Shipped, "").await?;
        assert_eq!(stock(&db, lamp.id).await, 0);

        update_status(&db, details.order.id, OrderStatus::Returned, "Damaged").await?;
        assert_eq!(stock(&db, lamp.id).await, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_shipping_details_patches_only_given_fields() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        let updated = update_shipping_details(
            &db,
            order.id,
            ShippingUpdate {
                city: Some("Springfield".to_string()),
                tracking_number: Some("TRACK-1".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(updated.shipping_address, order.shipping_address);
        assert_eq!(updated.shipping_city.as_deref(), Some("Springfield"));
        assert_eq!(updated.tracking_number.as_deref(), Some("TRACK-1"));

        let result = update_shipping_details(
            &db,
            order.id,
            ShippingUpdate {
                address: Some(String::new()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_pending_order_restores_stock() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;

        let user_cart = cart::get_or_create_active_cart(&db, user.id).await?;
        cart::add_product(&db, user_cart.id, lamp.id, 2).await?;
        let details =
            create_order_from_cart(&db, user_cart.id, ShippingDetails::new("1 Main St")).await?;

        delete_order(&db, details.order.id).await?;

        assert!(get_order(&db, details.order.id).await?.is_none());
        assert!(get_status_history(&db, details.order.id).await?.is_empty());
        assert_eq!(stock(&db, lamp.id).await, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_processed_order_is_rejected() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        update_status(&db, order.id, OrderStatus::Processing, "").await?;

        let result = delete_order(&db, order.id).await;
        assert!(matches!(result, Err(Error::InvalidOrderState { .. })));
        assert!(get_order(&db, order.id).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_order_queries() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        let today = order.order_date;

        let by_email = get_orders_for_user_email(&db, TEST_EMAIL).await?;
        assert_eq!(by_email.len(), 1);

        assert_eq!(
            get_orders_by_status(&db, OrderStatus::Pending).await?.len(),
            1
        );
        assert!(
            get_orders_by_status(&db, OrderStatus::Shipped)
                .await?
                .is_empty()
        );

        assert_eq!(get_orders_by_date_range(&db, today, today).await?.len(), 1);
        let tomorrow = today.succ_opt().unwrap();
        let result = get_orders_by_date_range(&db, tomorrow, today).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        let high = filter_orders(
            &db,
            &OrderFilter {
                min_amount: Some(order.total_amount + 1.0),
                ..Default::default()
            },
        )
        .await?;
        assert!(high.is_empty());

        let recent = get_recent_orders(&db, 5).await?;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, order.id);

        let details = get_order_details(&db, order.id).await?;
        assert_eq!(details.items.len(), 1);
        assert!(details.payments.is_empty());

        Ok(())
    }
}
