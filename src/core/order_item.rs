//! Order item edits for orders that have not been paid yet.
//!
//! Lines of a PENDING order can still be added, resized or removed. Stock follows the
//! change through the inventory ledger and the order total is recomputed from its lines.

use crate::{
    core::{inventory, order, product},
    entities::{Order, OrderItem, order as placed, order_item},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::debug;

/// Lines of an order, ordered by id.
pub async fn get_order_items<C>(db: &C, order_id: i64) -> Result<Vec<order_item::Model>>
where
    C: ConnectionTrait,
{
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every order line that references a product, ordered by id.
pub async fn get_order_items_for_product(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Vec<order_item::Model>> {
    OrderItem::find()
        .filter(order_item::Column::ProductId.eq(product_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lines of orders whose `order_date` falls within `[start, end]`.
///
/// # Errors
/// Returns `InvalidArgument` if `start` is after `end`.
pub async fn get_items_sold_in_date_range(
    db: &DatabaseConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<order_item::Model>> {
    if start > end {
        return Err(Error::InvalidArgument {
            message: format!("Start date {start} is after end date {end}"),
        });
    }

    OrderItem::find()
        .inner_join(Order)
        .filter(placed::Column::OrderDate.between(start, end))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn require_item<C>(db: &C, item_id: i64) -> Result<order_item::Model>
where
    C: ConnectionTrait,
{
    OrderItem::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order item", item_id))
}

/// Adds `quantity` units of a product to a PENDING order and returns the resulting line.
///
/// The units leave stock immediately. If the order already has a line for the product,
/// that line grows and keeps its price snapshot; otherwise a new line snapshots the
/// current product price.
///
/// # Errors
/// - `InvalidArgument` if `quantity` is not positive
/// - `NotFound` if the order or product does not exist
/// - `InvalidOrderState` if the order is past PENDING
/// - `InvalidState` if the product is inactive
/// - `InsufficientInventory` if stock cannot cover `quantity`
pub async fn add_order_item(
    db: &DatabaseConnection,
    order_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<order_item::Model> {
    if quantity <= 0 {
        return Err(Error::InvalidArgument {
            message: format!("Quantity must be greater than zero, got {quantity}"),
        });
    }

    let txn = db.begin().await?;

    let parent = order::require_order(&txn, order_id).await?;
    order::ensure_pending(&parent, "edit items of")?;

    let item = product::require_product(&txn, product_id).await?;
    if !item.active {
        return Err(Error::InvalidState {
            message: format!("Product {} is not active", item.name),
        });
    }

    inventory::adjust_stock(&txn, product_id, -quantity).await?;

    let existing = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .filter(order_item::Column::ProductId.eq(product_id))
        .one(&txn)
        .await?;

    let line = match existing {
        Some(line) => {
            let combined = line.quantity + quantity;
            let mut active: order_item::ActiveModel = line.into();
            active.quantity = Set(combined);
            active.update(&txn).await?
        }
        None => {
            order_item::ActiveModel {
                order_id: Set(order_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                unit_price: Set(item.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    order::recalculate_total(&txn, parent).await?;
    txn.commit().await?;

    debug!(order_id, product_id, quantity = line.quantity, "Order item added");
    Ok(line)
}

/// Changes the quantity of an order line and returns the updated line.
///
/// Growing a line takes the extra units out of stock, shrinking it puts them back.
///
/// # Errors
/// - `InvalidArgument` if `quantity` is not positive
/// - `NotFound` if the line does not exist
/// - `InvalidOrderState` if the order is past PENDING
/// - `InsufficientInventory` if stock cannot cover the increase
pub async fn update_order_item_quantity(
    db: &DatabaseConnection,
    item_id: i64,
    quantity: i32,
) -> Result<order_item::Model> {
    if quantity <= 0 {
        return Err(Error::InvalidArgument {
            message: format!("Quantity must be greater than zero, got {quantity}"),
        });
    }

    let txn = db.begin().await?;

    let line = require_item(&txn, item_id).await?;
    let parent = order::require_order(&txn, line.order_id).await?;
    order::ensure_pending(&parent, "edit items of")?;

    // Positive difference means more units leave stock
    let delta = quantity - line.quantity;
    inventory::adjust_stock(&txn, line.product_id, -delta).await?;

    let mut active: order_item::ActiveModel = line.into();
    active.quantity = Set(quantity);
    let updated = active.update(&txn).await?;

    order::recalculate_total(&txn, parent).await?;
    txn.commit().await?;

    debug!(item_id, quantity, "Order item resized");
    Ok(updated)
}

/// Removes a line from a PENDING order and puts its units back into stock.
///
/// # Errors
/// - `NotFound` if the line does not exist
/// - `InvalidOrderState` if the order is past PENDING
pub async fn remove_order_item(db: &DatabaseConnection, item_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let line = require_item(&txn, item_id).await?;
    let parent = order::require_order(&txn, line.order_id).await?;
    order::ensure_pending(&parent, "edit items of")?;

    inventory::adjust_stock(&txn, line.product_id, line.quantity).await?;
    line.delete(&txn).await?;

    order::recalculate_total(&txn, parent).await?;
    txn.commit().await?;

    Ok(())
}
