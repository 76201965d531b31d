//! Inventory ledger - The only code path that writes `products.quantity`.
//!
//! Stock changes are expressed as signed deltas and applied with a single SQL statement
//! (`UPDATE products SET quantity = quantity + delta WHERE id = ? AND quantity >= -delta`),
//! so a concurrent writer can never drive stock below zero. Checkout commits negative
//! deltas; cancellations, returns and order edits restore positive ones. Cart mutations
//! only call [`ensure_available`], they never write stock.

use crate::{
    entities::{Product, product},
    errors::{Error, Result},
};
use sea_orm::{prelude::*, sea_query::Expr};
use tracing::debug;

/// Fails with `InsufficientInventory` if `product` has fewer than `requested` units.
pub fn ensure_available(product: &product::Model, requested: i32) -> Result<()> {
    if product.quantity < requested {
        return Err(Error::InsufficientInventory {
            product_id: product.id,
            product_name: product.name.clone(),
            available: product.quantity,
            requested,
        });
    }
    Ok(())
}

/// Atomically adds `delta` to a product's stock and returns the updated product.
///
/// Pass a negative delta to take units out of stock and a positive one to put them back.
/// Run it on a transaction to group it with other writes.
///
/// # Errors
/// - `NotFound` if the product does not exist
/// - `InsufficientInventory` if the update would make the quantity negative; the stock
///   is left unchanged
pub async fn adjust_stock<C>(db: &C, product_id: i64, delta: i32) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;

    if delta == 0 {
        return Ok(product);
    }

    let result = Product::update_many()
        .col_expr(
            product::Column::Quantity,
            Expr::col(product::Column::Quantity).add(delta),
        )
        .col_expr(
            product::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Quantity.gte(-delta))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        // Re-read so the error reports the stock the guard actually saw
        let current = Product::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("Product", product_id))?;

        return Err(Error::InsufficientInventory {
            product_id,
            product_name: current.name,
            available: current.quantity,
            requested: -delta,
        });
    }

    let updated = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;

    debug!(
        product_id,
        delta,
        quantity = updated.quantity,
        "Adjusted stock"
    );

    Ok(updated)
}
