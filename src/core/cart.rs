//! Cart Manager - Handles the mutable pre-order basket.
//!
//! A user owns at most one active cart at a time. Cart lines are unique per product:
//! adding a product that is already in the cart increments the existing line. Stock is
//! validated on every mutation but never reserved; the decrement happens at checkout
//! (see [`crate::core::order::create_order_from_cart`]). Two carts may therefore claim
//! the same unit and the first checkout wins.
//!
//! Every mutation runs in one database transaction and touches the cart's `updated_at`.

use crate::{
    core::{inventory, product, user},
    entities::{Cart, CartItem, cart, cart_item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// A cart together with its lines and the totals derived from them.
#[derive(Debug, Clone)]
pub struct CartSummary {
    /// The cart itself
    pub cart: cart::Model,
    /// Lines ordered by creation
    pub items: Vec<cart_item::Model>,
    /// Sum of line quantities
    pub item_count: i64,
    /// Sum of `unit_price × quantity` over all lines
    pub total_price: f64,
}

/// Total number of units across all lines.
#[must_use]
pub fn item_count(items: &[cart_item::Model]) -> i64 {
    items.iter().map(|item| i64::from(item.quantity)).sum()
}

/// Total price of all lines, using each line's price snapshot.
#[must_use]
pub fn total_price(items: &[cart_item::Model]) -> f64 {
    items.iter().map(cart_item::Model::total_price).sum()
}

/// Finds a cart by id, active or not.
pub async fn get_cart<C>(db: &C, cart_id: i64) -> Result<Option<cart::Model>>
where
    C: ConnectionTrait,
{
    Cart::find_by_id(cart_id).one(db).await.map_err(Into::into)
}

async fn require_cart<C>(db: &C, cart_id: i64) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    get_cart(db, cart_id)
        .await?
        .ok_or_else(|| Error::not_found("Cart", cart_id))
}

async fn require_active_cart<C>(db: &C, cart_id: i64) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    let cart = require_cart(db, cart_id).await?;
    if !cart.active {
        return Err(Error::InvalidState {
            message: format!("Cart {cart_id} is not active"),
        });
    }
    Ok(cart)
}

/// Retrieves the lines of a cart in the order they were added.
pub async fn get_cart_items<C>(db: &C, cart_id: i64) -> Result<Vec<cart_item::Model>>
where
    C: ConnectionTrait,
{
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_line<C>(db: &C, cart_id: i64, product_id: i64) -> Result<Option<cart_item::Model>>
where
    C: ConnectionTrait,
{
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads a cart with its lines and computes the item count and total on the fly.
pub async fn get_cart_summary(db: &DatabaseConnection, cart_id: i64) -> Result<CartSummary> {
    let cart = require_cart(db, cart_id).await?;
    let items = get_cart_items(db, cart_id).await?;

    Ok(CartSummary {
        item_count: item_count(&items),
        total_price: total_price(&items),
        cart,
        items,
    })
}

/// Finds the active cart of a user, if any.
pub async fn get_active_cart_for_user<C>(db: &C, user_id: i64) -> Result<Option<cart::Model>>
where
    C: ConnectionTrait,
{
    Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .filter(cart::Column::Active.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the active cart of the user with this email, if any.
pub async fn get_active_cart_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<cart::Model>> {
    let user = user::get_user_by_email(db, email)
        .await?
        .ok_or_else(|| Error::not_found("User", email))?;

    get_active_cart_for_user(db, user.id).await
}

/// Retrieves every cart a user has owned, newest first.
pub async fn get_carts_for_user(db: &DatabaseConnection, user_id: i64) -> Result<Vec<cart::Model>> {
    Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .order_by_desc(cart::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn insert_cart<C>(db: &C, user_id: Option<i64>) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let cart = cart::ActiveModel {
        user_id: Set(user_id),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    cart.insert(db).await.map_err(Into::into)
}

async fn get_or_create_active_cart_in<C>(db: &C, user_id: i64) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    user::require_active_user(db, user_id).await?;

    if let Some(cart) = get_active_cart_for_user(db, user_id).await? {
        return Ok(cart);
    }

    let cart = insert_cart(db, Some(user_id)).await?;
    debug!(cart_id = cart.id, user_id, "Created active cart");
    Ok(cart)
}

/// Returns the user's active cart, creating it if the user has none.
///
/// Calling this repeatedly without a checkout in between always yields the same cart.
///
/// # Errors
/// - `NotFound` if the user does not exist
/// - `InvalidState` if the user is deactivated
pub async fn get_or_create_active_cart(db: &DatabaseConnection, user_id: i64) -> Result<cart::Model> {
    let txn = db.begin().await?;
    let cart = get_or_create_active_cart_in(&txn, user_id).await?;
    txn.commit().await?;
    Ok(cart)
}

/// Same as [`get_or_create_active_cart`], resolving the user by email.
pub async fn get_or_create_active_cart_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<cart::Model> {
    let txn = db.begin().await?;

    let user = user::get_user_by_email(&txn, email)
        .await?
        .ok_or_else(|| Error::not_found("User", email))?;
    let cart = get_or_create_active_cart_in(&txn, user.id).await?;

    txn.commit().await?;
    Ok(cart)
}

/// Explicitly creates a cart for a user.
///
/// # Errors
/// - `NotFound` / `InvalidState` as for [`get_or_create_active_cart`]
/// - `InvalidState` if the user already has an active cart
pub async fn create_cart_for_user(db: &DatabaseConnection, user_id: i64) -> Result<cart::Model> {
    let txn = db.begin().await?;

    user::require_active_user(&txn, user_id).await?;

    if let Some(existing) = get_active_cart_for_user(&txn, user_id).await? {
        return Err(Error::InvalidState {
            message: format!(
                "User {user_id} already has an active cart ({})",
                existing.id
            ),
        });
    }

    let cart = insert_cart(&txn, Some(user_id)).await?;
    txn.commit().await?;

    Ok(cart)
}

/// Creates an active cart with no owner, for shoppers who have not logged in yet.
pub async fn create_anonymous_cart(db: &DatabaseConnection) -> Result<cart::Model> {
    insert_cart(db, None).await
}

async fn touch_cart<C>(db: &C, cart: cart::Model) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    let mut cart: cart::ActiveModel = cart.into();
    cart.updated_at = Set(Utc::now());
    cart.update(db).await.map_err(Into::into)
}

async fn add_product_in<C>(
    db: &C,
    cart: &cart::Model,
    product_id: i64,
    quantity: i32,
) -> Result<cart_item::Model>
where
    C: ConnectionTrait,
{
    let product = product::require_product(db, product_id).await?;
    if !product.active {
        return Err(Error::InvalidState {
            message: format!("Product {} is not active", product.name),
        });
    }

    let now = Utc::now();
    let item = match find_line(db, cart.id, product_id).await? {
        Some(existing) => {
            let combined =
                existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| Error::InvalidArgument {
                        message: format!("Quantity overflow for product {}", product.name),
                    })?;
            inventory::ensure_available(&product, combined)?;

            let mut line: cart_item::ActiveModel = existing.into();
            line.quantity = Set(combined);
            line.updated_at = Set(now);
            line.update(db).await?
        }
        None => {
            inventory::ensure_available(&product, quantity)?;

            cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                unit_price: Set(product.price),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    Ok(item)
}

/// Adds `quantity` units of a product to a cart and returns the resulting line.
///
/// If the product is already in the cart, the existing line is incremented and the
/// combined quantity is checked against stock. New lines snapshot the current price.
///
/// # Errors
/// - `InvalidArgument` if `quantity` is not positive
/// - `NotFound` if the cart or product does not exist
/// - `InvalidState` if the cart or product is inactive
/// - `InsufficientInventory` if stock is below the (combined) requested quantity
pub async fn add_product(
    db: &DatabaseConnection,
    cart_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<cart_item::Model> {
    if quantity <= 0 {
        return Err(Error::InvalidArgument {
            message: format!("Quantity must be greater than zero, got {quantity}"),
        });
    }

    let txn = db.begin().await?;

    let cart = require_active_cart(&txn, cart_id).await?;
    let item = add_product_in(&txn, &cart, product_id, quantity).await?;
    touch_cart(&txn, cart).await?;

    txn.commit().await?;

    debug!(cart_id, product_id, quantity = item.quantity, "Cart line updated");
    Ok(item)
}

/// Overwrites the quantity of a product already in the cart.
///
/// A quantity of zero or less removes the line and returns `None`.
///
/// # Errors
/// - `NotFound` if the cart, the product, or the product's line does not exist
/// - `InvalidState` if the cart is inactive
/// - `InsufficientInventory` if stock is below `new_quantity`
pub async fn update_item_quantity(
    db: &DatabaseConnection,
    cart_id: i64,
    product_id: i64,
    new_quantity: i32,
) -> Result<Option<cart_item::Model>> {
    if new_quantity <= 0 {
        remove_product(db, cart_id, product_id).await?;
        return Ok(None);
    }

    let txn = db.begin().await?;

    let cart = require_active_cart(&txn, cart_id).await?;
    let product = product::require_product(&txn, product_id).await?;
    inventory::ensure_available(&product, new_quantity)?;

    let existing = find_line(&txn, cart_id, product_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "Cart item",
            id: format!("cart {cart_id} / product {product_id}"),
        })?;

    let mut line: cart_item::ActiveModel = existing.into();
    line.quantity = Set(new_quantity);
    line.updated_at = Set(Utc::now());
    let line = line.update(&txn).await?;

    touch_cart(&txn, cart).await?;
    txn.commit().await?;

    Ok(Some(line))
}

/// Removes a product's line from the cart.
///
/// Removing a product that is not in the cart is a no-op.
///
/// # Errors
/// - `NotFound` if the cart does not exist
/// - `InvalidState` if the cart is inactive
pub async fn remove_product(db: &DatabaseConnection, cart_id: i64, product_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let cart = require_active_cart(&txn, cart_id).await?;

    let Some(line) = find_line(&txn, cart_id, product_id).await? else {
        return Ok(());
    };

    line.delete(&txn).await?;
    touch_cart(&txn, cart).await?;
    txn.commit().await?;

    Ok(())
}

/// Removes every line from the cart. The cart stays active.
pub async fn clear_cart(db: &DatabaseConnection, cart_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let cart = require_active_cart(&txn, cart_id).await?;

    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .exec(&txn)
        .await?;

    touch_cart(&txn, cart).await?;
    txn.commit().await?;

    Ok(())
}

/// Folds an anonymous cart into the active cart of the user with `target_user_email`.
///
/// Each source line is re-added with [`add_product`] semantics (merging into existing
/// lines and re-checking stock), then the source cart is deactivated. The whole merge is
/// one transaction: if any line fails, neither cart changes.
///
/// # Errors
/// - `NotFound` if the source cart or the user does not exist
/// - `InvalidState` if the source cart is inactive or a product became inactive
/// - `InvalidArgument` if the source cart belongs to another user or is the target cart
/// - `InsufficientInventory` if a merged line exceeds stock
pub async fn merge_anonymous_cart(
    db: &DatabaseConnection,
    source_cart_id: i64,
    target_user_email: &str,
) -> Result<cart::Model> {
    let txn = db.begin().await?;

    let source = require_active_cart(&txn, source_cart_id).await?;

    let user = user::get_user_by_email(&txn, target_user_email)
        .await?
        .ok_or_else(|| Error::not_found("User", target_user_email))?;

    if source.user_id.is_some_and(|owner| owner != user.id) {
        return Err(Error::InvalidArgument {
            message: format!("Cart {source_cart_id} belongs to another user"),
        });
    }

    let target = get_or_create_active_cart_in(&txn, user.id).await?;
    if target.id == source.id {
        return Err(Error::InvalidArgument {
            message: format!("Cart {source_cart_id} cannot be merged into itself"),
        });
    }

    let lines = get_cart_items(&txn, source.id).await?;
    let merged_lines = lines.len();
    for line in lines {
        add_product_in(&txn, &target, line.product_id, line.quantity).await?;
    }

    let mut source: cart::ActiveModel = source.into();
    source.active = Set(false);
    source.updated_at = Set(Utc::now());
    source.update(&txn).await?;

    let target = touch_cart(&txn, target).await?;
    txn.commit().await?;

    info!(
        source_cart_id,
        target_cart_id = target.id,
        merged_lines,
        "Merged anonymous cart"
    );

    Ok(target)
}

/// Active carts that have not been touched since `cutoff`, oldest first.
pub async fn list_abandoned_carts(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<cart::Model>> {
    Cart::find()
        .filter(cart::Column::Active.eq(true))
        .filter(cart::Column::UpdatedAt.lt(cutoff))
        .order_by_asc(cart::Column::UpdatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of active carts.
pub async fn count_active_carts(db: &DatabaseConnection) -> Result<u64> {
    Cart::find()
        .filter(cart::Column::Active.eq(true))
        .count(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{entities::Product, test_utils::*};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_add_product_quantity_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = add_product(&db, 1, 1, 0).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        let result = add_product(&db, 1, 1, -2).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_cart() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let first = get_or_create_active_cart(&db, user.id).await?;
        let second = get_or_create_active_cart(&db, user.id).await?;

        assert_eq!(first.id, second.id);
        assert!(first.active);
        assert_eq!(first.user_id, Some(user.id));
        assert_eq!(count_active_carts(&db).await?, 1);

        let by_email = get_or_create_active_cart_by_email(&db, &user.email).await?;
        assert_eq!(by_email.id, first.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_or_create_unknown_user() -> Result<()> {
        let db = setup_test_db().await?;

        let result = get_or_create_active_cart(&db, 999).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "User", .. })));

        let result = get_or_create_active_cart_by_email(&db, "ghost@example.com").await;
        assert!(matches!(result, Err(Error::NotFound { entity: "User", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_cart_for_user_keeps_single_active_cart() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let cart = create_cart_for_user(&db, user.id).await?;
        assert_eq!(cart.user_id, Some(user.id));

        let result = create_cart_for_user(&db, user.id).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let active = get_active_cart_for_user(&db, user.id).await?.unwrap();
        assert_eq!(active.id, cart.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_adding_same_product_twice_merges_lines() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 10).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        let first = add_product(&db, cart.id, lamp.id, 2).await?;
        let second = add_product(&db, cart.id, lamp.id, 3).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);

        let items = get_cart_items(&db, cart.id).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_product_snapshots_price() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 10).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        add_product(&db, cart.id, lamp.id, 1).await?;
        product::update_product_price(&db, lamp.id, 99.0).await?;
        let line = add_product(&db, cart.id, lamp.id, 1).await?;

        assert_eq!(line.unit_price, 10.0);
        assert_eq!(line.quantity, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_product_checks_combined_stock() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 4).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        add_product(&db, cart.id, lamp.id, 3).await?;
        let result = add_product(&db, cart.id, lamp.id, 2).await;

        assert!(matches!(
            result,
            Err(Error::InsufficientInventory {
                available: 4,
                requested: 5,
                ..
            })
        ));

        // The existing line is untouched and stock was never written
        let items = get_cart_items(&db, cart.id).await?;
        assert_eq!(items[0].quantity, 3);
        let stock = Product::find_by_id(lamp.id).one(&db).await?.unwrap();
        assert_eq!(stock.quantity, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_product_rejects_inactive_cart_and_product() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 4).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        product::set_product_active(&db, lamp.id, false).await?;
        let result = add_product(&db, cart.id, lamp.id, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let anonymous = create_anonymous_cart(&db).await?;
        let chair = create_test_product(&db, "Chair", 30.0, 4).await?;
        merge_anonymous_cart(&db, anonymous.id, &user.email).await?;
        let result = add_product(&db, anonymous.id, chair.id, 1).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let result = add_product(&db, 999, chair.id, 1).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "Cart", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_item_quantity() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, cart.id, lamp.id, 1).await?;

        let line = update_item_quantity(&db, cart.id, lamp.id, 4).await?.unwrap();
        assert_eq!(line.quantity, 4);

        let result = update_item_quantity(&db, cart.id, lamp.id, 6).await;
        assert!(matches!(result, Err(Error::InsufficientInventory { .. })));

        let chair = create_test_product(&db, "Chair", 30.0, 5).await?;
        let result = update_item_quantity(&db, cart.id, chair.id, 2).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_item_quantity_to_zero_removes_line() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, cart.id, lamp.id, 2).await?;

        let removed = update_item_quantity(&db, cart.id, lamp.id, 0).await?;
        assert!(removed.is_none());
        assert!(get_cart_items(&db, cart.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_absent_product_is_noop() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let chair = create_test_product(&db, "Chair", 30.0, 5).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, cart.id, lamp.id, 2).await?;

        remove_product(&db, cart.id, chair.id).await?;

        let items = get_cart_items(&db, cart.id).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, lamp.id);
        assert_eq!(items[0].quantity, 2);

        remove_product(&db, cart.id, lamp.id).await?;
        assert!(get_cart_items(&db, cart.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_clear_cart_keeps_cart_active() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let chair = create_test_product(&db, "Chair", 30.0, 5).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, cart.id, lamp.id, 2).await?;
        add_product(&db, cart.id, chair.id, 1).await?;

        clear_cart(&db, cart.id).await?;

        let summary = get_cart_summary(&db, cart.id).await?;
        assert!(summary.cart.active);
        assert!(summary.items.is_empty());
        assert_eq!(summary.item_count, 0);
        assert_eq!(summary.total_price, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_cart_summary_totals() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let chair = create_test_product(&db, "Chair", 2.5, 5).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, cart.id, lamp.id, 3).await?;
        add_product(&db, cart.id, chair.id, 2).await?;

        let summary = get_cart_summary(&db, cart.id).await?;
        assert_eq!(summary.item_count, 5);
        assert_eq!(summary.total_price, 35.0);

        Ok(())
    }

    /// Moves a cart's `updated_at` one hour into the past and returns the new value.
    async fn backdate(db: &DatabaseConnection, cart_id: i64) -> Result<DateTime<Utc>> {
        let stamp = Utc::now() - chrono::Duration::hours(1);
        let mut stale: cart::ActiveModel = get_cart(db, cart_id).await?.unwrap().into();
        stale.updated_at = Set(stamp);
        stale.update(db).await?;
        Ok(stamp)
    }

    async fn assert_touched_since(db: &DatabaseConnection, cart_id: i64, stamp: DateTime<Utc>) {
        let current = get_cart(db, cart_id).await.unwrap().unwrap();
        assert!(
            current.updated_at > stamp,
            "cart {cart_id} updated_at {} not after {stamp}",
            current.updated_at
        );
    }

    #[tokio::test]
    async fn test_mutations_touch_updated_at() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        let stamp = backdate(&db, cart.id).await?;
        add_product(&db, cart.id, lamp.id, 1).await?;
        assert_touched_since(&db, cart.id, stamp).await;

        let stamp = backdate(&db, cart.id).await?;
        update_item_quantity(&db, cart.id, lamp.id, 3).await?;
        assert_touched_since(&db, cart.id, stamp).await;

        let stamp = backdate(&db, cart.id).await?;
        remove_product(&db, cart.id, lamp.id).await?;
        assert_touched_since(&db, cart.id, stamp).await;

        add_product(&db, cart.id, lamp.id, 1).await?;
        let stamp = backdate(&db, cart.id).await?;
        clear_cart(&db, cart.id).await?;
        assert_touched_since(&db, cart.id, stamp).await;

        let anonymous = create_anonymous_cart(&db).await?;
        add_product(&db, anonymous.id, lamp.id, 1).await?;
        let stamp = backdate(&db, cart.id).await?;
        let source_stamp = backdate(&db, anonymous.id).await?;
        merge_anonymous_cart(&db, anonymous.id, &user.email).await?;
        assert_touched_since(&db, cart.id, stamp).await;
        assert_touched_since(&db, anonymous.id, source_stamp).await;

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_anonymous_cart() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 10).await?;
        let chair = create_test_product(&db, "Chair", 30.0, 10).await?;

        let user_cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, user_cart.id, lamp.id, 1).await?;

        let anonymous = create_anonymous_cart(&db).await?;
        add_product(&db, anonymous.id, lamp.id, 2).await?;
        add_product(&db, anonymous.id, chair.id, 1).await?;

        let merged = merge_anonymous_cart(&db, anonymous.id, &user.email).await?;
        assert_eq!(merged.id, user_cart.id);

        let items = get_cart_items(&db, merged.id).await?;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id, lamp.id);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[1].product_id, chair.id);
        assert_eq!(items[1].quantity, 1);

        let source = get_cart(&db, anonymous.id).await?.unwrap();
        assert!(!source.active);

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_creates_user_cart_when_missing() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 10).await?;

        let anonymous = create_anonymous_cart(&db).await?;
        add_product(&db, anonymous.id, lamp.id, 2).await?;

        let merged = merge_anonymous_cart(&db, anonymous.id, &user.email).await?;
        assert_ne!(merged.id, anonymous.id);
        assert_eq!(merged.user_id, Some(user.id));
        assert_eq!(get_cart_items(&db, merged.id).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_failure_leaves_both_carts_unchanged() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let lamp = create_test_product(&db, "Lamp", 10.0, 3).await?;

        let user_cart = get_or_create_active_cart(&db, user.id).await?;
        add_product(&db, user_cart.id, lamp.id, 2).await?;

        let anonymous = create_anonymous_cart(&db).await?;
        add_product(&db, anonymous.id, lamp.id, 2).await?;

        let result = merge_anonymous_cart(&db, anonymous.id, &user.email).await;
        assert!(matches!(result, Err(Error::InsufficientInventory { .. })));

        let user_items = get_cart_items(&db, user_cart.id).await?;
        assert_eq!(user_items[0].quantity, 2);
        assert!(get_cart(&db, anonymous.id).await?.unwrap().active);

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_rejects_other_users_cart() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let other = create_test_user(&db, "bob@example.com").await?;
        let other_cart = get_or_create_active_cart(&db, other.id).await?;

        let result = merge_anonymous_cart(&db, other_cart.id, &user.email).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        let own_cart = get_or_create_active_cart(&db, user.id).await?;
        let result = merge_anonymous_cart(&db, own_cart.id, &user.email).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_abandoned_carts() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        let future_cutoff = Utc::now() + chrono::Duration::hours(1);
        let abandoned = list_abandoned_carts(&db, future_cutoff).await?;
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].id, cart.id);

        let past_cutoff = Utc::now() - chrono::Duration::hours(1);
        assert!(list_abandoned_carts(&db, past_cutoff).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_get_carts_for_user() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let cart = get_or_create_active_cart(&db, user.id).await?;

        let carts = get_carts_for_user(&db, user.id).await?;
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].id, cart.id);

        let by_email = get_active_cart_by_email(&db, &user.email).await?.unwrap();
        assert_eq!(by_email.id, cart.id);

        Ok(())
    }
}
