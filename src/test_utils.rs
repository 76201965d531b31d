//! Shared test utilities for the storefront core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{cart, order, product, user},
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Email of the user created by [`setup_with_user`].
pub const TEST_EMAIL: &str = "alice@example.com";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an active test user.
///
/// # Defaults
/// * `username`: the part of the email before '@'
/// * `address`: None
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<entities::user::Model> {
    let username = email.split('@').next().unwrap_or(email).to_string();
    user::create_user(db, email.to_string(), username, None).await
}

/// Creates an active, uncategorised test product.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    quantity: i32,
) -> Result<entities::product::Model> {
    product::create_product(db, name.to_string(), price, quantity, None).await
}

/// Sets up a database with one user ([`TEST_EMAIL`]).
/// Returns (db, user) for cart and order scenarios.
pub async fn setup_with_user() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, TEST_EMAIL).await?;
    Ok((db, user))
}

/// Sets up a database with one PENDING order.
///
/// The order belongs to [`TEST_EMAIL`] and holds a single line: 1 × "Lamp" at 10.0,
/// leaving 4 lamps in stock.
pub async fn setup_with_order() -> Result<(DatabaseConnection, entities::order::Model)> {
    let (db, user) = setup_with_user().await?;
    let lamp = create_test_product(&db, "Lamp", 10.0, 5).await?;

    let basket = cart::get_or_create_active_cart(&db, user.id).await?;
    cart::add_product(&db, basket.id, lamp.id, 1).await?;

    let details =
        order::create_order_from_cart(&db, basket.id, order::ShippingDetails::new("1 Main St"))
            .await?;
    Ok((db, details.order))
}
