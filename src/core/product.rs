//! Catalog access - Products and categories as seen by the order core.
//!
//! Catalog management proper is an external concern. The core reads products, creates
//! them for seeding, and toggles the `active` flag or list price. Stock is deliberately
//! absent here: it only changes through [`crate::core::inventory::adjust_stock`].

use crate::{
    entities::{Category, Product, category, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidArgument {
            message: format!("Price must be a positive number, got {price}"),
        });
    }
    Ok(())
}

/// Retrieves a specific product by its unique ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by id, failing with `NotFound` when it does not exist.
pub async fn require_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))
}

/// Finds a product by its exact name.
pub async fn get_product_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Name.eq(name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all active products, ordered alphabetically by name.
pub async fn get_all_active_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::Active.eq(true))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a new active product with an initial stock count.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - The price is not a positive finite number
/// - The initial quantity is negative
/// - The database insert operation fails
pub async fn create_product(
    db: &DatabaseConnection,
    name: String,
    price: f64,
    quantity: i32,
    category_id: Option<i64>,
) -> Result<product::Model> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument {
            message: "Product name cannot be empty".to_string(),
        });
    }

    validate_price(price)?;

    if quantity < 0 {
        return Err(Error::InvalidArgument {
            message: format!("Initial stock cannot be negative, got {quantity}"),
        });
    }

    let now = chrono::Utc::now();

    let product = product::ActiveModel {
        name: Set(name.trim().to_string()),
        price: Set(price),
        quantity: Set(quantity),
        active: Set(true),
        category_id: Set(category_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Changes the list price. Existing cart and order lines keep their snapshot.
pub async fn update_product_price(
    db: &DatabaseConnection,
    product_id: i64,
    new_price: f64,
) -> Result<product::Model> {
    validate_price(new_price)?;

    let mut product: product::ActiveModel = require_product(db, product_id).await?.into();
    product.price = Set(new_price);
    product.updated_at = Set(chrono::Utc::now());

    product.update(db).await.map_err(Into::into)
}

/// Activates or deactivates a product. Inactive products cannot be added to carts.
pub async fn set_product_active(
    db: &DatabaseConnection,
    product_id: i64,
    active: bool,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = require_product(db, product_id).await?.into();
    product.active = Set(active);
    product.updated_at = Set(chrono::Utc::now());

    product.update(db).await.map_err(Into::into)
}

/// Finds a category by name.
pub async fn get_category_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<category::Model>> {
    Category::find()
        .filter(category::Column::Name.eq(name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a category, optionally nested under `parent_id`.
pub async fn create_category(
    db: &DatabaseConnection,
    name: String,
    parent_id: Option<i64>,
) -> Result<category::Model> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument {
            message: "Category name cannot be empty".to_string(),
        });
    }

    if let Some(parent_id) = parent_id {
        Category::find_by_id(parent_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("Category", parent_id))?;
    }

    let category = category::ActiveModel {
        name: Set(name.trim().to_string()),
        parent_id: Set(parent_id),
        ..Default::default()
    };
    category.insert(db).await.map_err(Into::into)
}
