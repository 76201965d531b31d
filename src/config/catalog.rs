//! Catalog configuration loading from config.toml
//!
//! The configuration file holds checkout settings and seed data: categories, products and
//! users created on start-up when they are missing. Seeding matches existing rows by
//! category name, product name and user email, so it can run on every start.

use crate::{
    core::{product, user},
    errors::{Error, Result},
};
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration file read when `STOREFRONT_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Upper bound for `abandoned_cart_hours` (ten years)
pub const MAX_ABANDONED_CART_HOURS: i64 = 24 * 365 * 10;

const fn default_abandoned_cart_hours() -> i64 {
    24
}

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct CatalogConfig {
    /// Checkout behaviour
    #[serde(default)]
    pub checkout: CheckoutConfig,
    /// Categories to seed, parents before children
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    /// Products to seed
    #[serde(default)]
    pub products: Vec<ProductConfig>,
    /// Users to seed
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Checkout settings
#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutConfig {
    /// Active carts untouched for this many hours are reported as abandoned
    #[serde(default = "default_abandoned_cart_hours")]
    pub abandoned_cart_hours: i64,
}

impl CheckoutConfig {
    /// Carts last touched before the returned instant count as abandoned.
    ///
    /// # Errors
    /// Returns `Error::Config` if the window cannot be represented as a duration before `now`.
    pub fn abandoned_cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        TimeDelta::try_hours(self.abandoned_cart_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| Error::Config {
                message: format!(
                    "abandoned_cart_hours {} is out of range",
                    self.abandoned_cart_hours
                ),
            })
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            abandoned_cart_hours: default_abandoned_cart_hours(),
        }
    }
}

/// Seed data for a category
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    /// Unique category name
    pub name: String,
    /// Name of the parent category, which must be listed earlier
    pub parent: Option<String>,
}

/// Seed data for a product
#[derive(Debug, Deserialize, Clone)]
pub struct ProductConfig {
    /// Product name, used to detect already seeded products
    pub name: String,
    /// List price, must be positive
    pub price: f64,
    /// Initial stock
    #[serde(default)]
    pub quantity: i32,
    /// Category name
    pub category: Option<String>,
}

/// Seed data for a user
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    /// Login email, used to detect already seeded users
    pub email: String,
    /// Display name
    pub username: String,
    /// Default shipping address
    pub address: Option<String>,
}

/// Rows created by [`seed_catalog`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    /// Categories inserted
    pub categories: usize,
    /// Products inserted
    pub products: usize,
    /// Users inserted
    pub users: usize,
}

/// Loads catalog configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses catalog configuration from TOML text
pub fn parse_config(contents: &str) -> Result<CatalogConfig> {
    let config: CatalogConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    let hours = config.checkout.abandoned_cart_hours;
    if !(1..=MAX_ABANDONED_CART_HOURS).contains(&hours) {
        return Err(Error::Config {
            message: format!(
                "abandoned_cart_hours must be between 1 and {MAX_ABANDONED_CART_HOURS}, got {hours}"
            ),
        });
    }

    Ok(config)
}

/// Creates the configured categories, products and users that do not exist yet.
///
/// # Errors
/// Returns an error if a referenced parent category or product category is unknown, or
/// if a seed row fails validation.
pub async fn seed_catalog(db: &DatabaseConnection, config: &CatalogConfig) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for category in &config.categories {
        if product::get_category_by_name(db, &category.name).await?.is_some() {
            debug!("Category '{}' already exists, skipping", category.name);
            continue;
        }

        let parent_id = match &category.parent {
            Some(parent) => Some(lookup_category(db, parent).await?),
            None => None,
        };
        product::create_category(db, category.name.clone(), parent_id).await?;
        summary.categories += 1;
    }

    for item in &config.products {
        if product::get_product_by_name(db, &item.name).await?.is_some() {
            debug!("Product '{}' already exists, skipping", item.name);
            continue;
        }

        let category_id = match &item.category {
            Some(category) => Some(lookup_category(db, category).await?),
            None => None,
        };
        product::create_product(db, item.name.clone(), item.price, item.quantity, category_id)
            .await?;
        summary.products += 1;
    }

    for account in &config.users {
        if user::get_user_by_email(db, &account.email).await?.is_some() {
            debug!("User '{}' already exists, skipping", account.email);
            continue;
        }

        user::create_user(
            db,
            account.email.clone(),
            account.username.clone(),
            account.address.clone(),
        )
        .await?;
        summary.users += 1;
    }

    info!(
        categories = summary.categories,
        products = summary.products,
        users = summary.users,
        "Catalog seeded"
    );

    Ok(summary)
}

async fn lookup_category(db: &DatabaseConnection, name: &str) -> Result<i64> {
    product::get_category_by_name(db, name)
        .await?
        .map(|category| category.id)
        .ok_or_else(|| Error::Config {
            message: format!("Unknown category '{name}' in config.toml"),
        })
}
