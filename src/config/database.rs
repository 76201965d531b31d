//! Database configuration module for the storefront core.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema (including the cascading foreign keys of owned rows) always matches
//! the Rust structs without hand-written SQL.

use crate::entities::{
    Cart, CartItem, Category, Order, OrderItem, OrderStatusHistory, Payment, Product, User,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, EntityTrait, Schema,
};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://storefront.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a local `SQLite` file (created on first use) if not found.
pub fn get_database_url() -> Result<String> {
    Ok(std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()))
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url()?;
    debug!("Connecting to database at {database_url}");

    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// At most one active cart per user, enforced by the store where partial indexes exist.
async fn create_active_cart_index(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    if matches!(backend, DatabaseBackend::Sqlite | DatabaseBackend::Postgres) {
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_carts_active_user \
             ON carts (user_id) WHERE active",
        )
        .await?;
    } else {
        debug!("Partial indexes unsupported on {backend:?}, skipping active cart index");
    }
    Ok(())
}

/// Creates all tables, parents before children so foreign keys resolve.
///
/// Safe to call on an existing database: every statement is `CREATE TABLE IF NOT EXISTS`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Category).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Cart).await?;
    create_table(db, &schema, CartItem).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, OrderStatusHistory).await?;
    create_table(db, &schema, Payment).await?;
    create_active_cart_index(db).await?;

    info!("Database tables are in place");
    Ok(())
}
