//! Core business logic - framework-agnostic cart, order, payment and reporting operations.
//!
//! Every public entry point takes a [`sea_orm::DatabaseConnection`] and runs its writes in a
//! single database transaction. Helpers that must join an outer transaction are generic
//! over [`sea_orm::ConnectionTrait`].

/// Cart Manager - active carts, cart lines and anonymous cart merging
pub mod cart;
/// Inventory ledger - the single mutation path for product stock
pub mod inventory;
/// Order lifecycle - checkout, status transitions and order queries
pub mod order;
/// Edits to the lines of PENDING orders
pub mod order_item;
/// Payment recorder
pub mod payment;
/// Catalog access used by the core (products and categories)
pub mod product;
/// Read-only aggregates for an admin surface
pub mod report;
/// User directory lookups
pub mod user;
