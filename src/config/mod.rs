/// Catalog seed data and checkout settings from config.toml
pub mod catalog;

/// Database configuration and connection management
pub mod database;
