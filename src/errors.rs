//! Unified error types for the storefront core.
//!
//! Business outcomes (missing rows, bad input, illegal state, stock shortfalls) and
//! internal failures (database, configuration, I/O) share one enum so every core
//! function can propagate with `?`. The caller boundary uses [`Error::status_code`]
//! and [`Error::public_message`] to turn them into user-visible responses.

use thiserror::Error;

/// All errors produced by the storefront core.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up (e.g. "Cart", "Product")
        entity: &'static str,
        /// Identifier used for the lookup (id or email)
        id: String,
    },

    /// Caller-supplied data violates a precondition.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated precondition
        message: String,
    },

    /// A cart, product or user is not in a state that allows the operation.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the offending state
        message: String,
    },

    /// Illegal status transition or an operation on an order in the wrong status.
    #[error("Invalid order state: {message}")]
    InvalidOrderState {
        /// Description naming the current and attempted status
        message: String,
    },

    /// Stock for a product is below the requested amount.
    #[error(
        "Not enough inventory for product {product_name} (id {product_id}). Available: {available}, Requested: {requested}"
    )]
    InsufficientInventory {
        /// Product id
        product_id: i64,
        /// Product name at the time of the check
        product_name: String,
        /// Units currently in stock
        available: i32,
        /// Units requested
        requested: i32,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Numeric conversion failure (e.g. row counts).
    #[error("Conversion error: {0}")]
    Conversion(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this is an internal failure rather than a business outcome.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Database(_)
                | Self::Io(_)
                | Self::EnvVar(_)
                | Self::Conversion(_)
        )
    }

    /// HTTP-style status code for a thin API layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidArgument { .. } => 400,
            Self::InvalidState { .. }
            | Self::InvalidOrderState { .. }
            | Self::InsufficientInventory { .. } => 409,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Conversion(_) => 500,
        }
    }

    /// Message safe to show to end users. Internal failures are logged and masked.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            tracing::error!("Internal failure: {self}");
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
