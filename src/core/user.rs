//! User directory - Resolves cart and order owners.
//!
//! Account management proper lives outside the core; these functions cover what the
//! cart and order flows need (lookup by id or email, the `active` flag) plus creation
//! for catalog seeding and tests.

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Finds a user by id.
pub async fn get_user_by_id<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by login email.
pub async fn get_user_by_email<C>(db: &C, email: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Email.eq(email.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the user if it exists and is active.
///
/// # Errors
/// - `NotFound` if there is no user with this id
/// - `InvalidState` if the account is deactivated
pub async fn require_active_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let user = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))?;

    if !user.active {
        return Err(Error::InvalidState {
            message: format!("User {} is not active", user.email),
        });
    }

    Ok(user)
}

/// Creates a new active user after validating the email and username.
pub async fn create_user(
    db: &DatabaseConnection,
    email: String,
    username: String,
    address: Option<String>,
) -> Result<user::Model> {
    let email = email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidArgument {
            message: format!("'{email}' is not a valid email address"),
        });
    }

    if username.trim().is_empty() {
        return Err(Error::InvalidArgument {
            message: "Username cannot be empty".to_string(),
        });
    }

    if get_user_by_email(db, &email).await?.is_some() {
        return Err(Error::InvalidArgument {
            message: format!("A user with email {email} already exists"),
        });
    }

    let now = chrono::Utc::now();
    let user = user::ActiveModel {
        email: Set(email),
        username: Set(username.trim().to_string()),
        address: Set(address),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    user.insert(db).await.map_err(Into::into)
}

/// Activates or deactivates a user account.
pub async fn set_user_active(
    db: &DatabaseConnection,
    user_id: i64,
    active: bool,
) -> Result<user::Model> {
    let mut user: user::ActiveModel = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))?
        .into();

    user.active = Set(active);
    user.updated_at = Set(chrono::Utc::now());

    user.update(db).await.map_err(Into::into)
}
