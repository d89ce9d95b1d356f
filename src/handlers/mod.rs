//! HTTP handlers, one module per resource.
//!
//! The dashboards pass the acting user's id in the request body or path.
//! Handlers that act on someone's behalf load that user and check the role
//! and ownership server-side before changing anything.

use sqlx::PgPool;

use crate::db::models::{Supplier, User};
use crate::error::{ApiError, ApiResult};
use crate::workflow::Role;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod prescription;
pub mod stats;
pub mod stock_request;

pub async fn load_user(pool: &PgPool, user_id: i32) -> ApiResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("User"))
}

/// Loads `user_id` and checks it holds `role`.
pub async fn require_role(pool: &PgPool, user_id: i32, role: Role) -> ApiResult<User> {
    let user = load_user(pool, user_id).await?;
    match user.role.parse::<Role>() {
        Ok(actual) if actual == role => Ok(user),
        _ => Err(ApiError::forbidden(format!(
            "User {} is not a {}",
            user_id, role
        ))),
    }
}

pub async fn load_supplier(pool: &PgPool, supplier_id: i32) -> ApiResult<Supplier> {
    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE supplier_id = $1")
        .bind(supplier_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Supplier"))
}
