use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::db::models::CartLine;
use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub user_id: i32,
    pub medicine_id: i32,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

/// Most units of one medicine a cart line can hold.
pub const MAX_CART_QUANTITY: i32 = 1000;

fn check_quantity(quantity: i32) -> ApiResult<()> {
    if quantity < 1 {
        return Err(ApiError::validation("Quantity must be at least 1"));
    }
    if quantity > MAX_CART_QUANTITY {
        return Err(too_many());
    }
    Ok(())
}

fn too_many() -> ApiError {
    ApiError::validation(format!(
        "Quantity cannot be more than {}",
        MAX_CART_QUANTITY
    ))
}

pub async fn fetch_cart(pool: &PgPool, user_id: i32) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(
        "SELECT c.cart_item_id, c.user_id, c.medicine_id, c.quantity,
                m.name, m.price, m.image_url
         FROM cart_items c
         JOIN medicines m ON m.medicine_id = c.medicine_id
         WHERE c.user_id = $1
         ORDER BY c.added_at, c.cart_item_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<Vec<CartLine>>> {
    Ok(Json(fetch_cart(&state.pool, user_id).await?))
}

/// Adds a medicine to the cart, or bumps the quantity if it is already there.
pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(payload): Json<AddToCart>,
) -> ApiResult<(StatusCode, Json<Vec<CartLine>>)> {
    check_quantity(payload.quantity)?;
    log::info!(
        "Adding {} x medicine {} to cart of user {}",
        payload.quantity,
        payload.medicine_id,
        payload.user_id
    );

    // The conflict branch skips the update when the sum would pass the cap.
    let result = sqlx::query(
        "INSERT INTO cart_items (user_id, medicine_id, quantity)
         VALUES ($1, $2, $3)
         ON CONFLICT (user_id, medicine_id)
         DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
         WHERE cart_items.quantity + EXCLUDED.quantity <= $4",
    )
    .bind(payload.user_id)
    .bind(payload.medicine_id)
    .bind(payload.quantity)
    .bind(MAX_CART_QUANTITY)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(too_many());
    }

    let cart = fetch_cart(&state.pool, payload.user_id).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(cart_item_id): Path<i32>,
    Json(payload): Json<UpdateQuantity>,
) -> ApiResult<StatusCode> {
    check_quantity(payload.quantity)?;

    let result = sqlx::query("UPDATE cart_items SET quantity = $1 WHERE cart_item_id = $2")
        .bind(payload.quantity)
        .bind(cart_item_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Cart item"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(cart_item_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_item_id = $1")
        .bind(cart_item_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Cart item"));
    }
    Ok(StatusCode::NO_CONTENT)
}
