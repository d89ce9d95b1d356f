use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::{is_unique_violation, models::Payment};
use crate::error::{ApiError, ApiResult};
use crate::handlers::auth::Session;
use crate::routes::AppState;
use crate::workflow::{
    payment::{authorize, card_digits, PaymentMethod},
    prescription::PrescriptionStatus,
    Role,
};

#[derive(Debug, Deserialize)]
pub struct PayOrder {
    pub order_id: i32,
    pub user_id: i32,
    pub amount: Decimal,
    pub method: String,
    pub card_last_four: Option<String>,
}

#[derive(sqlx::FromRow)]
struct PayableOrder {
    user_id: i32,
    total_price: Decimal,
    prescription_status: Option<String>,
}

/// Records the payment for an order.
///
/// The order must belong to the payer and carry a verified prescription.
/// `payments.order_id` is unique, so paying twice (a double click, a retry)
/// returns 409 instead of writing a second row.
pub async fn pay_order(
    State(state): State<AppState>,
    Json(payload): Json<PayOrder>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let method = payload.method.parse::<PaymentMethod>()?;
    let card_last_four = card_digits(method, payload.card_last_four.as_deref())?;
    // Amounts arrive as JSON floats; money is kept to the cent.
    let amount = payload.amount.round_dp(2);
    if amount <= Decimal::ZERO {
        return Err(ApiError::validation("Payment amount must be positive"));
    }

    log::info!(
        "User {} paying {} for order {} by {}",
        payload.user_id,
        amount,
        payload.order_id,
        method
    );

    let mut tx = state.pool.begin().await?;
    let order = sqlx::query_as::<_, PayableOrder>(
        "SELECT o.user_id, o.total_price, p.status AS prescription_status
         FROM orders o
         LEFT JOIN prescriptions p ON p.prescription_id = o.prescription_id
         WHERE o.order_id = $1
         FOR UPDATE OF o",
    )
    .bind(payload.order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::NotFound("Order"))?;

    if order.user_id != payload.user_id {
        return Err(ApiError::forbidden("This order belongs to another user"));
    }

    let linked = order
        .prescription_status
        .as_deref()
        .map(str::parse::<PrescriptionStatus>)
        .transpose()?;
    authorize(linked, order.total_price, amount)?;

    let payment = sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (order_id, user_id, amount, method, card_last_four)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(payload.order_id)
    .bind(payload.user_id)
    .bind(amount)
    .bind(method.as_str())
    .bind(card_last_four)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("This order has already been paid")
        } else {
            ApiError::Database(e)
        }
    })?;
    tx.commit().await?;

    log::info!("Payment {} recorded for order {}", payment.payment_id, payment.order_id);
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_user_payments(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<Vec<Payment>>> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY paid_at DESC",
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(payments))
}

pub async fn list_all_payments(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Vec<Payment>>> {
    session.require(Role::Admin)?;
    let payments = sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY paid_at DESC")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(payments))
}
