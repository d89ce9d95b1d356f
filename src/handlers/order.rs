use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use crate::db::models::{Order, OrderDetails, OrderItem};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{auth::Session, load_user};
use crate::routes::AppState;
use crate::workflow::{
    order::{checkout_total, validate_address, LineItem, OrderStatus},
    Role,
};

/// Checkout request. The SPA also posts its own copy of the cart and total;
/// those are ignored and the order is priced from the stored cart.
#[derive(Debug, Deserialize)]
pub struct PlaceOrder {
    pub user_id: i32,
    pub delivery_address: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatus {
    pub actor_id: i32,
    pub status: String,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    #[sqlx(flatten)]
    order: Order,
    prescription_status: Option<String>,
    payment_id: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct PricedCartLine {
    medicine_id: i32,
    quantity: i32,
    price: Decimal,
}

const ORDER_SELECT: &str = "SELECT o.*, p.status AS prescription_status, pay.payment_id
     FROM orders o
     LEFT JOIN prescriptions p ON p.prescription_id = o.prescription_id
     LEFT JOIN payments pay ON pay.order_id = o.order_id";

async fn attach_items(pool: &PgPool, rows: Vec<OrderRow>) -> Result<Vec<OrderDetails>, sqlx::Error> {
    let order_ids: Vec<i32> = rows.iter().map(|row| row.order.order_id).collect();
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT oi.order_item_id, oi.order_id, oi.medicine_id, m.name AS medicine_name,
                oi.quantity, oi.price
         FROM order_items oi
         JOIN medicines m ON m.medicine_id = oi.medicine_id
         WHERE oi.order_id = ANY($1)
         ORDER BY oi.order_item_id",
    )
    .bind(&order_ids)
    .fetch_all(pool)
    .await?;

    let mut by_order: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(rows
        .into_iter()
        .map(|row| OrderDetails {
            items: by_order.remove(&row.order.order_id).unwrap_or_default(),
            order: row.order,
            prescription_status: row.prescription_status,
            payment_id: row.payment_id,
        })
        .collect())
}

pub async fn load_order_details(pool: &PgPool, order_id: i32) -> ApiResult<OrderDetails> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{} WHERE o.order_id = $1", ORDER_SELECT))
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    let mut details = attach_items(pool, vec![row]).await?;
    details.pop().ok_or(ApiError::NotFound("Order"))
}

/// Handles checkout: turns the patient's cart into an order.
///
/// Inserting the order, copying the cart lines into `order_items` and
/// clearing the cart all commit in one transaction, so a failure part way
/// leaves the cart untouched.
pub async fn place_order(
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrder>,
) -> ApiResult<(StatusCode, Json<OrderDetails>)> {
    let address = validate_address(&payload.delivery_address)?.to_string();
    log::info!("Placing order for user {}", payload.user_id);

    let mut tx = state.pool.begin().await?;

    let lines = sqlx::query_as::<_, PricedCartLine>(
        "SELECT c.medicine_id, c.quantity, m.price
         FROM cart_items c
         JOIN medicines m ON m.medicine_id = c.medicine_id
         WHERE c.user_id = $1
         ORDER BY c.cart_item_id
         FOR UPDATE OF c",
    )
    .bind(payload.user_id)
    .fetch_all(&mut *tx)
    .await?;

    let items: Vec<LineItem> = lines
        .into_iter()
        .map(|line| LineItem {
            medicine_id: line.medicine_id,
            quantity: line.quantity,
            price: line.price,
        })
        .collect();
    let total = checkout_total(&items, &address)?;

    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (user_id, total_price, delivery_address, status)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(payload.user_id)
    .bind(total)
    .bind(&address)
    .bind(OrderStatus::Processing.as_str())
    .fetch_one(&mut *tx)
    .await?;

    for item in &items {
        sqlx::query(
            "INSERT INTO order_items (order_id, medicine_id, quantity, price)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order.order_id)
        .bind(item.medicine_id)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(payload.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    log::info!(
        "Order {} placed for user {} totalling {}",
        order.order_id,
        payload.user_id,
        total
    );

    let details = load_order_details(&state.pool, order.order_id).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<Vec<OrderDetails>>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.order_id DESC",
        ORDER_SELECT
    ))
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(attach_items(&state.pool, rows).await?))
}

/// Every order, for the staff dashboards.
pub async fn list_all_orders(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Vec<OrderDetails>>> {
    if session.role() == Some(Role::Patient) {
        return Err(ApiError::forbidden("Patients can only list their own orders"));
    }
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{} ORDER BY o.created_at DESC, o.order_id DESC",
        ORDER_SELECT
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(attach_items(&state.pool, rows).await?))
}

/// Moves an order one step along Processing -> Shipped -> Delivered.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    Json(payload): Json<UpdateOrderStatus>,
) -> ApiResult<Json<Order>> {
    let next = payload.status.parse::<OrderStatus>()?;

    let actor = load_user(&state.pool, payload.actor_id).await?;
    match actor.role.parse::<Role>() {
        Ok(Role::Supplier | Role::Pharmacist | Role::Admin) => {}
        _ => {
            return Err(ApiError::forbidden(
                "Only suppliers, pharmacists and admins can update order status",
            ))
        }
    }

    let mut tx = state.pool.begin().await?;
    let current: String = sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    let next = current.parse::<OrderStatus>()?.advance_to(next)?;

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $1 WHERE order_id = $2 RETURNING *",
    )
    .bind(next.as_str())
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    log::info!(
        "Order {} moved from {} to {} by user {}",
        order_id,
        current,
        next,
        actor.user_id
    );
    Ok(Json(order))
}
