//! Pharmacist-to-supplier stock requests.
//!
//! Every transition locks the request row, runs the rule in
//! [`crate::workflow::stock_request`], and writes the new state in the same
//! transaction. Accepting also locks and decrements the supplier's inventory
//! row, so two requests racing for the last units cannot both be accepted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgConnection;

use crate::db::models::StockRequest;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{load_supplier, require_role};
use crate::routes::AppState;
use crate::utils::non_blank;
use crate::workflow::{
    stock_request::{RequestState, RequestStatus},
    Role,
};

#[derive(Debug, Deserialize)]
pub struct NewStockRequest {
    pub pharmacist_id: i32,
    pub supplier_id: i32,
    pub medicine_id: i32,
    pub quantity_requested: i32,
    pub notes: Option<String>,
    pub pharmacy_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierAction {
    pub supplier_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub supplier_id: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub supplier_id: i32,
    pub tracking_info: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockRequestFilter {
    pub supplier_id: Option<i32>,
    pub pharmacist_id: Option<i32>,
    pub status: Option<String>,
}

const DEFAULT_REJECT_REASON: &str = "Request rejected by supplier";

pub(crate) const REQUEST_SELECT: &str = "SELECT r.*, m.name AS medicine_name
     FROM stock_requests r
     JOIN medicines m ON m.medicine_id = r.medicine_id";

/// Loads and locks a request along with its parsed workflow state.
pub(crate) async fn lock_request(
    conn: &mut PgConnection,
    request_id: i32,
) -> ApiResult<(StockRequest, RequestState)> {
    let request = sqlx::query_as::<_, StockRequest>(&format!(
        "{} WHERE r.request_id = $1 FOR UPDATE OF r",
        REQUEST_SELECT
    ))
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ApiError::NotFound("Stock request"))?;

    let state = RequestState::from_columns(
        &request.status,
        &request.delivery_status,
        request.applied_to_inventory,
    )?;
    Ok((request, state))
}

fn check_supplier(request: &StockRequest, supplier_id: i32) -> ApiResult<()> {
    if request.supplier_id != supplier_id {
        return Err(ApiError::forbidden("This request was sent to another supplier"));
    }
    Ok(())
}

async fn fetch_request(conn: &mut PgConnection, request_id: i32) -> ApiResult<StockRequest> {
    sqlx::query_as::<_, StockRequest>(&format!("{} WHERE r.request_id = $1", REQUEST_SELECT))
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ApiError::NotFound("Stock request"))
}

pub async fn create_stock_request(
    State(state): State<AppState>,
    Json(payload): Json<NewStockRequest>,
) -> ApiResult<(StatusCode, Json<StockRequest>)> {
    if payload.quantity_requested < 1 {
        return Err(ApiError::validation("Requested quantity must be at least 1"));
    }
    require_role(&state.pool, payload.pharmacist_id, Role::Pharmacist).await?;
    load_supplier(&state.pool, payload.supplier_id).await?;

    log::info!(
        "Pharmacist {} requesting {} x medicine {} from supplier {}",
        payload.pharmacist_id,
        payload.quantity_requested,
        payload.medicine_id,
        payload.supplier_id
    );

    let initial = RequestState::new();
    let mut conn = state.pool.acquire().await?;
    let request_id: i32 = sqlx::query_scalar(
        "INSERT INTO stock_requests
            (pharmacist_id, supplier_id, medicine_id, quantity_requested,
             status, delivery_status, notes, pharmacy_name)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING request_id",
    )
    .bind(payload.pharmacist_id)
    .bind(payload.supplier_id)
    .bind(payload.medicine_id)
    .bind(payload.quantity_requested)
    .bind(initial.status.as_str())
    .bind(initial.delivery.as_str())
    .bind(non_blank(payload.notes))
    .bind(non_blank(payload.pharmacy_name))
    .fetch_one(&mut *conn)
    .await?;

    let request = fetch_request(&mut conn, request_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_stock_requests(
    State(state): State<AppState>,
    Query(filter): Query<StockRequestFilter>,
) -> ApiResult<Json<Vec<StockRequest>>> {
    if let Some(status) = &filter.status {
        status.parse::<RequestStatus>()?;
    }
    let requests = sqlx::query_as::<_, StockRequest>(&format!(
        "{} WHERE ($1::INT IS NULL OR r.supplier_id = $1)
           AND ($2::INT IS NULL OR r.pharmacist_id = $2)
           AND ($3::TEXT IS NULL OR r.status = $3)
         ORDER BY r.request_date DESC, r.request_id DESC",
        REQUEST_SELECT
    ))
    .bind(filter.supplier_id)
    .bind(filter.pharmacist_id)
    .bind(filter.status)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(requests))
}

pub async fn list_supplier_requests(
    State(state): State<AppState>,
    Path(supplier_id): Path<i32>,
) -> ApiResult<Json<Vec<StockRequest>>> {
    list_stock_requests(
        State(state),
        Query(StockRequestFilter {
            supplier_id: Some(supplier_id),
            ..Default::default()
        }),
    )
    .await
}

pub async fn list_pharmacist_requests(
    State(state): State<AppState>,
    Path(pharmacist_id): Path<i32>,
) -> ApiResult<Json<Vec<StockRequest>>> {
    list_stock_requests(
        State(state),
        Query(StockRequestFilter {
            pharmacist_id: Some(pharmacist_id),
            ..Default::default()
        }),
    )
    .await
}

pub async fn get_stock_request(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
) -> ApiResult<Json<StockRequest>> {
    let mut conn = state.pool.acquire().await?;
    Ok(Json(fetch_request(&mut conn, request_id).await?))
}

/// Accepts a pending request and reserves the stock for it.
pub async fn accept_stock_request(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
    Json(payload): Json<SupplierAction>,
) -> ApiResult<Json<StockRequest>> {
    let mut tx = state.pool.begin().await?;
    let (request, current) = lock_request(&mut tx, request_id).await?;
    check_supplier(&request, payload.supplier_id)?;

    let available: i32 = sqlx::query_scalar(
        "SELECT quantity_available FROM supplier_inventory
         WHERE supplier_id = $1 AND medicine_id = $2
         FOR UPDATE",
    )
    .bind(request.supplier_id)
    .bind(request.medicine_id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0);

    let next = current.accept(available, request.quantity_requested)?;

    sqlx::query(
        "UPDATE supplier_inventory
         SET quantity_available = quantity_available - $1, updated_at = NOW()
         WHERE supplier_id = $2 AND medicine_id = $3",
    )
    .bind(request.quantity_requested)
    .bind(request.supplier_id)
    .bind(request.medicine_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE stock_requests SET status = $1, accepted_date = NOW() WHERE request_id = $2",
    )
    .bind(next.status.as_str())
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    let updated = fetch_request(&mut tx, request_id).await?;
    tx.commit().await?;

    log::info!(
        "Supplier {} accepted request {} ({} of {} units reserved)",
        request.supplier_id,
        request_id,
        request.quantity_requested,
        available
    );
    Ok(Json(updated))
}

pub async fn reject_stock_request(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<Json<StockRequest>> {
    let mut tx = state.pool.begin().await?;
    let (request, current) = lock_request(&mut tx, request_id).await?;
    check_supplier(&request, payload.supplier_id)?;
    let next = current.reject()?;

    let reason = non_blank(payload.reason).unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
    sqlx::query("UPDATE stock_requests SET status = $1, notes = $2 WHERE request_id = $3")
        .bind(next.status.as_str())
        .bind(&reason)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    let updated = fetch_request(&mut tx, request_id).await?;
    tx.commit().await?;

    log::info!("Supplier {} rejected request {}: {}", request.supplier_id, request_id, reason);
    Ok(Json(updated))
}

pub async fn ship_stock_request(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
    Json(payload): Json<ShipRequest>,
) -> ApiResult<Json<StockRequest>> {
    let mut tx = state.pool.begin().await?;
    let (request, current) = lock_request(&mut tx, request_id).await?;
    check_supplier(&request, payload.supplier_id)?;
    let next = current.ship()?;

    sqlx::query(
        "UPDATE stock_requests
         SET delivery_status = $1, tracking_info = $2, shipped_date = NOW()
         WHERE request_id = $3",
    )
    .bind(next.delivery.as_str())
    .bind(non_blank(payload.tracking_info))
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    let updated = fetch_request(&mut tx, request_id).await?;
    tx.commit().await?;

    log::info!("Supplier {} shipped request {}", request.supplier_id, request_id);
    Ok(Json(updated))
}

/// Marks a shipped request delivered, which completes it. The pharmacist
/// still has to book the goods into pharmacy stock separately, see
/// [`crate::handlers::inventory::add_to_inventory`].
pub async fn deliver_stock_request(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
    Json(payload): Json<SupplierAction>,
) -> ApiResult<Json<StockRequest>> {
    let mut tx = state.pool.begin().await?;
    let (request, current) = lock_request(&mut tx, request_id).await?;
    check_supplier(&request, payload.supplier_id)?;
    let next = current.deliver()?;

    sqlx::query(
        "UPDATE stock_requests
         SET status = $1, delivery_status = $2, delivery_date = NOW()
         WHERE request_id = $3",
    )
    .bind(next.status.as_str())
    .bind(next.delivery.as_str())
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    let updated = fetch_request(&mut tx, request_id).await?;
    tx.commit().await?;

    log::info!("Request {} delivered by supplier {}", request_id, request.supplier_id);
    Ok(Json(updated))
}
