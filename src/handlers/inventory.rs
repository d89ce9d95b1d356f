use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::models::{InventoryItem, Medicine, StockRequest, Supplier};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{load_supplier, require_role, stock_request::lock_request};
use crate::routes::AppState;
use crate::utils::non_blank;
use crate::workflow::Role;

pub const DEFAULT_REORDER_LEVEL: i32 = 20;

#[derive(Debug, Deserialize)]
pub struct NewInventoryItem {
    pub medicine_id: i32,
    pub quantity_available: i32,
    pub reorder_level: Option<i32>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryUpdate {
    pub quantity_available: Option<i32>,
    pub reorder_level: Option<i32>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierDetails {
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDelivery {
    pub pharmacist_id: i32,
    pub request_id: i32,
}

#[derive(Debug, Serialize)]
pub struct AppliedDelivery {
    pub request: StockRequest,
    pub medicine: Medicine,
}

fn check_levels(quantity: Option<i32>, reorder_level: Option<i32>) -> ApiResult<()> {
    if quantity.is_some_and(|q| q < 0) {
        return Err(ApiError::validation("Quantity must not be negative"));
    }
    if reorder_level.is_some_and(|r| r < 0) {
        return Err(ApiError::validation("Reorder level must not be negative"));
    }
    Ok(())
}

fn check_prices(prices: &[Option<Decimal>]) -> ApiResult<()> {
    if prices.iter().flatten().any(|p| p.is_sign_negative()) {
        return Err(ApiError::validation("Prices must not be negative"));
    }
    Ok(())
}

const INVENTORY_SELECT: &str = "SELECT i.*, m.name AS medicine_name
     FROM supplier_inventory i
     JOIN medicines m ON m.medicine_id = i.medicine_id";

pub async fn get_supplier_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<Supplier>> {
    let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::NotFound("Supplier"))?;
    Ok(Json(supplier))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<i32>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(load_supplier(&state.pool, supplier_id).await?))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<i32>,
    Json(payload): Json<SupplierDetails>,
) -> ApiResult<Json<Supplier>> {
    let supplier = sqlx::query_as::<_, Supplier>(
        "UPDATE suppliers
         SET company_name = COALESCE($1, company_name),
             phone = COALESCE($2, phone),
             address = COALESCE($3, address)
         WHERE supplier_id = $4
         RETURNING *",
    )
    .bind(non_blank(payload.company_name))
    .bind(non_blank(payload.phone))
    .bind(non_blank(payload.address))
    .bind(supplier_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound("Supplier"))?;

    log::info!("Supplier {} updated their details", supplier_id);
    Ok(Json(supplier))
}

pub async fn list_inventory(
    State(state): State<AppState>,
    Path(supplier_id): Path<i32>,
) -> ApiResult<Json<Vec<InventoryItem>>> {
    log::info!("Listing inventory of supplier {}", supplier_id);
    let items = sqlx::query_as::<_, InventoryItem>(&format!(
        "{} WHERE i.supplier_id = $1 ORDER BY m.name",
        INVENTORY_SELECT
    ))
    .bind(supplier_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(items))
}

async fn fetch_item(state: &AppState, supplier_id: i32, inventory_id: i32) -> ApiResult<InventoryItem> {
    sqlx::query_as::<_, InventoryItem>(&format!(
        "{} WHERE i.inventory_id = $1 AND i.supplier_id = $2",
        INVENTORY_SELECT
    ))
    .bind(inventory_id)
    .bind(supplier_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound("Inventory item"))
}

pub async fn add_inventory_item(
    State(state): State<AppState>,
    Path(supplier_id): Path<i32>,
    Json(payload): Json<NewInventoryItem>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    check_levels(Some(payload.quantity_available), payload.reorder_level)?;
    check_prices(&[payload.purchase_price, Some(payload.selling_price)])?;
    load_supplier(&state.pool, supplier_id).await?;

    let inventory_id: i32 = sqlx::query_scalar(
        "INSERT INTO supplier_inventory
            (supplier_id, medicine_id, quantity_available, reorder_level,
             purchase_price, selling_price, expiry_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING inventory_id",
    )
    .bind(supplier_id)
    .bind(payload.medicine_id)
    .bind(payload.quantity_available)
    .bind(payload.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL))
    .bind(payload.purchase_price)
    .bind(payload.selling_price)
    .bind(payload.expiry_date)
    .fetch_one(&state.pool)
    .await?;

    log::info!(
        "Supplier {} stocked medicine {} ({} units)",
        supplier_id,
        payload.medicine_id,
        payload.quantity_available
    );
    let item = fetch_item(&state, supplier_id, inventory_id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_inventory_item(
    State(state): State<AppState>,
    Path((supplier_id, inventory_id)): Path<(i32, i32)>,
    Json(payload): Json<InventoryUpdate>,
) -> ApiResult<Json<InventoryItem>> {
    check_levels(payload.quantity_available, payload.reorder_level)?;
    check_prices(&[payload.purchase_price, payload.selling_price])?;

    let result = sqlx::query(
        "UPDATE supplier_inventory
         SET quantity_available = COALESCE($1, quantity_available),
             reorder_level = COALESCE($2, reorder_level),
             purchase_price = COALESCE($3, purchase_price),
             selling_price = COALESCE($4, selling_price),
             expiry_date = COALESCE($5, expiry_date),
             updated_at = NOW()
         WHERE inventory_id = $6 AND supplier_id = $7",
    )
    .bind(payload.quantity_available)
    .bind(payload.reorder_level)
    .bind(payload.purchase_price)
    .bind(payload.selling_price)
    .bind(payload.expiry_date)
    .bind(inventory_id)
    .bind(supplier_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Inventory item"));
    }
    Ok(Json(fetch_item(&state, supplier_id, inventory_id).await?))
}

pub async fn delete_inventory_item(
    State(state): State<AppState>,
    Path((supplier_id, inventory_id)): Path<(i32, i32)>,
) -> ApiResult<StatusCode> {
    let result =
        sqlx::query("DELETE FROM supplier_inventory WHERE inventory_id = $1 AND supplier_id = $2")
            .bind(inventory_id)
            .bind(supplier_id)
            .execute(&state.pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Inventory item"));
    }
    log::info!("Supplier {} removed inventory item {}", supplier_id, inventory_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Books a delivered stock request into pharmacy stock.
///
/// Only the requesting pharmacist can apply it, and only once.
pub async fn add_to_inventory(
    State(state): State<AppState>,
    Json(payload): Json<ApplyDelivery>,
) -> ApiResult<Json<AppliedDelivery>> {
    require_role(&state.pool, payload.pharmacist_id, Role::Pharmacist).await?;

    let mut tx = state.pool.begin().await?;
    let (request, current) = lock_request(&mut tx, payload.request_id).await?;
    if request.pharmacist_id != payload.pharmacist_id {
        return Err(ApiError::forbidden("This request belongs to another pharmacist"));
    }
    current.apply_to_inventory()?;

    let medicine = sqlx::query_as::<_, Medicine>(
        "UPDATE medicines SET stock = stock + $1 WHERE medicine_id = $2 RETURNING *",
    )
    .bind(request.quantity_requested)
    .bind(request.medicine_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::NotFound("Medicine"))?;

    sqlx::query("UPDATE stock_requests SET applied_to_inventory = TRUE WHERE request_id = $1")
        .bind(request.request_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!(
        "Pharmacist {} added {} units of {} to stock (now {})",
        payload.pharmacist_id,
        request.quantity_requested,
        medicine.name,
        medicine.stock
    );

    Ok(Json(AppliedDelivery {
        request: StockRequest {
            applied_to_inventory: true,
            ..request
        },
        medicine,
    }))
}
