//! Admin dashboard: user management and downloadable reports.
//!
//! Every handler here takes a [`Session`] and requires the Admin role.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db::{is_foreign_key_violation, is_unique_violation, models::User};
use crate::error::{ApiError, ApiResult};
use crate::handlers::auth::{create_user, ensure_supplier_row, Session, SignupRequest};
use crate::routes::AppState;
use crate::utils::{non_blank, to_csv};
use crate::workflow::Role;

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Option<String>,
}

pub const SALES_WINDOW_DAYS: i32 = 30;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "csv".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Users,
    Orders,
    /// Orders from the last [`SALES_WINDOW_DAYS`] days.
    Sales,
    /// The catalog with units sold and revenue per medicine.
    Medicines,
    Inventory,
    StockRequests,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Users => "users",
            ReportKind::Orders => "orders",
            ReportKind::Sales => "sales",
            ReportKind::Medicines => "medicines",
            ReportKind::Inventory => "inventory",
            ReportKind::StockRequests => "stock-requests",
        }
    }
}

impl FromStr for ReportKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "users" => Ok(ReportKind::Users),
            "orders" => Ok(ReportKind::Orders),
            "sales" => Ok(ReportKind::Sales),
            "medicines" => Ok(ReportKind::Medicines),
            "inventory" => Ok(ReportKind::Inventory),
            "stock-requests" | "stock_requests" => Ok(ReportKind::StockRequests),
            other => Err(ApiError::validation(format!("Unknown report type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(ApiError::validation(format!("Unknown report format: {}", other))),
        }
    }
}

/// One line of a report: serialised as-is for JSON, flattened to cells for CSV.
trait ReportRow: Serialize {
    const HEADER: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct UserRow {
    user_id: i32,
    name: String,
    email: String,
    role: String,
    phone: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
}

impl ReportRow for UserRow {
    const HEADER: &'static [&'static str] =
        &["user_id", "name", "email", "role", "phone", "address", "created_at"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            self.name.clone(),
            self.email.clone(),
            self.role.clone(),
            opt(&self.phone),
            opt(&self.address),
            self.created_at.to_rfc3339(),
        ]
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct OrderRow {
    order_id: i32,
    customer: String,
    total_price: Decimal,
    status: String,
    delivery_address: String,
    paid: bool,
    created_at: DateTime<Utc>,
}

impl ReportRow for OrderRow {
    const HEADER: &'static [&'static str] = &[
        "order_id",
        "customer",
        "total_price",
        "status",
        "delivery_address",
        "paid",
        "created_at",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.order_id.to_string(),
            self.customer.clone(),
            self.total_price.to_string(),
            self.status.clone(),
            self.delivery_address.clone(),
            self.paid.to_string(),
            self.created_at.to_rfc3339(),
        ]
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct MedicineRow {
    medicine_id: i32,
    name: String,
    category: Option<String>,
    price: Decimal,
    stock: i32,
    units_sold: i64,
    revenue: Decimal,
}

impl ReportRow for MedicineRow {
    const HEADER: &'static [&'static str] = &[
        "medicine_id",
        "name",
        "category",
        "price",
        "stock",
        "units_sold",
        "revenue",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.medicine_id.to_string(),
            self.name.clone(),
            opt(&self.category),
            self.price.to_string(),
            self.stock.to_string(),
            self.units_sold.to_string(),
            self.revenue.to_string(),
        ]
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct InventoryRow {
    inventory_id: i32,
    supplier: String,
    medicine: String,
    quantity_available: i32,
    reorder_level: i32,
    selling_price: Decimal,
    expiry_date: Option<chrono::NaiveDate>,
}

impl ReportRow for InventoryRow {
    const HEADER: &'static [&'static str] = &[
        "inventory_id",
        "supplier",
        "medicine",
        "quantity_available",
        "reorder_level",
        "selling_price",
        "expiry_date",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.inventory_id.to_string(),
            self.supplier.clone(),
            self.medicine.clone(),
            self.quantity_available.to_string(),
            self.reorder_level.to_string(),
            self.selling_price.to_string(),
            opt(&self.expiry_date),
        ]
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct StockRequestRow {
    request_id: i32,
    pharmacist: String,
    supplier: String,
    medicine: String,
    quantity_requested: i32,
    status: String,
    delivery_status: String,
    request_date: DateTime<Utc>,
}

impl ReportRow for StockRequestRow {
    const HEADER: &'static [&'static str] = &[
        "request_id",
        "pharmacist",
        "supplier",
        "medicine",
        "quantity_requested",
        "status",
        "delivery_status",
        "request_date",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.request_id.to_string(),
            self.pharmacist.clone(),
            self.supplier.clone(),
            self.medicine.clone(),
            self.quantity_requested.to_string(),
            self.status.clone(),
            self.delivery_status.clone(),
            self.request_date.to_rfc3339(),
        ]
    }
}

fn render<T: ReportRow>(kind: ReportKind, format: ReportFormat, rows: Vec<T>) -> Response {
    match format {
        ReportFormat::Json => Json(rows).into_response(),
        ReportFormat::Csv => {
            let cells: Vec<Vec<String>> = rows.iter().map(T::cells).collect();
            let filename = format!(
                "attachment; filename=\"{}_report_{}.csv\"",
                kind.as_str(),
                Utc::now().format("%Y-%m-%d")
            );
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                to_csv(T::HEADER, &cells),
            )
                .into_response()
        }
    }
}

async fn build_report(pool: &PgPool, kind: ReportKind, format: ReportFormat) -> Result<Response, sqlx::Error> {
    let response = match kind {
        ReportKind::Users => {
            let rows = sqlx::query_as::<_, UserRow>(
                "SELECT user_id, name, email, role, phone, address, created_at
                 FROM users ORDER BY user_id",
            )
            .fetch_all(pool)
            .await?;
            render(kind, format, rows)
        }
        ReportKind::Orders | ReportKind::Sales => {
            // The window only applies to sales; NULL keeps every order.
            let window = (kind == ReportKind::Sales).then_some(SALES_WINDOW_DAYS);
            let rows = sqlx::query_as::<_, OrderRow>(
                "SELECT o.order_id, u.name AS customer, o.total_price, o.status,
                        o.delivery_address, (pay.payment_id IS NOT NULL) AS paid, o.created_at
                 FROM orders o
                 JOIN users u ON u.user_id = o.user_id
                 LEFT JOIN payments pay ON pay.order_id = o.order_id
                 WHERE $1::INT IS NULL OR o.created_at >= NOW() - make_interval(days => $1)
                 ORDER BY o.order_id",
            )
            .bind(window)
            .fetch_all(pool)
            .await?;
            render(kind, format, rows)
        }
        ReportKind::Medicines => {
            let rows = sqlx::query_as::<_, MedicineRow>(
                "SELECT m.medicine_id, m.name, m.category, m.price, m.stock,
                        COALESCE(SUM(oi.quantity), 0)::BIGINT AS units_sold,
                        COALESCE(SUM(oi.quantity * oi.price), 0) AS revenue
                 FROM medicines m
                 LEFT JOIN order_items oi ON oi.medicine_id = m.medicine_id
                 GROUP BY m.medicine_id
                 ORDER BY units_sold DESC, m.name",
            )
            .fetch_all(pool)
            .await?;
            render(kind, format, rows)
        }
        ReportKind::Inventory => {
            let rows = sqlx::query_as::<_, InventoryRow>(
                "SELECT i.inventory_id, s.company_name AS supplier, m.name AS medicine,
                        i.quantity_available, i.reorder_level, i.selling_price, i.expiry_date
                 FROM supplier_inventory i
                 JOIN suppliers s ON s.supplier_id = i.supplier_id
                 JOIN medicines m ON m.medicine_id = i.medicine_id
                 ORDER BY s.company_name, m.name",
            )
            .fetch_all(pool)
            .await?;
            render(kind, format, rows)
        }
        ReportKind::StockRequests => {
            let rows = sqlx::query_as::<_, StockRequestRow>(
                "SELECT r.request_id, u.name AS pharmacist, s.company_name AS supplier,
                        m.name AS medicine, r.quantity_requested, r.status,
                        r.delivery_status, r.request_date
                 FROM stock_requests r
                 JOIN users u ON u.user_id = r.pharmacist_id
                 JOIN suppliers s ON s.supplier_id = r.supplier_id
                 JOIN medicines m ON m.medicine_id = r.medicine_id
                 ORDER BY r.request_id",
            )
            .fetch_all(pool)
            .await?;
            render(kind, format, rows)
        }
    };
    Ok(response)
}

pub async fn list_users(State(state): State<AppState>, session: Session) -> ApiResult<Json<Vec<User>>> {
    session.require(Role::Admin)?;
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, user_id DESC")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(users))
}

pub async fn add_user(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    session.require(Role::Admin)?;
    let new_user = payload.validate()?;
    log::info!("Admin {} adding {} as {}", session.id, new_user.email, new_user.role);
    let user = create_user(&state.pool, new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i32>,
    Json(payload): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
    session.require(Role::Admin)?;
    let role = payload.role.as_deref().map(str::parse::<Role>).transpose()?;
    let name = non_blank(payload.name);
    let email = non_blank(payload.email).map(|e| e.to_lowercase());
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::validation("Please enter a valid email address"));
    }
    if user_id == session.id && role.is_some_and(|r| r != Role::Admin) {
        return Err(ApiError::validation("You cannot remove your own admin role"));
    }

    let mut tx = state.pool.begin().await?;
    let user = sqlx::query_as::<_, User>(
        "UPDATE users
         SET name = COALESCE($1, name),
             email = COALESCE($2, email),
             phone = COALESCE($3, phone),
             address = COALESCE($4, address),
             role = COALESCE($5, role)
         WHERE user_id = $6
         RETURNING *",
    )
    .bind(name)
    .bind(email)
    .bind(non_blank(payload.phone))
    .bind(non_blank(payload.address))
    .bind(role.map(|r| r.as_str()))
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("An account with this email already exists")
        } else {
            ApiError::Database(e)
        }
    })?
    .ok_or(ApiError::NotFound("User"))?;

    if role == Some(Role::Supplier) {
        ensure_supplier_row(&mut tx, &user).await?;
    }
    tx.commit().await?;

    log::info!("Admin {} updated user {}", session.id, user_id);
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i32>,
) -> ApiResult<StatusCode> {
    session.require(Role::Admin)?;
    if user_id == session.id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }

    let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ApiError::conflict("This user still has orders, payments or stock requests")
            } else {
                ApiError::Database(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User"));
    }
    log::info!("Admin {} deleted user {}", session.id, user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn report(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    session.require(Role::Admin)?;
    let kind = query.kind.parse::<ReportKind>()?;
    let format = query.format.parse::<ReportFormat>()?;
    log::info!("Admin {} generating {} report", session.id, kind.as_str());
    Ok(build_report(&state.pool, kind, format).await?)
}
