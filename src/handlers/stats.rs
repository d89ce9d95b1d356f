//! Dashboard counters for doctors, pharmacists, suppliers and admins.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::ApiResult;
use crate::handlers::{auth::Session, load_supplier, require_role};
use crate::routes::AppState;
use crate::workflow::{
    prescription::PrescriptionStatus,
    stock_request::{DeliveryStatus, RequestStatus},
    Role,
};

/// Catalog medicines with fewer units than this count as low on stock.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

const RECENT_ORDER_LIMIT: i64 = 5;

#[derive(Debug, Serialize)]
pub struct DoctorStats {
    pub total_prescriptions: i64,
    /// Patients with a prescription still waiting on this doctor.
    pub assigned_patients: i64,
    /// Patients who have ever sent this doctor a prescription.
    pub total_patients: i64,
    pub pending_prescriptions: i64,
}

#[derive(Debug, Serialize)]
pub struct PharmacistStats {
    pub total_medicines: i64,
    pub pending_requests: i64,
    pub completed_deliveries: i64,
    pub low_stock_medicines: i64,
}

#[derive(Debug, Serialize)]
pub struct SupplierStats {
    pub pending_requests: i64,
    pub total_inventory_items: i64,
    pub total_inventory_value: Decimal,
    pub low_stock_items: i64,
    pub completed_deliveries: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentOrder {
    pub order_id: i32,
    pub name: String,
    pub total_price: Decimal,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub total_medicines: i64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub pending_prescriptions: i64,
    pub pending_stock_requests: i64,
    pub recent_orders: Vec<RecentOrder>,
}

/// Runs a `COUNT(*)` query. `key` binds first, then `status`.
async fn count(
    pool: &PgPool,
    sql: &str,
    key: Option<i32>,
    status: Option<&'static str>,
) -> Result<i64, sqlx::Error> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    if let Some(key) = key {
        query = query.bind(key);
    }
    if let Some(status) = status {
        query = query.bind(status);
    }
    query.fetch_one(pool).await
}

pub async fn doctor_stats(
    State(state): State<AppState>,
    Path(doctor_id): Path<i32>,
) -> ApiResult<Json<DoctorStats>> {
    require_role(&state.pool, doctor_id, Role::Doctor).await?;
    let pool = &state.pool;
    let pending = Some(PrescriptionStatus::Pending.as_str());

    let (total_prescriptions, assigned_patients, total_patients, pending_prescriptions) =
        futures::try_join!(
            count(
                pool,
                "SELECT COUNT(*) FROM prescriptions WHERE doctor_id = $1",
                Some(doctor_id),
                None,
            ),
            count(
                pool,
                "SELECT COUNT(DISTINCT patient_id) FROM prescriptions
                 WHERE doctor_id = $1 AND status = $2",
                Some(doctor_id),
                pending,
            ),
            count(
                pool,
                "SELECT COUNT(DISTINCT patient_id) FROM prescriptions WHERE doctor_id = $1",
                Some(doctor_id),
                None,
            ),
            count(
                pool,
                "SELECT COUNT(*) FROM prescriptions WHERE doctor_id = $1 AND status = $2",
                Some(doctor_id),
                pending,
            ),
        )?;

    Ok(Json(DoctorStats {
        total_prescriptions,
        assigned_patients,
        total_patients,
        pending_prescriptions,
    }))
}

pub async fn pharmacist_stats(
    State(state): State<AppState>,
    Path(pharmacist_id): Path<i32>,
) -> ApiResult<Json<PharmacistStats>> {
    require_role(&state.pool, pharmacist_id, Role::Pharmacist).await?;
    let pool = &state.pool;

    let (total_medicines, pending_requests, completed_deliveries, low_stock_medicines) =
        futures::try_join!(
            count(pool, "SELECT COUNT(*) FROM medicines", None, None),
            count(
                pool,
                "SELECT COUNT(*) FROM stock_requests WHERE pharmacist_id = $1 AND status = $2",
                Some(pharmacist_id),
                Some(RequestStatus::Pending.as_str()),
            ),
            count(
                pool,
                "SELECT COUNT(*) FROM stock_requests WHERE pharmacist_id = $1 AND delivery_status = $2",
                Some(pharmacist_id),
                Some(DeliveryStatus::Delivered.as_str()),
            ),
            count(
                pool,
                "SELECT COUNT(*) FROM medicines WHERE stock < $1",
                Some(LOW_STOCK_THRESHOLD),
                None,
            ),
        )?;

    Ok(Json(PharmacistStats {
        total_medicines,
        pending_requests,
        completed_deliveries,
        low_stock_medicines,
    }))
}

pub async fn supplier_stats(
    State(state): State<AppState>,
    Path(supplier_id): Path<i32>,
) -> ApiResult<Json<SupplierStats>> {
    load_supplier(&state.pool, supplier_id).await?;
    let pool = &state.pool;

    let inventory_value = async {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(quantity_available * selling_price), 0)
             FROM supplier_inventory WHERE supplier_id = $1",
        )
        .bind(supplier_id)
        .fetch_one(pool)
        .await
    };

    let (pending_requests, total_inventory_items, total_inventory_value, low_stock_items, completed_deliveries) =
        futures::try_join!(
            count(
                pool,
                "SELECT COUNT(*) FROM stock_requests WHERE supplier_id = $1 AND status = $2",
                Some(supplier_id),
                Some(RequestStatus::Pending.as_str()),
            ),
            count(
                pool,
                "SELECT COUNT(*) FROM supplier_inventory WHERE supplier_id = $1",
                Some(supplier_id),
                None,
            ),
            inventory_value,
            count(
                pool,
                "SELECT COUNT(*) FROM supplier_inventory
                 WHERE supplier_id = $1 AND quantity_available <= reorder_level",
                Some(supplier_id),
                None,
            ),
            count(
                pool,
                "SELECT COUNT(*) FROM stock_requests WHERE supplier_id = $1 AND delivery_status = $2",
                Some(supplier_id),
                Some(DeliveryStatus::Delivered.as_str()),
            ),
        )?;

    Ok(Json(SupplierStats {
        pending_requests,
        total_inventory_items,
        total_inventory_value,
        low_stock_items,
        completed_deliveries,
    }))
}

pub async fn admin_stats(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<AdminStats>> {
    session.require(Role::Admin)?;
    let pool = &state.pool;

    let by_role = async {
        sqlx::query_as::<_, (String, i64)>("SELECT role, COUNT(*) FROM users GROUP BY role")
            .fetch_all(pool)
            .await
    };
    let revenue = async {
        sqlx::query_scalar::<_, Decimal>("SELECT COALESCE(SUM(amount), 0) FROM payments")
            .fetch_one(pool)
            .await
    };
    let recent = async {
        sqlx::query_as::<_, RecentOrder>(
            "SELECT o.order_id, u.name, o.total_price, o.status
             FROM orders o
             JOIN users u ON u.user_id = o.user_id
             ORDER BY o.created_at DESC, o.order_id DESC
             LIMIT $1",
        )
        .bind(RECENT_ORDER_LIMIT)
        .fetch_all(pool)
        .await
    };

    let (by_role, total_medicines, total_orders, total_revenue, pending_prescriptions, pending_stock_requests, recent_orders) =
        futures::try_join!(
            by_role,
            count(pool, "SELECT COUNT(*) FROM medicines", None, None),
            count(pool, "SELECT COUNT(*) FROM orders", None, None),
            revenue,
            count(
                pool,
                "SELECT COUNT(*) FROM prescriptions WHERE status = $1",
                None,
                Some(PrescriptionStatus::Pending.as_str()),
            ),
            count(
                pool,
                "SELECT COUNT(*) FROM stock_requests WHERE status = $1",
                None,
                Some(RequestStatus::Pending.as_str()),
            ),
            recent,
        )?;

    let users_by_role: BTreeMap<String, i64> = by_role.into_iter().collect();
    Ok(Json(AdminStats {
        total_users: users_by_role.values().sum(),
        users_by_role,
        total_medicines,
        total_orders,
        total_revenue,
        pending_prescriptions,
        pending_stock_requests,
        recent_orders,
    }))
}
