use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::models::{Medicine, Supplier, User};
use crate::error::{ApiError, ApiResult};
use crate::handlers::require_role;
use crate::routes::AppState;
use crate::utils::non_blank;
use crate::workflow::{prescription::PrescriptionStatus, Role};

#[derive(Debug, Deserialize)]
pub struct NewMedicine {
    pub supplier_id: Option<i32>,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub expiry_date: Option<NaiveDate>,
    pub image_url: Option<String>,
}

impl NewMedicine {
    pub fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Medicine name is required"));
        }
        if self.price.is_sign_negative() {
            return Err(ApiError::validation("Price must not be negative"));
        }
        if self.stock < 0 {
            return Err(ApiError::validation("Stock must not be negative"));
        }
        Ok(())
    }
}

pub async fn list_medicines(State(state): State<AppState>) -> ApiResult<Json<Vec<Medicine>>> {
    log::info!("Listing medicines");
    let medicines = sqlx::query_as::<_, Medicine>("SELECT * FROM medicines ORDER BY medicine_id")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(medicines))
}

/// Medicines a pharmacist or supplier can actually pick from.
pub async fn list_available_medicines(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Medicine>>> {
    let medicines = sqlx::query_as::<_, Medicine>(
        "SELECT * FROM medicines WHERE stock > 0 ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(medicines))
}

pub async fn create_medicine(
    State(state): State<AppState>,
    Json(payload): Json<NewMedicine>,
) -> ApiResult<(StatusCode, Json<Medicine>)> {
    payload.validate()?;
    log::info!("Adding medicine {}", payload.name.trim());

    let medicine = sqlx::query_as::<_, Medicine>(
        "INSERT INTO medicines
            (supplier_id, name, category, description, price, stock, expiry_date, image_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(payload.supplier_id)
    .bind(payload.name.trim())
    .bind(non_blank(payload.category))
    .bind(non_blank(payload.description))
    .bind(payload.price)
    .bind(payload.stock)
    .bind(payload.expiry_date)
    .bind(non_blank(payload.image_url))
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(medicine)))
}

pub async fn list_suppliers(State(state): State<AppState>) -> ApiResult<Json<Vec<Supplier>>> {
    let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY company_name")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(suppliers))
}

async fn list_users_with_role(state: &AppState, role: Role) -> ApiResult<Json<Vec<User>>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = $1 ORDER BY name")
        .bind(role.as_str())
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(users))
}

pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    list_users_with_role(&state, Role::Doctor).await
}

pub async fn list_pharmacists(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    list_users_with_role(&state, Role::Pharmacist).await
}

/// A patient as seen from a doctor's dashboard.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorPatient {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub prescription_count: i64,
    pub pending_prescriptions: i64,
    pub last_prescription_at: DateTime<Utc>,
}

/// Patients who have sent the doctor at least one prescription, most recent
/// first.
pub async fn list_doctor_patients(
    State(state): State<AppState>,
    Path(doctor_id): Path<i32>,
) -> ApiResult<Json<Vec<DoctorPatient>>> {
    require_role(&state.pool, doctor_id, Role::Doctor).await?;
    let patients = sqlx::query_as::<_, DoctorPatient>(
        "SELECT u.user_id, u.name, u.email, u.phone, u.address,
                COUNT(*) AS prescription_count,
                COUNT(*) FILTER (WHERE p.status = $2) AS pending_prescriptions,
                MAX(p.uploaded_at) AS last_prescription_at
         FROM prescriptions p
         JOIN users u ON u.user_id = p.patient_id
         WHERE p.doctor_id = $1
         GROUP BY u.user_id
         ORDER BY last_prescription_at DESC",
    )
    .bind(doctor_id)
    .bind(PrescriptionStatus::Pending.as_str())
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(patients))
}

#[derive(Debug, Serialize)]
pub struct PharmacistProfile {
    #[serde(flatten)]
    pub user: User,
    /// Last pharmacy name the pharmacist put on a stock request.
    pub pharmacy_name: Option<String>,
}

pub async fn get_pharmacist_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<PharmacistProfile>> {
    let user = require_role(&state.pool, user_id, Role::Pharmacist).await?;
    let pharmacy_name: Option<String> = sqlx::query_scalar(
        "SELECT pharmacy_name FROM stock_requests
         WHERE pharmacist_id = $1 AND pharmacy_name IS NOT NULL
         ORDER BY request_date DESC, request_id DESC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?;
    Ok(Json(PharmacistProfile {
        user,
        pharmacy_name,
    }))
}
