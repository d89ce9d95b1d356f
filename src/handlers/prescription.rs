use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::db::models::{Order, Prescription, PrescriptionView};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{load_user, require_role};
use crate::routes::AppState;
use crate::utils::non_blank;
use crate::workflow::{
    prescription::{default_review_note, ensure_order_eligible, PrescriptionStatus},
    Role, WorkflowError,
};

#[derive(Debug, Deserialize)]
pub struct UploadPrescription {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub order_id: Option<i32>,
    /// Data URL produced by the browser's `FileReader`.
    pub prescription_image: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrescription {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub prescription_image: Option<String>,
    pub notes: Option<String>,
    /// Relink to this order.
    pub order_id: Option<i32>,
    /// Drop the current order link without choosing a new one.
    #[serde(default)]
    pub unlink_order: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPrescription {
    pub doctor_id: i32,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub patient_id: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrescriptionFilter {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub status: Option<String>,
}

async fn load_prescription(conn: &mut PgConnection, prescription_id: i32) -> ApiResult<Prescription> {
    sqlx::query_as::<_, Prescription>(
        "SELECT * FROM prescriptions WHERE prescription_id = $1 FOR UPDATE",
    )
    .bind(prescription_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ApiError::NotFound("Prescription"))
}

/// Ids of the patient's orders that do not have a prescription yet.
async fn eligible_order_ids(conn: &mut PgConnection, patient_id: i32) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT o.order_id FROM orders o
         WHERE o.user_id = $1
           AND o.prescription_id IS NULL
           AND NOT EXISTS (SELECT 1 FROM prescriptions p WHERE p.order_id = o.order_id)
         FOR UPDATE",
    )
    .bind(patient_id)
    .fetch_all(&mut *conn)
    .await
}

async fn link_order(
    conn: &mut PgConnection,
    patient_id: i32,
    prescription_id: i32,
    order_id: i32,
) -> ApiResult<()> {
    let eligible = eligible_order_ids(conn, patient_id).await?;
    ensure_order_eligible(order_id, &eligible)?;

    sqlx::query("UPDATE prescriptions SET order_id = $1 WHERE prescription_id = $2")
        .bind(order_id)
        .bind(prescription_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE orders SET prescription_id = $1 WHERE order_id = $2")
        .bind(prescription_id)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn unlink_order(conn: &mut PgConnection, prescription: &Prescription) -> ApiResult<()> {
    if let Some(order_id) = prescription.order_id {
        sqlx::query("UPDATE orders SET prescription_id = NULL WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE prescriptions SET order_id = NULL WHERE prescription_id = $1")
            .bind(prescription.prescription_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn check_owner(prescription: &Prescription, patient_id: i32) -> ApiResult<()> {
    if prescription.patient_id != patient_id {
        return Err(ApiError::forbidden("This prescription belongs to another patient"));
    }
    Ok(())
}

async fn fetch_prescription(pool: &PgPool, prescription_id: i32) -> ApiResult<Prescription> {
    sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE prescription_id = $1")
        .bind(prescription_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Prescription"))
}

/// Stores an uploaded prescription and, when `order_id` is given, links it
/// to that order in the same transaction.
pub async fn upload_prescription(
    State(state): State<AppState>,
    Json(payload): Json<UploadPrescription>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    if payload.prescription_image.trim().is_empty() {
        return Err(ApiError::validation("Please select a prescription file"));
    }
    require_role(&state.pool, payload.patient_id, Role::Patient).await?;
    require_role(&state.pool, payload.doctor_id, Role::Doctor).await?;

    log::info!(
        "Patient {} uploading prescription for doctor {}",
        payload.patient_id,
        payload.doctor_id
    );

    let mut tx = state.pool.begin().await?;
    let prescription_id: i32 = sqlx::query_scalar(
        "INSERT INTO prescriptions (patient_id, doctor_id, prescription_image, notes, status)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING prescription_id",
    )
    .bind(payload.patient_id)
    .bind(payload.doctor_id)
    .bind(&payload.prescription_image)
    .bind(non_blank(payload.notes))
    .bind(PrescriptionStatus::Pending.as_str())
    .fetch_one(&mut *tx)
    .await?;

    if let Some(order_id) = payload.order_id {
        link_order(&mut tx, payload.patient_id, prescription_id, order_id).await?;
        log::info!("Prescription {} linked to order {}", prescription_id, order_id);
    }
    tx.commit().await?;

    let prescription = fetch_prescription(&state.pool, prescription_id).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
    Query(filter): Query<PrescriptionFilter>,
) -> ApiResult<Json<Vec<PrescriptionView>>> {
    if let Some(status) = &filter.status {
        status.parse::<PrescriptionStatus>()?;
    }
    let prescriptions = sqlx::query_as::<_, PrescriptionView>(
        "SELECT p.*, pu.name AS patient_name, du.name AS doctor_name
         FROM prescriptions p
         JOIN users pu ON pu.user_id = p.patient_id
         JOIN users du ON du.user_id = p.doctor_id
         WHERE ($1::INT IS NULL OR p.patient_id = $1)
           AND ($2::INT IS NULL OR p.doctor_id = $2)
           AND ($3::TEXT IS NULL OR p.status = $3)
         ORDER BY p.uploaded_at DESC, p.prescription_id DESC",
    )
    .bind(filter.patient_id)
    .bind(filter.doctor_id)
    .bind(filter.status)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(prescriptions))
}

pub async fn list_patient_prescriptions(
    State(state): State<AppState>,
    Path(patient_id): Path<i32>,
) -> ApiResult<Json<Vec<PrescriptionView>>> {
    list_prescriptions(
        State(state),
        Query(PrescriptionFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        }),
    )
    .await
}

pub async fn list_doctor_prescriptions(
    State(state): State<AppState>,
    Path(doctor_id): Path<i32>,
) -> ApiResult<Json<Vec<PrescriptionView>>> {
    list_prescriptions(
        State(state),
        Query(PrescriptionFilter {
            doctor_id: Some(doctor_id),
            ..Default::default()
        }),
    )
    .await
}

pub async fn list_pending_for_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<i32>,
) -> ApiResult<Json<Vec<PrescriptionView>>> {
    list_prescriptions(
        State(state),
        Query(PrescriptionFilter {
            doctor_id: Some(doctor_id),
            status: Some(PrescriptionStatus::Pending.to_string()),
            ..Default::default()
        }),
    )
    .await
}

/// The patient's orders that can still take a prescription.
pub async fn list_eligible_orders(
    State(state): State<AppState>,
    Path(patient_id): Path<i32>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT o.* FROM orders o
         WHERE o.user_id = $1
           AND o.prescription_id IS NULL
           AND NOT EXISTS (SELECT 1 FROM prescriptions p WHERE p.order_id = o.order_id)
         ORDER BY o.created_at DESC",
    )
    .bind(patient_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(orders))
}

pub async fn update_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<i32>,
    Json(payload): Json<UpdatePrescription>,
) -> ApiResult<Json<Prescription>> {
    if let Some(doctor_id) = payload.doctor_id {
        require_role(&state.pool, doctor_id, Role::Doctor).await?;
    }

    let mut tx = state.pool.begin().await?;
    let current = load_prescription(&mut tx, prescription_id).await?;
    check_owner(&current, payload.patient_id)?;
    current.status.parse::<PrescriptionStatus>()?.ensure_editable()?;

    sqlx::query(
        "UPDATE prescriptions
         SET doctor_id = COALESCE($1, doctor_id),
             prescription_image = COALESCE($2, prescription_image),
             notes = COALESCE($3, notes)
         WHERE prescription_id = $4",
    )
    .bind(payload.doctor_id)
    .bind(non_blank(payload.prescription_image))
    .bind(non_blank(payload.notes))
    .bind(prescription_id)
    .execute(&mut *tx)
    .await?;

    let relink = payload.order_id.filter(|id| Some(*id) != current.order_id);
    if payload.unlink_order || relink.is_some() {
        unlink_order(&mut tx, &current).await?;
    }
    if let Some(order_id) = relink {
        link_order(&mut tx, payload.patient_id, prescription_id, order_id).await?;
        log::info!("Prescription {} relinked to order {}", prescription_id, order_id);
    }
    tx.commit().await?;

    Ok(Json(fetch_prescription(&state.pool, prescription_id).await?))
}

pub async fn delete_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<i32>,
    Query(query): Query<PatientQuery>,
) -> ApiResult<StatusCode> {
    let mut tx = state.pool.begin().await?;
    let current = load_prescription(&mut tx, prescription_id).await?;
    check_owner(&current, query.patient_id)?;
    current.status.parse::<PrescriptionStatus>()?.ensure_editable()?;

    unlink_order(&mut tx, &current).await?;
    sqlx::query("DELETE FROM prescriptions WHERE prescription_id = $1")
        .bind(prescription_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!("Prescription {} deleted by patient {}", prescription_id, query.patient_id);
    Ok(StatusCode::NO_CONTENT)
}

/// A doctor's decision on a pending prescription.
///
/// Only the doctor the prescription was sent to can decide on it, and only
/// once.
pub async fn verify_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<i32>,
    Json(payload): Json<VerifyPrescription>,
) -> ApiResult<Json<Prescription>> {
    let decision = payload.status.parse::<PrescriptionStatus>()?;
    if decision == PrescriptionStatus::Pending {
        return Err(WorkflowError::InvalidDecision.into());
    }

    let doctor = load_user(&state.pool, payload.doctor_id).await?;
    if doctor.role.parse::<Role>().ok() != Some(Role::Doctor) {
        return Err(ApiError::forbidden("Only doctors can verify prescriptions"));
    }

    let mut tx = state.pool.begin().await?;
    let current = load_prescription(&mut tx, prescription_id).await?;
    if current.doctor_id != doctor.user_id {
        return Err(ApiError::forbidden("This prescription was sent to another doctor"));
    }
    let next = current.status.parse::<PrescriptionStatus>()?.decide(decision)?;

    let note = non_blank(payload.notes).unwrap_or_else(|| default_review_note(next).to_string());
    let prescription = sqlx::query_as::<_, Prescription>(
        "UPDATE prescriptions
         SET status = $1, doctor_notes = $2, verified_at = NOW()
         WHERE prescription_id = $3
         RETURNING *",
    )
    .bind(next.as_str())
    .bind(&note)
    .bind(prescription_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    log::info!(
        "Prescription {} marked {} by doctor {}",
        prescription_id,
        next,
        doctor.user_id
    );
    Ok(Json(prescription))
}
