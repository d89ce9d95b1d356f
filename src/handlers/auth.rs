use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};

use crate::db::{is_unique_violation, models::User};
use crate::error::{ApiError, ApiResult};
use crate::handlers::load_user;
use crate::routes::AppState;
use crate::utils::non_blank;
use crate::workflow::Role;

/// Header the SPA sends with the signed-in user's id.
pub const SESSION_HEADER: &str = "x-user-id";

pub const MIN_PASSWORD_LEN: usize = 6;

/// The signed-in user, as returned by `/api/login` and resolved from
/// [`SESSION_HEADER`] on endpoints that need one.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Session {
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn require(&self, role: Role) -> ApiResult<()> {
        if self.role() == Some(role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("This needs the {} role", role)))
        }
    }
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        Self {
            id: user.user_id,
            name: user.name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            address: user.address,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i32>().ok())
            .ok_or_else(|| ApiError::Unauthorized("Please sign in".to_string()))?;

        match load_user(&state.pool, user_id).await {
            Ok(user) => Ok(user.into()),
            Err(ApiError::NotFound(_)) => {
                Err(ApiError::Unauthorized("Unknown session user".to_string()))
            }
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

fn default_role() -> String {
    Role::Patient.to_string()
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A validated new account, ready to insert.
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl SignupRequest {
    pub fn validate(self) -> ApiResult<NewUser> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() || self.password.trim().is_empty() {
            return Err(ApiError::validation("Please fill in all required fields"));
        }
        if !email.contains('@') {
            return Err(ApiError::validation("Please enter a valid email address"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        let role = self.role.parse::<Role>()?;
        Ok(NewUser {
            name,
            email,
            password: self.password,
            role,
            phone: non_blank(self.phone),
            address: non_blank(self.address),
        })
    }
}

/// Hashes the password and inserts the account. Supplier accounts also get
/// their `suppliers` row so the supplier dashboard has something to load.
/// Shared with the admin "add user" form.
pub async fn create_user(pool: &PgPool, new_user: NewUser) -> ApiResult<User> {
    let password = new_user.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash, role, phone, address)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&password_hash)
    .bind(new_user.role.as_str())
    .bind(&new_user.phone)
    .bind(&new_user.address)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("An account with this email already exists")
        } else {
            ApiError::Database(e)
        }
    })?;

    if new_user.role == Role::Supplier {
        ensure_supplier_row(&mut tx, &user).await?;
    }
    tx.commit().await?;

    log::info!("Created {} account {}", user.role, user.user_id);
    Ok(user)
}

/// Gives a Supplier account its `suppliers` row, named after the user.
/// Does nothing when the row already exists.
pub(crate) async fn ensure_supplier_row(conn: &mut PgConnection, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO suppliers (user_id, company_name, phone, address)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user.user_id)
    .bind(&user.name)
    .bind(&user.phone)
    .bind(&user.address)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let new_user = payload.validate()?;
    log::info!("Signing up {} as {}", new_user.email, new_user.role);
    let user = create_user(&state.pool, new_user).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<Session>> {
    let email = payload.email.trim().to_lowercase();
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(payload.password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?
        .unwrap_or(false);

    if !matches {
        log::warn!("Failed login for {}", email);
        return Err(invalid());
    }

    log::info!("User {} logged in as {}", user.user_id, user.role);
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, role: &str) -> SignupRequest {
        SignupRequest {
            name: "Asha".into(),
            email: " Asha@Example.com ".into(),
            password: password.into(),
            role: role.into(),
            phone: Some(" ".into()),
            address: None,
        }
    }

    #[test]
    fn signup_normalises_fields() {
        let user = request("secret1", "doctor").validate().unwrap();
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.phone, None);
    }

    #[test]
    fn signup_rejects_short_passwords_and_unknown_roles() {
        assert!(matches!(
            request("12345", "Patient").validate(),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            request("secret1", "Nurse").validate(),
            Err(ApiError::Workflow(_))
        ));
    }
}
