use bcrypt::{hash, verify, DEFAULT_COST};
use sqlx::{PgPool, Row};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::user::{Role, UserLoginRequest, UserLoginResponse, UserRegistrationRequest};
use crate::utils::jwt;

/// Registration/login for the caller identity attached to a booking
/// (SPEC_FULL.md §10.1). Grounded on the teacher's `UserService`, generalized
/// from MySQL's `query!` macros to the runtime-checked Postgres API used
/// throughout `persistence::repositories` (§10.2).
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        UserService { pool }
    }

    pub async fn register_user(&self, request: UserRegistrationRequest) -> AppResult<i32> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(format!("{:?}", e)))?;

        let existing = sqlx::query("SELECT id FROM app_user WHERE username = $1")
            .bind(&request.username)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        if existing.is_some() {
            return Err(AppError::DuplicateEntity("username already exists".to_string()));
        }

        let password_hash = hash(request.password.as_bytes(), DEFAULT_COST)
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let role_str = match request.role {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        };

        let row = sqlx::query(
            "INSERT INTO app_user (username, password_hash, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&request.username)
        .bind(&password_hash)
        .bind(role_str)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        let user_id: i32 = row.try_get("id").map_err(AppError::from)?;

        sqlx::query(
            "INSERT INTO customer_info (id, name, birth_date, gender) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(&request.name)
        .bind(request.birth_date)
        .bind(&request.gender)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(user_id)
    }

    pub async fn login_user(&self, request: UserLoginRequest) -> AppResult<UserLoginResponse> {
        let row = sqlx::query("SELECT id, password_hash FROM app_user WHERE username = $1")
            .bind(&request.username)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::AuthError("invalid credentials".to_string()))?;

        let user_id: i32 = row.try_get("id").map_err(AppError::from)?;
        let password_hash: String = row.try_get("password_hash").map_err(AppError::from)?;

        let matches = verify(request.password.as_bytes(), &password_hash)
            .map_err(|e| AppError::AuthError(e.to_string()))?;
        if !matches {
            return Err(AppError::AuthError("invalid credentials".to_string()));
        }

        let token = jwt::generate_token(user_id).map_err(|e| AppError::AuthError(e.to_string()))?;
        Ok(UserLoginResponse { token, user_id })
    }
}
