//! Authentication Handlers

use std::time::Duration;

use axum::{Json, extract::State};

use shared::models::{LoginRequest, LoginResponse};

use crate::auth::role_capabilities;
use crate::core::ServerState;
use crate::db::repository::EmployeeRepository;
use crate::utils::AppError;

/// 固定时延，抹平时序差异防账号枚举
const AUTH_FIXED_DELAY_MS: u64 = 500;

/// POST /api/auth/login - 员工登录
///
/// 校验用户名密码并签发 JWT。
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let repo = EmployeeRepository::new(state.db.clone());
    let employee = repo
        .find_by_username(&req.username)
        .await
        .map_err(AppError::from)?;

    // Fixed delay to prevent timing attacks (before checking result)
    tokio::time::sleep(Duration::from_millis(AUTH_FIXED_DELAY_MS)).await;

    let employee = match employee {
        Some(e) if e.is_active => e,
        Some(_) => {
            return Err(AppError::forbidden("Account has been disabled"));
        }
        None => {
            tracing::warn!(username = %req.username, "Login failed - user not found");
            return Err(AppError::invalid_credentials());
        }
    };

    let password_valid = verify_password(&req.password, &employee.password_hash);
    if !password_valid {
        tracing::warn!(username = %req.username, "Login failed - invalid credentials");
        return Err(AppError::invalid_credentials());
    }

    let permissions = role_capabilities(&employee.role);
    let token = state
        .jwt_service
        .generate_token(
            &employee.id.to_string(),
            &employee.username,
            &employee.role,
            employee.restaurant_id,
            &permissions,
        )
        .map_err(|e| AppError::internal(format!("Token generation failed: {e}")))?;

    tracing::info!(username = %employee.username, role = %employee.role, "Staff login");

    Ok(Json(LoginResponse {
        token,
        username: employee.username,
        display_name: employee.display_name,
        role: employee.role,
        restaurant_id: employee.restaurant_id,
    }))
}

/// argon2 口令校验
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// argon2 口令哈希（建号工具/测试用）
pub fn hash_password(password: &str) -> Result<String, AppError> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("Password hash error: {e}")))
}
