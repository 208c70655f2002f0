//! Employee Model (员工)

use serde::{Deserialize, Serialize};

/// Staff account — kitchen / cashier / manager terminals authenticate
/// with username + password and receive a JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Employee {
    pub id: i64,
    pub restaurant_id: i64,
    pub username: String,
    /// argon2 哈希，永不出现在 API 响应里
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    /// admin | manager | kitchen | cashier
    pub role: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub restaurant_id: i64,
}
