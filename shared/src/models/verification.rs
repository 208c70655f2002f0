//! Verification Code Model (验证码审计)
//!
//! 热路径校验走临时存储里的 `{code, attempts}` 记录（带 TTL）；
//! 本表仅作审计留痕，只增不改（除 `used_at` 回填）。

use serde::{Deserialize, Serialize};

/// Verification code audit row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct VerificationCode {
    pub id: i64,
    pub restaurant_id: i64,
    pub table_id: i64,
    pub phone: String,
    pub code: String,
    pub expires_at: i64,
    pub used_at: Option<i64>,
    pub created_at: i64,
}

/// 临时存储中的热路径记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRecord {
    pub code: String,
    pub attempts: i64,
}

/// Send code request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCodeRequest {
    pub qr_id: String,
    pub phone: String,
}

/// Send code response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCodeResponse {
    /// 验证码有效期（秒）
    pub expires_in: u64,
}

/// Check code request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeRequest {
    pub qr_id: String,
    pub phone: String,
    pub code: String,
    pub device_fingerprint: String,
}
