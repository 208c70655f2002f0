//! Verification Code Repository (审计留痕)

use super::RepoResult;
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct VerificationCodeRepository {
    pool: SqlitePool,
}

impl VerificationCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 写入一条发码审计记录，返回记录 id
    pub async fn create(
        &self,
        restaurant_id: i64,
        table_id: i64,
        phone: &str,
        code: &str,
        expires_at: i64,
    ) -> RepoResult<i64> {
        let id = snowflake_id();
        sqlx::query(
            "INSERT INTO verification_code (id, restaurant_id, table_id, phone, code, expires_at, used_at, created_at) VALUES (?, ?, ?, ?, ?, ?, NULL, ?)",
        )
        .bind(id)
        .bind(restaurant_id)
        .bind(table_id)
        .bind(phone)
        .bind(code)
        .bind(expires_at)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// 回填 used_at — 标记该手机号在该桌的最近一条未用记录
    pub async fn mark_used(&self, table_id: i64, phone: &str) -> RepoResult<()> {
        sqlx::query(
            "UPDATE verification_code SET used_at = ? WHERE id = (SELECT id FROM verification_code WHERE table_id = ? AND phone = ? AND used_at IS NULL ORDER BY created_at DESC LIMIT 1)",
        )
        .bind(now_millis())
        .bind(table_id)
        .bind(phone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
