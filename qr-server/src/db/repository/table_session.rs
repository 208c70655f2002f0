//! Table Session Repository

use super::{RepoError, RepoResult};
use shared::models::TableSession;
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

const COLUMNS: &str = "id, restaurant_id, table_id, customer_name, customer_phone, device_fingerprint, client_ip, user_agent, verified, verified_at, active, expires_at, created_at, updated_at";

/// 新会话写入参数（由 SessionManager 归一化后传入）
pub struct SessionInsert {
    pub restaurant_id: i64,
    pub table_id: i64,
    pub customer_name: String,
    /// 已规范化为纯数字
    pub customer_phone: String,
    pub device_fingerprint: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TableSessionRepository {
    pool: SqlitePool,
}

impl TableSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> RepoResult<Option<TableSession>> {
        let sql = format!("SELECT {COLUMNS} FROM table_session WHERE id = ?");
        let session = sqlx::query_as::<_, TableSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// 同桌同设备的在用会话（重复扫码幂等入口）
    pub async fn find_active_by_fingerprint(
        &self,
        table_id: i64,
        device_fingerprint: &str,
    ) -> RepoResult<Option<TableSession>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM table_session WHERE table_id = ? AND device_fingerprint = ? AND active = 1"
        );
        let session = sqlx::query_as::<_, TableSession>(&sql)
            .bind(table_id)
            .bind(device_fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// 待验证会话：同桌、同手机号、同设备、未验证
    pub async fn find_pending(
        &self,
        table_id: i64,
        phone: &str,
        device_fingerprint: &str,
    ) -> RepoResult<Option<TableSession>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM table_session WHERE table_id = ? AND customer_phone = ? AND device_fingerprint = ? AND active = 1 AND verified = 0"
        );
        let session = sqlx::query_as::<_, TableSession>(&sql)
            .bind(table_id)
            .bind(phone)
            .bind(device_fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn count_active(&self, table_id: i64) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM table_session WHERE table_id = ? AND active = 1",
        )
        .bind(table_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn find_active_by_table(&self, table_id: i64) -> RepoResult<Vec<TableSession>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM table_session WHERE table_id = ? AND active = 1 ORDER BY created_at"
        );
        let sessions = sqlx::query_as::<_, TableSession>(&sql)
            .bind(table_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    /// 容量受控的会话创建
    ///
    /// 容量校验内嵌在 INSERT 本身（写入时刻原子生效）：并发的两个
    /// 创建请求串行通过写锁，后到者数到的是已含前者的会话数。
    /// (table_id, device_fingerprint) WHERE active = 1 的部分唯一索引
    /// 把并发重复扫码收敛为 Duplicate 而不是多开会话。
    pub async fn create_bounded(
        &self,
        data: SessionInsert,
        capacity: i64,
    ) -> RepoResult<TableSession> {
        let id = snowflake_id();
        let now = now_millis();
        let result = sqlx::query(
            "INSERT INTO table_session (id, restaurant_id, table_id, customer_name, customer_phone, device_fingerprint, client_ip, user_agent, verified, verified_at, active, expires_at, created_at, updated_at) \
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, 1, ?, ?, ? \
             WHERE (SELECT COUNT(*) FROM table_session WHERE table_id = ? AND active = 1) < ?",
        )
        .bind(id)
        .bind(data.restaurant_id)
        .bind(data.table_id)
        .bind(&data.customer_name)
        .bind(&data.customer_phone)
        .bind(&data.device_fingerprint)
        .bind(&data.client_ip)
        .bind(&data.user_agent)
        .bind(data.expires_at)
        .bind(now)
        .bind(now)
        .bind(data.table_id)
        .bind(capacity)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                return Err(RepoError::Conflict(format!(
                    "Table is full: all {capacity} seats in use"
                )));
            }
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // 并发重复扫码撞上部分唯一索引 — 调用方回退到查询既有会话
                return Err(RepoError::Duplicate(
                    "An active session already exists for this device".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create session".into()))
    }

    /// 标记为已验证（带时间戳）；已验证的不再改写
    pub async fn mark_verified(&self, session_id: i64) -> RepoResult<()> {
        let now = now_millis();
        let rows = sqlx::query(
            "UPDATE table_session SET verified = 1, verified_at = ?, updated_at = ? WHERE id = ? AND verified = 0 AND active = 1",
        )
        .bind(now)
        .bind(now)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!(
                "Pending session {session_id} not found"
            )));
        }
        Ok(())
    }

    /// 停用单个会话，幂等（已停用直接返回 false）
    pub async fn deactivate(&self, session_id: i64) -> RepoResult<bool> {
        let rows = sqlx::query(
            "UPDATE table_session SET active = 0, updated_at = ? WHERE id = ? AND active = 1",
        )
        .bind(now_millis())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(rows.rows_affected() > 0)
    }

    /// 过期会话清扫：停用所有已过 expires_at 的在用会话，返回涉及的桌台
    pub async fn deactivate_expired(&self, now: i64) -> RepoResult<Vec<i64>> {
        let table_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT table_id FROM table_session WHERE active = 1 AND expires_at <= ?",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        if !table_ids.is_empty() {
            sqlx::query(
                "UPDATE table_session SET active = 0, updated_at = ? WHERE active = 1 AND expires_at <= ?",
            )
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        Ok(table_ids)
    }
}
