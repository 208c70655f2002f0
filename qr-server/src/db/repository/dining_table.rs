//! Dining Table Repository

use super::{RepoError, RepoResult};
use shared::models::{DiningTable, DiningTableCreate, TableStatus};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

const COLUMNS: &str = "id, restaurant_id, number, capacity, status, qr_id, qr_url, created_at, updated_at";

#[derive(Clone)]
pub struct DiningTableRepository {
    pool: SqlitePool,
}

impl DiningTableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find all tables of a restaurant, ordered by number
    pub async fn find_all(&self, restaurant_id: i64) -> RepoResult<Vec<DiningTable>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM dining_table WHERE restaurant_id = ? ORDER BY number"
        );
        let tables = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(restaurant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tables)
    }

    /// Find table by id, scoped to a restaurant
    pub async fn find_by_id(&self, restaurant_id: i64, id: i64) -> RepoResult<Option<DiningTable>> {
        let sql = format!("SELECT {COLUMNS} FROM dining_table WHERE id = ? AND restaurant_id = ?");
        let table = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(id)
            .bind(restaurant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(table)
    }

    /// Resolve a table by its public QR id
    pub async fn find_by_qr(&self, qr_id: &str) -> RepoResult<Option<DiningTable>> {
        let sql = format!("SELECT {COLUMNS} FROM dining_table WHERE qr_id = ?");
        let table = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(qr_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(table)
    }

    /// Create a new dining table (INACTIVE, fresh QR id)
    pub async fn create(
        &self,
        restaurant_id: i64,
        data: DiningTableCreate,
    ) -> RepoResult<DiningTable> {
        let id = snowflake_id();
        let now = now_millis();
        let qr_id = uuid::Uuid::new_v4().to_string();
        let qr_url = format!("/t/{qr_id}");

        let result = sqlx::query(
            "INSERT INTO dining_table (id, restaurant_id, number, capacity, status, qr_id, qr_url, created_at, updated_at) VALUES (?, ?, ?, ?, 'INACTIVE', ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(restaurant_id)
        .bind(data.number)
        .bind(data.capacity.unwrap_or(4))
        .bind(&qr_id)
        .bind(&qr_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(RepoError::Duplicate(format!(
                    "Table number {} already exists in this restaurant",
                    data.number
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_id(restaurant_id, id)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create dining table".into()))
    }

    /// Guarded status transition: only fires when the table is currently
    /// in one of `expected`. Returns whether a row was updated.
    pub async fn update_status_guarded(
        &self,
        table_id: i64,
        expected: &[TableStatus],
        next: TableStatus,
    ) -> RepoResult<bool> {
        // SQLite 无数组绑定，逐个拼占位符
        let placeholders = vec!["?"; expected.len()].join(", ");
        let sql = format!(
            "UPDATE dining_table SET status = ?, updated_at = ? WHERE id = ? AND status IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql)
            .bind(next.to_string())
            .bind(now_millis())
            .bind(table_id);
        for status in expected {
            query = query.bind(status.to_string());
        }
        let rows = query.execute(&self.pool).await?;
        Ok(rows.rows_affected() > 0)
    }

    /// 删除桌台 — 仅当从未有过会话和订单
    pub async fn delete(&self, restaurant_id: i64, id: i64) -> RepoResult<()> {
        let table = self
            .find_by_id(restaurant_id, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Table {id} not found")))?;

        let sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM table_session WHERE table_id = ?")
                .bind(table.id)
                .fetch_one(&self.pool)
                .await?;
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE table_id = ?")
            .bind(table.id)
            .fetch_one(&self.pool)
            .await?;

        if sessions > 0 || orders > 0 {
            return Err(RepoError::Conflict(format!(
                "Table {} has recorded sessions or orders and cannot be deleted",
                table.number
            )));
        }

        sqlx::query("DELETE FROM dining_table WHERE id = ?")
            .bind(table.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
