//! Menu Item Repository
//!
//! 菜单目录是外部协作方；这里只承载下单校验 / 快照读取与
//! 测试所需的最小 CRUD。

use super::{RepoError, RepoResult};
use shared::models::{MenuItem, MenuItemCreate};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

const COLUMNS: &str = "id, restaurant_id, name, price, extras, is_available, created_at, updated_at";

#[derive(Clone)]
pub struct MenuItemRepository {
    pool: SqlitePool,
}

impl MenuItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, restaurant_id: i64, id: i64) -> RepoResult<Option<MenuItem>> {
        let sql = format!("SELECT {COLUMNS} FROM menu_item WHERE id = ? AND restaurant_id = ?");
        let item = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(id)
            .bind(restaurant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn create(&self, restaurant_id: i64, data: MenuItemCreate) -> RepoResult<MenuItem> {
        let id = snowflake_id();
        let now = now_millis();
        let extras_json = serde_json::to_string(&data.extras)
            .map_err(|e| RepoError::Validation(format!("Invalid extras: {e}")))?;

        sqlx::query(
            "INSERT INTO menu_item (id, restaurant_id, name, price, extras, is_available, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(restaurant_id)
        .bind(&data.name)
        .bind(data.price)
        .bind(extras_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(restaurant_id, id)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create menu item".into()))
    }

    pub async fn set_available(&self, restaurant_id: i64, id: i64, available: bool) -> RepoResult<()> {
        let rows = sqlx::query(
            "UPDATE menu_item SET is_available = ?, updated_at = ? WHERE id = ? AND restaurant_id = ?",
        )
        .bind(available)
        .bind(now_millis())
        .bind(id)
        .bind(restaurant_id)
        .execute(&self.pool)
        .await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Menu item {id} not found")));
        }
        Ok(())
    }
}
