//! Restaurant Repository

use super::{RepoError, RepoResult};
use shared::models::{Restaurant, RestaurantCreate};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct RestaurantRepository {
    pool: SqlitePool,
}

impl RestaurantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> RepoResult<Option<Restaurant>> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            "SELECT id, name, timezone, latitude, longitude, geofence_radius_m, require_geofence, operating_hours, is_active, created_at, updated_at FROM restaurant WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(restaurant)
    }

    /// 查找且要求启用中，未启用按不存在处理
    pub async fn find_active(&self, id: i64) -> RepoResult<Restaurant> {
        self.find_by_id(id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| RepoError::NotFound(format!("Restaurant {id} not found")))
    }

    pub async fn create(
        &self,
        data: RestaurantCreate,
        default_radius_m: f64,
    ) -> RepoResult<Restaurant> {
        let id = snowflake_id();
        let now = now_millis();
        let hours_json = data
            .operating_hours
            .as_ref()
            .map(|h| serde_json::to_string(h).unwrap_or_default());

        sqlx::query(
            "INSERT INTO restaurant (id, name, timezone, latitude, longitude, geofence_radius_m, require_geofence, operating_hours, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.timezone.as_deref().unwrap_or("UTC"))
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(data.geofence_radius_m.unwrap_or(default_radius_m))
        .bind(data.require_geofence)
        .bind(hours_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create restaurant".into()))
    }
}
