//! Employee Repository

use super::{RepoError, RepoResult};
use shared::models::Employee;
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

const COLUMNS: &str = "id, restaurant_id, username, password_hash, display_name, role, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> RepoResult<Option<Employee>> {
        let sql = format!("SELECT {COLUMNS} FROM employee WHERE username = ? LIMIT 1");
        let employee = sqlx::query_as::<_, Employee>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    pub async fn create(
        &self,
        restaurant_id: i64,
        username: &str,
        password_hash: &str,
        display_name: &str,
        role: &str,
    ) -> RepoResult<Employee> {
        let id = snowflake_id();
        let now = now_millis();

        let result = sqlx::query(
            "INSERT INTO employee (id, restaurant_id, username, password_hash, display_name, role, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(restaurant_id)
        .bind(username)
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(RepoError::Duplicate(format!(
                    "Username '{username}' already exists"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_username(username)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create employee".into()))
    }
}
