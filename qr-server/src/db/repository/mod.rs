//! Repository Module
//!
//! Per-entity data access over the SQLite pool. Repositories hold a pool
//! clone and expose narrow methods; multi-entity transactional flows
//! (order creation, checkout release) open their own transactions.
//!
//! 约定：
//! - 所有 ID 为 snowflake `i64`，所有时间戳为 Unix millis `i64`
//! - 读取一律带 restaurant 维度过滤，杜绝跨租户泄漏
//! - 状态写入使用 `UPDATE .. WHERE status = <expected>` + rows_affected
//!   守卫，写入时刻再次校验不变量

pub mod dining_table;
pub mod employee;
pub mod menu_item;
pub mod order;
pub mod restaurant;
pub mod table_session;
pub mod verification_code;

// Re-exports
pub use dining_table::DiningTableRepository;
pub use employee::EmployeeRepository;
pub use menu_item::MenuItemRepository;
pub use order::OrderRepository;
pub use restaurant::RestaurantRepository;
pub use table_session::TableSessionRepository;
pub use verification_code::VerificationCodeRepository;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for crate::utils::AppError {
    fn from(err: RepoError) -> Self {
        use crate::utils::AppError;
        match err {
            RepoError::NotFound(msg) => AppError::not_found(msg),
            RepoError::Duplicate(msg) => AppError::conflict(msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Conflict(msg) => AppError::business_rule(msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
