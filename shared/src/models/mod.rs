//! Data models
//!
//! Shared between qr-server and frontends (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY, snowflake-style).
//! All timestamps are `i64` Unix millis.

pub mod dining_table;
pub mod employee;
pub mod menu_item;
pub mod order;
pub mod restaurant;
pub mod table_session;
pub mod verification;

// Re-exports
pub use dining_table::*;
pub use employee::*;
pub use menu_item::*;
pub use order::*;
pub use restaurant::*;
pub use table_session::*;
pub use verification::*;
