//! 员工认证 API 模块

mod handler;

pub use handler::{hash_password, verify_password};

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/auth/login", post(handler::login))
}
