//! 验证码 API 模块（公开）

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/verification/send", post(handler::send_code))
        .route("/api/verification/verify", post(handler::verify_code))
}
