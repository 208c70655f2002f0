//! 扫码入口 API 模块（公开）

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/qr/{qr_id}", get(handler::eligibility))
        .route("/api/qr/{qr_id}/session", get(handler::existing_session))
}
