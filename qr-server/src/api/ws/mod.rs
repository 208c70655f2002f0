//! 实时推送 WebSocket 模块

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/ws", get(handler::handle_ws))
}
