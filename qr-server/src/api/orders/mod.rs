//! 顾客订单 API 模块（会话令牌鉴权）

mod handler;

use axum::{Router, middleware, routing::get, routing::post};

use crate::auth::require_session;
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/orders", post(handler::create).get(handler::list_table))
        .route("/api/orders/{id}", get(handler::get_by_id))
        .layer(middleware::from_fn_with_state(state, require_session))
}
