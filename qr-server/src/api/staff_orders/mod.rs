//! 员工订单管理 API 模块

mod handler;

use axum::{Router, middleware, routing::get, routing::post};

use crate::auth::{require_auth, require_permission};
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/staff/orders", get(handler::list))
        .route("/api/staff/orders/{id}", get(handler::get_by_id))
        .route("/api/staff/orders/{id}/status", post(handler::transition))
        .route(
            "/api/staff/orders/{id}/items/{item_id}/status",
            post(handler::item_status),
        )
        .route("/api/staff/orders/{id}/cancel", post(handler::cancel))
        .layer(middleware::from_fn(require_permission("orders:manage")))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
