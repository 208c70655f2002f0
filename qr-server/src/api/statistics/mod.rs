//! 统计报表 API 模块（员工）

mod handler;

use axum::{Router, middleware, routing::get};

use crate::auth::{require_auth, require_permission};
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/staff/stats/paid", get(handler::paid))
        .route("/api/staff/stats/today", get(handler::today))
        .layer(middleware::from_fn(require_permission("reports:view")))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
