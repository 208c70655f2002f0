//! 后厨队列 API 模块（员工）

mod handler;

use axum::{Router, middleware, routing::get};

use crate::auth::{require_auth, require_permission};
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/staff/kitchen/queue", get(handler::queue))
        .layer(middleware::from_fn(require_permission("kitchen:view")))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
