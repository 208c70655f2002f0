//! 会话 API 模块
//!
//! 创建是公开接口（扫码后第一步）；终止/买单需要会话令牌。

mod handler;

use axum::{Router, middleware, routing::delete, routing::post};

use crate::auth::require_session;
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    let public = Router::new().route("/api/sessions", post(handler::create));

    let session_scoped = Router::new()
        .route("/api/sessions/current", delete(handler::end_current))
        .route("/api/sessions/bill", post(handler::request_bill))
        .layer(middleware::from_fn_with_state(state, require_session));

    public.merge(session_scoped)
}
