//! 桌台管理 API 模块（员工）
//!
//! 读/管分权：结账释放单独要求 `tables:release`，
//! 强制释放仅限管理员能力。

mod handler;

use axum::{Router, middleware, routing::get, routing::post};

use crate::auth::{require_auth, require_permission};
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    let manage_routes = Router::new()
        .route(
            "/api/staff/tables",
            get(handler::list).post(handler::create),
        )
        .route(
            "/api/staff/tables/{id}",
            axum::routing::delete(handler::delete),
        )
        .route("/api/staff/tables/{id}/activate", post(handler::activate))
        .route("/api/staff/tables/{id}/close", post(handler::close))
        .layer(middleware::from_fn(require_permission("tables:manage")));

    let release_routes = Router::new()
        .route("/api/staff/tables/{id}/release", post(handler::release))
        .layer(middleware::from_fn(require_permission("tables:release")));

    let admin_routes = Router::new()
        .route(
            "/api/staff/tables/{id}/force-release",
            post(handler::force_release),
        )
        .layer(middleware::from_fn(require_permission("all")));

    manage_routes
        .merge(release_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state, require_auth))
}
