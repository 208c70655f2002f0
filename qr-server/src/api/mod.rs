//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`auth`] - 员工登录
//! - [`qr`] - 扫码资格检查（公开）
//! - [`verification`] - 验证码签发/校验（公开）
//! - [`sessions`] - 会话创建与终止
//! - [`orders`] - 顾客下单/查单（会话令牌）
//! - [`kitchen_orders`] - 后厨队列（员工）
//! - [`staff_orders`] - 员工订单管理
//! - [`statistics`] - 统计报表（员工）
//! - [`tables`] - 桌台管理与结账释放（员工）
//! - [`ws`] - 实时推送 WebSocket

pub mod auth;
pub mod health;
pub mod kitchen_orders;
pub mod orders;
pub mod qr;
pub mod sessions;
pub mod staff_orders;
pub mod statistics;
pub mod tables;
pub mod verification;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 组装全部路由
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(qr::router())
        .merge(verification::router())
        .merge(sessions::router(state.clone()))
        .merge(orders::router(state.clone()))
        .merge(kitchen_orders::router(state.clone()))
        .merge(staff_orders::router(state.clone()))
        .merge(statistics::router(state.clone()))
        .merge(tables::router(state.clone()))
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};
