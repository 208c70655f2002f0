//! Table Session Handlers

use axum::{
    Extension, Json,
    extract::State,
};
use http::HeaderMap;

use shared::models::{DiningTable, SessionContext, SessionCreate, TableSession};

use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/sessions - 创建未验证会话（扫码后提交资料）
///
/// 同设备重复提交幂等返回既有会话。
pub async fn create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<SessionCreate>,
) -> AppResult<Json<TableSession>> {
    // ALB/反代场景取 X-Forwarded-For 首项作为客户端 IP
    let client_ip = forwarded_ip(&headers);
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let session = state
        .sessions
        .create_session(req, client_ip, user_agent)
        .await?;
    Ok(Json(session))
}

/// DELETE /api/sessions/current - 顾客主动结束会话（幂等）
pub async fn end_current(
    State(state): State<ServerState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<bool>> {
    state.sessions.end_session(ctx.session_id).await?;
    Ok(Json(true))
}

/// POST /api/sessions/bill - 请求买单（OCCUPIED → BILL_REQUESTED）
pub async fn request_bill(
    State(state): State<ServerState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<DiningTable>> {
    let table = state
        .tables
        .request_bill(ctx.restaurant_id, ctx.table_id)
        .await?;
    Ok(Json(table))
}

/// 代理/负载均衡后的真实客户端 IP
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
