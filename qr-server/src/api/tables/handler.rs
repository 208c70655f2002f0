//! Dining Table Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use shared::models::{DiningTable, DiningTableCreate, DiningTableSummary};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

/// GET /api/staff/tables - 桌台列表（带在用会话数）
pub async fn list(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<DiningTableSummary>>> {
    let tables = state.tables.list_tables(&user).await?;
    Ok(Json(tables))
}

/// POST /api/staff/tables - 创建桌台
pub async fn create(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<DiningTableCreate>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.create_table(&user, payload).await?;
    Ok(Json(table))
}

/// DELETE /api/staff/tables/{id} - 删除桌台（从未用过才允许）
pub async fn delete(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<bool>> {
    state.tables.delete_table(&user, id).await?;
    Ok(Json(true))
}

/// POST /api/staff/tables/{id}/activate - 启用桌台
pub async fn activate(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.activate(&user, id).await?;
    Ok(Json(table))
}

/// POST /api/staff/tables/{id}/close - 下线桌台
pub async fn close(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.close(&user, id).await?;
    Ok(Json(table))
}

/// POST /api/staff/tables/{id}/release - 结账释放
///
/// 存在未完结订单时返回 400，文案列出拦路单号。
pub async fn release(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<DiningTable>> {
    let table = state.tables.release(&user, id).await?;
    Ok(Json(table))
}

#[derive(Debug, Deserialize)]
pub struct ForceReleaseRequest {
    pub reason: Option<String>,
}

/// POST /api/staff/tables/{id}/force-release - 强制释放（管理员）
pub async fn force_release(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<ForceReleaseRequest>,
) -> AppResult<Json<DiningTable>> {
    let reason = req
        .reason
        .unwrap_or_else(|| "Force released by admin".to_string());
    let table = state.tables.force_release(&user, id, &reason).await?;
    Ok(Json(table))
}
