//! QR Resolution Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use shared::models::TableSession;

use crate::core::ServerState;
use crate::sessions::Eligibility;
use crate::utils::AppResult;

/// GET /api/qr/{qr_id} - 扫码资格检查
///
/// 返回桌台/餐厅概况、营业状态、围栏要求和 `can_join`。
pub async fn eligibility(
    State(state): State<ServerState>,
    Path(qr_id): Path<String>,
) -> AppResult<Json<Eligibility>> {
    let result = state.sessions.check_eligibility(&qr_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ExistingSessionQuery {
    pub device_fingerprint: String,
}

/// GET /api/qr/{qr_id}/session - 幂等探测既有会话
///
/// 同设备重复扫码不开新会话。
pub async fn existing_session(
    State(state): State<ServerState>,
    Path(qr_id): Path<String>,
    Query(query): Query<ExistingSessionQuery>,
) -> AppResult<Json<Option<TableSession>>> {
    let session = state
        .sessions
        .lookup_existing(&qr_id, &query.device_fingerprint)
        .await?;
    Ok(Json(session))
}
