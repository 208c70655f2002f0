//! Verification Handlers

use axum::{Json, extract::State};

use shared::models::{SendCodeRequest, SendCodeResponse, SessionActivated, VerifyCodeRequest};
use shared::util::normalize_phone;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// POST /api/verification/send - 签发验证码
///
/// 冷却窗口内重复请求返回业务错误。
pub async fn send_code(
    State(state): State<ServerState>,
    Json(req): Json<SendCodeRequest>,
) -> AppResult<Json<SendCodeResponse>> {
    let phone = normalize_phone(&req.phone);
    if phone.is_empty() {
        return Err(AppError::validation("A phone number is required"));
    }

    // 经会话管理器解析二维码，桌台/餐厅校验走同一条路
    let eligibility = state.sessions.check_eligibility(&req.qr_id).await?;

    let expires_in = state
        .verification
        .send_code(&phone, eligibility.table_id, eligibility.restaurant_id)
        .await?;

    Ok(Json(SendCodeResponse { expires_in }))
}

/// POST /api/verification/verify - 校验验证码并激活会话
///
/// 成功返回会话 + 不透明会话令牌；此后顾客所有请求凭令牌。
pub async fn verify_code(
    State(state): State<ServerState>,
    Json(req): Json<VerifyCodeRequest>,
) -> AppResult<Json<SessionActivated>> {
    let activated = state
        .sessions
        .verify_and_activate(&req.qr_id, &req.phone, &req.code, &req.device_fingerprint)
        .await?;
    Ok(Json(activated))
}
