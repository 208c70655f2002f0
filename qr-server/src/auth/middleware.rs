//! 认证中间件
//!
//! 员工端为 JWT 认证 + 能力检查；顾客端为不透明会话令牌解析。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{CurrentUser, JwtService};
use crate::core::ServerState;
use crate::utils::AppError;

/// 员工认证中间件 - 要求登录
///
/// 从 `Authorization: Bearer <token>` 头提取并验证 JWT。
/// 验证成功后将 [`CurrentUser`] 注入请求扩展。
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = auth_header
        .and_then(JwtService::extract_from_header)
        .ok_or_else(|| {
            tracing::warn!(target: "security", uri = %req.uri(), "Missing staff credentials");
            AppError::unauthorized()
        })?;

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            let user = CurrentUser::from(claims);
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(target: "security", error = %e, uri = %req.uri(), "Staff auth failed");
            match e {
                crate::auth::JwtError::ExpiredToken => Err(AppError::token_expired()),
                _ => Err(AppError::invalid_token("Invalid token")),
            }
        }
    }
}

/// 能力检查中间件 - 要求特定能力
///
/// # 用法
///
/// ```ignore
/// use axum::middleware;
/// Router::new()
///     .route("/api/staff/kitchen/queue", get(handler::queue))
///     .layer(middleware::from_fn(require_permission("kitchen:view")));
/// ```
///
/// # 错误
///
/// 无能力返回 403 Forbidden
pub fn require_permission(
    permission: &'static str,
) -> impl Fn(
    Request,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>
+ Clone {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let user = req
                .extensions()
                .get::<CurrentUser>()
                .ok_or(AppError::unauthorized())?;

            if !user.has_permission(permission) {
                tracing::warn!(
                    target: "security",
                    user_id = %user.id,
                    username = %user.username,
                    required = permission,
                    "Permission denied"
                );
                return Err(AppError::forbidden(format!(
                    "Permission denied: {}",
                    permission
                )));
            }

            Ok(next.run(req).await)
        })
    }
}

/// 顾客会话中间件 - 要求有效的会话令牌
///
/// 解析 `Authorization: Bearer <session_token>`，经临时存储解出
/// 会话上下文后再对事实源复核存活状态（fail closed），
/// 将 [`shared::models::SessionContext`] 注入请求扩展。
pub async fn require_session(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(JwtService::extract_from_header)
        .ok_or_else(AppError::unauthorized)?;

    let ctx = state
        .sessions
        .validate_token(token)
        .await?
        .ok_or_else(|| AppError::invalid_token("Session expired or ended"))?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
