//! Statistics Handlers
//!
//! 营收口径（按支付时间）与当日动态口径（按创建时间）分接口，
//! 两套口径互不混用。

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use shared::models::{PaidStats, TodayActivity};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct PaidStatsQuery {
    /// YYYY-MM-DD（含）
    pub from: String,
    /// YYYY-MM-DD（含）
    pub to: String,
}

/// GET /api/staff/stats/paid - 已支付订单数与营收
pub async fn paid(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PaidStatsQuery>,
) -> AppResult<Json<PaidStats>> {
    let stats = state
        .orders
        .paid_stats(&user, &query.from, &query.to)
        .await?;
    Ok(Json(stats))
}

/// GET /api/staff/stats/today - 今日下单数（实时动态）
pub async fn today(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<TodayActivity>> {
    let stats = state.orders.today_activity(&user).await?;
    Ok(Json(stats))
}
