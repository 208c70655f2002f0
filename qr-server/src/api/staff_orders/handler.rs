//! Staff Order Handlers

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use shared::models::{
    CancelOrderRequest, ItemStatusRequest, OrderWithItems, StatusTransitionRequest,
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::orders::OrderFilters;
use crate::utils::AppResult;

/// GET /api/staff/orders - 订单列表（状态/日期/桌台过滤 + 分页）
pub async fn list(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Query(filters): Query<OrderFilters>,
) -> AppResult<Json<Vec<OrderWithItems>>> {
    let orders = state.orders.restaurant_orders(&user, filters).await?;
    Ok(Json(orders))
}

/// GET /api/staff/orders/{id} - 订单详情
pub async fn get_by_id(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<OrderWithItems>> {
    let order = state.orders.staff_order(&user, id).await?;
    Ok(Json(order))
}

/// POST /api/staff/orders/{id}/status - 推进订单状态
pub async fn transition(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<StatusTransitionRequest>,
) -> AppResult<Json<OrderWithItems>> {
    let order = state
        .orders
        .transition_status(&user, id, req.status, req.reason)
        .await?;
    Ok(Json(order))
}

/// POST /api/staff/orders/{id}/items/{item_id}/status - 推进行项目状态
pub async fn item_status(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, item_id)): Path<(i64, i64)>,
    Json(req): Json<ItemStatusRequest>,
) -> AppResult<Json<OrderWithItems>> {
    let order = state
        .orders
        .update_item_status(&user, id, item_id, req.status)
        .await?;
    Ok(Json(order))
}

/// POST /api/staff/orders/{id}/cancel - 取消订单
pub async fn cancel(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CancelOrderRequest>,
) -> AppResult<Json<OrderWithItems>> {
    let order = state.orders.cancel_order(&user, id, req.reason).await?;
    Ok(Json(order))
}
