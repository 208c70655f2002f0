//! Customer Order Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use shared::models::{OrderCreate, OrderWithItems, SessionContext};

use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/orders - 顾客下单
pub async fn create(
    State(state): State<ServerState>,
    Extension(ctx): Extension<SessionContext>,
    Json(req): Json<OrderCreate>,
) -> AppResult<Json<OrderWithItems>> {
    let order = state.orders.create_order(&ctx, req).await?;
    Ok(Json(order))
}

/// GET /api/orders - 整桌订单（标记哪些属于本会话）
pub async fn list_table(
    State(state): State<ServerState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Json<Vec<OrderWithItems>>> {
    let orders = state.orders.table_orders(&ctx).await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id} - 读取单个订单（须属于本桌在用会话）
pub async fn get_by_id(
    State(state): State<ServerState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<OrderWithItems>> {
    let order = state.orders.customer_order(&ctx, id).await?;
    Ok(Json(order))
}
