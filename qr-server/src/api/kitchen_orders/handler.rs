//! Kitchen Queue Handlers

use axum::{Extension, Json, extract::State};

use shared::models::OrderWithItems;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

/// GET /api/staff/kitchen/queue - 后厨队列
///
/// PENDING/CONFIRMED/PREPARING/READY 订单，先进先出。
pub async fn queue(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<OrderWithItems>>> {
    let orders = state.orders.kitchen_queue(user.restaurant_id).await?;
    Ok(Json(orders))
}
