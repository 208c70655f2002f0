//! WebSocket handler for real-time push
//!
//! 浏览器 WebSocket 无法携带 Authorization 头，令牌经查询参数传入：
//! - `?token=<session_token>` — 顾客：加入本餐厅/本桌/本会话房间
//! - `?staff=<jwt>` — 员工：加入餐厅/员工/后厨房间
//!
//! 推送事件以 JSON 文本帧下发；客户端把事件当作幂等刷新信号。

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use shared::message::{PushEvent, Room};

use crate::core::ServerState;
use crate::utils::AppError;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// 顾客会话令牌
    pub token: Option<String>,
    /// 员工 JWT
    pub staff: Option<String>,
}

/// GET /api/ws — upgrade to WebSocket
pub async fn handle_ws(
    State(state): State<ServerState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // 升级前先解出可加入的房间（fail closed）
    let rooms = resolve_rooms(&state, &query).await?;
    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, state, rooms)))
}

async fn resolve_rooms(state: &ServerState, query: &WsQuery) -> Result<Vec<Room>, AppError> {
    if let Some(token) = &query.token {
        let ctx = state
            .sessions
            .validate_token(token)
            .await?
            .ok_or_else(|| AppError::invalid_token("Session expired or ended"))?;
        return Ok(vec![
            Room::Restaurant(ctx.restaurant_id),
            Room::Table(ctx.table_id),
            Room::Session(ctx.session_id),
        ]);
    }

    if let Some(jwt) = &query.staff {
        let claims = state
            .jwt_service
            .validate_token(jwt)
            .map_err(|e| AppError::invalid_token(e.to_string()))?;
        return Ok(vec![
            Room::Restaurant(claims.restaurant_id),
            Room::Staff(claims.restaurant_id),
            Room::Kitchen(claims.restaurant_id),
        ]);
    }

    Err(AppError::unauthorized())
}

async fn handle_ws_connection(socket: WebSocket, state: ServerState, rooms: Vec<Room>) {
    tracing::info!(?rooms, "WebSocket connected");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // 每个房间一个转发任务，汇入单条 mpsc 后写 socket
    let (msg_tx, mut msg_rx) = mpsc::channel::<PushEvent>(32);
    for room in &rooms {
        let mut rx = state.fanout.subscribe(*room);
        let tx = msg_tx.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        // 连接关闭后 send 失败，任务随之退出
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("WS subscriber lagged by {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }
    drop(msg_tx);

    loop {
        tokio::select! {
            event = msg_rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to encode push event: {}", e);
                    }
                }
            }
            incoming = ws_stream.next() => {
                match incoming {
                    // 入站只关心关闭；客户端不经 WS 发指令
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!("WebSocket disconnected");
}
