//! 实时推送消息类型定义
//!
//! 这些类型在 qr-server 和各端（顾客手机、后厨大屏、收银台、
//! 看板）之间共享，用于进程内分发和跨实例广播。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 逻辑房间 — 推送的寻址单元
///
/// 一条事件可同时投递到多个房间（如桌台房间 + 会话房间，
/// 客户端可能只订阅其一）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Room {
    /// 整个餐厅（员工 + 顾客）
    Restaurant(i64),
    /// 员工组（收银/经理终端）
    Staff(i64),
    /// 后厨显示屏
    Kitchen(i64),
    /// 单个桌台（在座全部顾客）
    Table(i64),
    /// 单个顾客会话
    Session(i64),
}

impl Room {
    /// 房间键，用于本地分发表寻址
    pub fn key(&self) -> String {
        match self {
            Room::Restaurant(id) => format!("restaurant:{id}"),
            Room::Staff(id) => format!("staff:{id}"),
            Room::Kitchen(id) => format!("kitchen:{id}"),
            Room::Table(id) => format!("table:{id}"),
            Room::Session(id) => format!("session:{id}"),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// 推送事件名（核心事件目录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushEventKind {
    #[serde(rename = "order:created")]
    OrderCreated,
    #[serde(rename = "order:updated")]
    OrderUpdated,
    #[serde(rename = "order:item:updated")]
    OrderItemUpdated,
    #[serde(rename = "order:cancelled")]
    OrderCancelled,
    #[serde(rename = "session:closed")]
    SessionClosed,
    #[serde(rename = "table:updated")]
    TableUpdated,
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PushEventKind::OrderCreated => "order:created",
            PushEventKind::OrderUpdated => "order:updated",
            PushEventKind::OrderItemUpdated => "order:item:updated",
            PushEventKind::OrderCancelled => "order:cancelled",
            PushEventKind::SessionClosed => "session:closed",
            PushEventKind::TableUpdated => "table:updated",
        };
        write!(f, "{s}")
    }
}

/// 推送事件 — 事件名 + 目标房间 + 业务载荷
///
/// 投递语义为 at-least-once；消费端把事件当作幂等的状态刷新信号,
/// 而不是严格有序的日志。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    /// 事件追踪 ID
    pub event_id: Uuid,
    pub kind: PushEventKind,
    /// 目标房间（本地分发时逐一匹配）
    pub rooms: Vec<Room>,
    /// 业务载荷（JSON）
    pub payload: serde_json::Value,
}

impl PushEvent {
    pub fn new(kind: PushEventKind, rooms: Vec<Room>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            rooms,
            payload,
        }
    }

    /// 序列化为跨实例广播的字节载荷
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// 从广播字节载荷解析
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// 解析载荷为指定类型
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// `order:updated` 载荷 — 携带前后状态，客户端据此对账
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: i64,
    pub order_number: i64,
    pub table_id: i64,
    pub previous: String,
    pub current: String,
}

/// `session:closed` 载荷 — 携带人类可读原因
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClosed {
    pub session_id: i64,
    pub table_id: i64,
    pub message: String,
}
