//! Dining Table Model (桌台)

use serde::{Deserialize, Serialize};

/// 桌台状态机
///
/// `INACTIVE ⇄ ACTIVE → OCCUPIED → (BILL_REQUESTED) → ACTIVE`（结账释放）
/// 或 `→ CLOSED`（管理员强制下线）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Inactive,
    Active,
    Occupied,
    BillRequested,
    Closed,
}

impl TableStatus {
    /// 顾客是否可以在此状态下入座（扫码开启会话）
    pub fn accepts_sessions(self) -> bool {
        matches!(self, TableStatus::Active | TableStatus::Occupied)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TableStatus::Inactive => "INACTIVE",
            TableStatus::Active => "ACTIVE",
            TableStatus::Occupied => "OCCUPIED",
            TableStatus::BillRequested => "BILL_REQUESTED",
            TableStatus::Closed => "CLOSED",
        };
        write!(f, "{s}")
    }
}

/// Dining table entity (桌台)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DiningTable {
    pub id: i64,
    pub restaurant_id: i64,
    /// 桌号，同一餐厅内唯一
    pub number: i64,
    /// 最大并发会话数（一桌多组客人各自点单）
    pub capacity: i64,
    pub status: TableStatus,
    /// 二维码标识（UUID），印在桌贴上
    pub qr_id: String,
    /// 二维码指向的 URL
    pub qr_url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create dining table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTableCreate {
    pub number: i64,
    pub capacity: Option<i64>,
}

/// 桌台概览（带实时会话数，用于员工端列表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTableSummary {
    #[serde(flatten)]
    pub table: DiningTable,
    pub active_sessions: i64,
}
