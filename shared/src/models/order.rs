//! Order Model (订单)
//!
//! 订单状态机与行项目快照。价格在下单时刻快照，
//! 后续菜单调价不影响已下单订单。

use serde::{Deserialize, Serialize};

use super::menu_item::MenuExtra;

/// 订单状态机
///
/// 合法迁移：
///
/// | From      | To                             |
/// |-----------|--------------------------------|
/// | PENDING   | CONFIRMED, PREPARING, CANCELLED |
/// | CONFIRMED | PREPARING, CANCELLED            |
/// | PREPARING | READY, CANCELLED                |
/// | READY     | PAID                            |
/// | PAID      | (终态)                          |
/// | CANCELLED | (终态)                          |
///
/// PENDING → PREPARING 直达是刻意保留的（后厨"接单并开做"一步到位）。
/// READY → PAID 只发生在整桌结账释放流程里，不开放为单笔员工操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// 该迁移是否在合法迁移表内
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Preparing)
                | (Pending, Cancelled)
                | (Confirmed, Preparing)
                | (Confirmed, Cancelled)
                | (Preparing, Ready)
                | (Preparing, Cancelled)
                | (Ready, Paid)
        )
    }

    /// 终态（不再接受任何迁移）
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// 后厨仍需处理的"未完结"状态
    pub fn is_outstanding(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// 行项目状态 — 与订单状态同粒度，供后厨逐项跟踪
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Cancelled,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Confirmed => "CONFIRMED",
            ItemStatus::Preparing => "PREPARING",
            ItemStatus::Ready => "READY",
            ItemStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub restaurant_id: i64,
    pub table_id: i64,
    pub session_id: i64,
    /// 营业日（餐厅时区的 YYYY-MM-DD），配合 order_number 组成单号
    pub business_date: String,
    /// 当日流水号，按 (restaurant, business_date) 递增
    pub order_number: i64,
    pub status: OrderStatus,
    pub subtotal: f64,
    /// 预留字段，当前流程恒为 0
    pub discount: f64,
    /// total = subtotal − discount
    pub total: f64,
    pub note: Option<String>,
    pub confirmed_at: Option<i64>,
    pub preparing_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order item entity — 创建时刻的价格/名称/配料快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub menu_item_id: i64,
    /// 名称快照
    pub name: String,
    pub quantity: i64,
    /// 单价快照
    pub unit_price: f64,
    /// 选中配料快照（JSON 列）
    #[cfg_attr(feature = "db", sqlx(json))]
    pub extras: Vec<MenuExtra>,
    /// (unit_price + Σ extras) × quantity
    pub line_total: f64,
    pub note: Option<String>,
    pub status: ItemStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order log entry — append-only 审计轨迹，永不改写
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderLog {
    pub id: i64,
    pub order_id: i64,
    /// CREATED | STATUS_CHANGED | ITEM_STATUS_CHANGED | CANCELLED | PAID
    pub action: String,
    pub actor_id: Option<String>,
    /// 结构化明细（JSON TEXT）
    pub detail: Option<String>,
    pub created_at: i64,
}

/// 顾客下单时的单行输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemInput {
    pub menu_item_id: i64,
    pub quantity: i64,
    /// 选中的配料名（按名称匹配菜品的 extras 列表）
    #[serde(default)]
    pub extras: Vec<String>,
    pub note: Option<String>,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub items: Vec<CartItemInput>,
    pub note: Option<String>,
}

/// 订单 + 行项目（API 返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// 是否属于请求方自己的会话（整桌订单列表里标记）
    #[serde(default)]
    pub is_mine: bool,
}

/// Staff status transition request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransitionRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

/// Staff item status transition request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStatusRequest {
    pub status: ItemStatus,
}

/// Cancel order request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

/// 已支付口径统计（按 paid_at 过滤）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaidStats {
    pub order_count: i64,
    pub revenue: f64,
}

/// 当日动态口径统计（按 created_at 过滤）— 与营收统计互不混用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodayActivity {
    pub orders_created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Preparing)); // 接单并开做
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Preparing.can_transition_to(Ready));
        assert!(Preparing.can_transition_to(Cancelled));
        assert!(Ready.can_transition_to(Paid));
    }

    #[test]
    fn test_illegal_transitions() {
        use OrderStatus::*;
        assert!(!Ready.can_transition_to(Preparing)); // 不可回退
        assert!(!Ready.can_transition_to(Cancelled)); // 取消走 cancel_order
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Confirmed.can_transition_to(Ready));
        for next in [Pending, Confirmed, Preparing, Ready, Paid, Cancelled] {
            assert!(!Paid.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_terminal_and_outstanding() {
        use OrderStatus::*;
        assert!(Paid.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Ready.is_terminal());
        assert!(Pending.is_outstanding());
        assert!(Confirmed.is_outstanding());
        assert!(Preparing.is_outstanding());
        assert!(!Ready.is_outstanding());
        assert!(!Paid.is_outstanding());
    }

    #[test]
    fn test_status_serde_screaming_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Preparing).unwrap(),
            "\"PREPARING\""
        );
        let parsed: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }
}
