//! Table Session Model (就餐会话)
//!
//! 一组客人在一次到店用餐中、绑定单一设备的点单上下文。
//! 同一桌可并存多个会话（受桌台 capacity 约束），各自下单、全桌可见。

use serde::{Deserialize, Serialize};

/// Table session entity
///
/// 状态机：`unverified → verified → (active | inactive)`，
/// `inactive` 为终态；已验证会话不会回退为未验证。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TableSession {
    pub id: i64,
    pub restaurant_id: i64,
    pub table_id: i64,
    pub customer_name: String,
    /// 已规范化为纯数字
    pub customer_phone: String,
    /// 浏览器指纹 — 同设备重复扫码幂等返回既有会话
    pub device_fingerprint: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub verified: bool,
    pub verified_at: Option<i64>,
    pub active: bool,
    /// 硬过期时间（创建时刻 + 会话窗口）
    pub expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TableSession {
    /// 会话是否已过硬过期时间
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// 会话当前是否可下单
    pub fn can_order(&self, now: i64) -> bool {
        self.active && self.verified && !self.is_expired(now)
    }
}

/// Create session payload (扫码后提交)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreate {
    pub qr_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub device_fingerprint: String,
    /// 浏览器地理定位（用户可拒绝授权，缺失时软跳过围栏校验）
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// 会话令牌上下文 — 存放在临时存储中，由不透明令牌解析得到
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: i64,
    pub table_id: i64,
    pub restaurant_id: i64,
}

/// 验证成功响应：会话 + 后续请求使用的不透明令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionActivated {
    pub session: TableSession,
    pub session_token: String,
}
