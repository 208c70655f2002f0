//! Menu Item Model (菜品)
//!
//! 菜单目录属于外部协作方，这里只保留下单校验与快照所需的最小表面。

use serde::{Deserialize, Serialize};

/// 可选配料（名称 + 加价），下单时按选择快照进订单行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuExtra {
    pub name: String,
    pub price: f64,
}

/// Menu item entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct MenuItem {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub price: f64,
    /// 可选配料列表（JSON 列）
    #[cfg_attr(feature = "db", sqlx(json))]
    pub extras: Vec<MenuExtra>,
    pub is_available: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create menu item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemCreate {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub extras: Vec<MenuExtra>,
}
