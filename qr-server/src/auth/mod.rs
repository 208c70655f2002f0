//! 认证模块 - 员工 JWT 认证与权限
//!
//! # 模块结构
//!
//! - [`jwt`] - JWT 令牌服务
//! - [`middleware`] - Axum 认证/鉴权中间件
//! - [`permissions`] - 能力定义与角色默认能力

pub mod jwt;
pub mod middleware;
pub mod permissions;

pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
pub use middleware::{require_auth, require_permission, require_session};
pub use permissions::role_capabilities;

use serde::{Deserialize, Serialize};

/// 当前登录员工 — 认证中间件注入请求扩展
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: String,
    pub restaurant_id: i64,
    pub permissions: Vec<String>,
}

impl CurrentUser {
    /// 能力检查；`all` 匹配一切，`orders:*` 匹配整组
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| {
            p == "all"
                || p == permission
                || (p.ends_with(":*")
                    && permission.starts_with(&p[..p.len() - 1]))
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
            restaurant_id: claims.restaurant_id,
            permissions: claims
                .permissions
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(perms: &[&str]) -> CurrentUser {
        CurrentUser {
            id: "1".into(),
            username: "chef".into(),
            role: "kitchen".into(),
            restaurant_id: 1,
            permissions: perms.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_exact_and_wildcard_permissions() {
        assert!(user(&["orders:manage"]).has_permission("orders:manage"));
        assert!(!user(&["orders:manage"]).has_permission("tables:release"));
        assert!(user(&["orders:*"]).has_permission("orders:manage"));
        assert!(user(&["all"]).has_permission("tables:release"));
    }
}
