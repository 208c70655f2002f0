//! Permission Definitions
//!
//! Simplified RBAC permission system.
//!
//! ## 设计原则
//! - 每个员工操作入口显式声明所需能力，由路由中间件统一校验
//! - 角色只是默认能力集合的名字；校验永远针对能力而不是角色
//! - `all` 为管理员超级能力

/// 可配置能力列表
pub const ALL_CAPABILITIES: &[&str] = &[
    "kitchen:view",    // 后厨队列查看
    "orders:manage",   // 订单状态/行项目推进、取消
    "tables:manage",   // 桌台增删、启用/下线
    "tables:release",  // 结账释放桌台
    "reports:view",    // 统计报表查看
    "menu:manage",     // 菜单维护
];

/// 角色默认能力
pub fn role_capabilities(role: &str) -> Vec<String> {
    let caps: &[&str] = match role {
        "admin" => &["all"],
        "manager" => &[
            "kitchen:view",
            "orders:manage",
            "tables:manage",
            "tables:release",
            "reports:view",
            "menu:manage",
        ],
        "cashier" => &["kitchen:view", "orders:manage", "tables:release", "reports:view"],
        "kitchen" => &["kitchen:view", "orders:manage"],
        _ => &[],
    };
    caps.iter().map(|s| s.to_string()).collect()
}

/// Validate if a permission string is valid
pub fn is_valid_capability(permission: &str) -> bool {
    ALL_CAPABILITIES.contains(&permission) || permission == "all" || permission.ends_with(":*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_capabilities() {
        assert_eq!(role_capabilities("admin"), vec!["all"]);
        assert!(role_capabilities("kitchen").contains(&"orders:manage".to_string()));
        assert!(!role_capabilities("kitchen").contains(&"tables:release".to_string()));
        assert!(role_capabilities("waiter").is_empty());
    }

    #[test]
    fn test_is_valid_capability() {
        assert!(is_valid_capability("orders:manage"));
        assert!(is_valid_capability("all"));
        assert!(is_valid_capability("orders:*"));
        assert!(!is_valid_capability("orders:launch"));
    }
}
