//! 集成测试公共工具：内存库状态、种子数据、全流程会话开启
#![allow(dead_code)]

use qr_server::auth::{CurrentUser, role_capabilities};
use qr_server::db::DbService;
use qr_server::db::repository::{
    DiningTableRepository, MenuItemRepository, RestaurantRepository,
};
use qr_server::{Config, ServerState};

use shared::models::{
    DayHours, DiningTable, DiningTableCreate, MenuExtra, MenuItem, MenuItemCreate, Restaurant,
    RestaurantCreate, SessionActivated, SessionCreate, TableStatus, WeeklyHours,
};

/// 全天营业的营业时间表（open == close → 24h），测试不受墙钟影响
pub fn always_open() -> WeeklyHours {
    let all_day = DayHours {
        open: "00:00".to_string(),
        close: "00:00".to_string(),
        closed: false,
    };
    WeeklyHours {
        mon: all_day.clone(),
        tue: all_day.clone(),
        wed: all_day.clone(),
        thu: all_day.clone(),
        fri: all_day.clone(),
        sat: all_day.clone(),
        sun: all_day,
    }
}

/// 测试配置：无冷却、短会话窗口便于直接验证
pub fn test_config() -> Config {
    let mut config = Config::with_overrides("/tmp/qr-server-test", 0);
    config.verification_cooldown_secs = 0;
    config
}

/// 内存库 + 后台任务就绪的服务器状态
pub async fn test_state() -> ServerState {
    test_state_with_config(test_config()).await
}

pub async fn test_state_with_config(config: Config) -> ServerState {
    let db = DbService::new_in_memory().await.expect("in-memory db");
    let state = ServerState::with_pool(&config, db.pool);
    state.start_background_tasks();
    state
}

/// 种子餐厅（UTC、全天营业、围栏默认关闭）
pub async fn seed_restaurant(state: &ServerState) -> Restaurant {
    RestaurantRepository::new(state.db.clone())
        .create(
            RestaurantCreate {
                name: "Test Bistro".to_string(),
                timezone: Some("UTC".to_string()),
                latitude: None,
                longitude: None,
                geofence_radius_m: None,
                require_geofence: false,
                operating_hours: Some(always_open()),
            },
            150.0,
        )
        .await
        .expect("seed restaurant")
}

/// 种子桌台并直接置 ACTIVE
pub async fn seed_table(state: &ServerState, restaurant: &Restaurant, number: i64, capacity: i64) -> DiningTable {
    let repo = DiningTableRepository::new(state.db.clone());
    let table = repo
        .create(
            restaurant.id,
            DiningTableCreate {
                number,
                capacity: Some(capacity),
            },
        )
        .await
        .expect("seed table");
    repo.update_status_guarded(table.id, &[TableStatus::Inactive], TableStatus::Active)
        .await
        .expect("activate table");
    repo.find_by_id(restaurant.id, table.id)
        .await
        .expect("reload table")
        .expect("table exists")
}

/// 种子菜品
pub async fn seed_menu_item(
    state: &ServerState,
    restaurant: &Restaurant,
    name: &str,
    price: f64,
    extras: Vec<MenuExtra>,
) -> MenuItem {
    MenuItemRepository::new(state.db.clone())
        .create(
            restaurant.id,
            MenuItemCreate {
                name: name.to_string(),
                price,
                extras,
            },
        )
        .await
        .expect("seed menu item")
}

/// 员工用户（经角色默认能力构造）
pub fn staff_user(restaurant: &Restaurant, role: &str) -> CurrentUser {
    CurrentUser {
        id: "staff-1".to_string(),
        username: format!("{role}-1"),
        role: role.to_string(),
        restaurant_id: restaurant.id,
        permissions: role_capabilities(role),
    }
}

/// 未验证会话创建
pub async fn open_session(
    state: &ServerState,
    table: &DiningTable,
    phone: &str,
    fingerprint: &str,
) -> shared::models::TableSession {
    state
        .sessions
        .create_session(
            SessionCreate {
                qr_id: table.qr_id.clone(),
                customer_name: "Alice".to_string(),
                customer_phone: phone.to_string(),
                device_fingerprint: fingerprint.to_string(),
                latitude: None,
                longitude: None,
            },
            Some("127.0.0.1".to_string()),
            Some("test-agent".to_string()),
        )
        .await
        .expect("create session")
}

/// 最近一次签发的验证码（读审计表）
pub async fn last_issued_code(state: &ServerState, phone: &str) -> String {
    sqlx::query_scalar::<_, String>(
        "SELECT code FROM verification_code WHERE phone = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(phone)
    .fetch_one(&state.db)
    .await
    .expect("issued code")
}

/// 全流程开启已验证会话：建会话 → 发码 → 核验 → 拿令牌
pub async fn open_verified_session(
    state: &ServerState,
    table: &DiningTable,
    phone: &str,
    fingerprint: &str,
) -> SessionActivated {
    open_session(state, table, phone, fingerprint).await;
    state
        .verification
        .send_code(phone, table.id, table.restaurant_id)
        .await
        .expect("send code");
    let code = last_issued_code(state, phone).await;
    state
        .sessions
        .verify_and_activate(&table.qr_id, phone, &code, fingerprint)
        .await
        .expect("verify session")
}

/// 重新加载桌台
pub async fn reload_table(state: &ServerState, table: &DiningTable) -> DiningTable {
    DiningTableRepository::new(state.db.clone())
        .find_by_id(table.restaurant_id, table.id)
        .await
        .expect("reload")
        .expect("table exists")
}

/// 员工推单到 READY（PENDING → PREPARING → READY）
pub async fn drive_to_ready(
    state: &ServerState,
    staff: &CurrentUser,
    order_id: i64,
) -> shared::models::OrderWithItems {
    state
        .orders
        .transition_status(staff, order_id, shared::models::OrderStatus::Preparing, None)
        .await
        .expect("to preparing");
    state
        .orders
        .transition_status(staff, order_id, shared::models::OrderStatus::Ready, None)
        .await
        .expect("to ready")
}
