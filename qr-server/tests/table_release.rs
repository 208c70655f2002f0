//! 结账释放集成测试
//!
//! 未完结订单拦截、批量结清、会话停用、桌台回收、事件扇出。

mod common;

use common::*;

use shared::message::{PushEventKind, Room};
use shared::models::{CartItemInput, OrderCreate, OrderStatus, SessionContext, TableStatus};

use qr_server::db::repository::{OrderRepository, TableSessionRepository};

fn cart(menu_item_id: i64, quantity: i64) -> CartItemInput {
    CartItemInput {
        menu_item_id,
        quantity,
        extras: vec![],
        note: None,
    }
}

fn ctx_of(activated: &shared::models::SessionActivated) -> SessionContext {
    SessionContext {
        session_id: activated.session.id,
        table_id: activated.session.table_id,
        restaurant_id: activated.session.restaurant_id,
    }
}

#[tokio::test]
async fn release_blocks_on_outstanding_orders_and_lists_numbers() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "cashier");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);
    let order = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();

    let err = state.tables.release(&staff, table.id).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains(&format!("#{}", order.order.order_number)), "got: {msg}");

    // 拦截即零变更：订单仍 PENDING、会话仍在用、桌台仍 OCCUPIED
    let reloaded = state.orders.staff_order(&staff, order.order.id).await.unwrap();
    assert_eq!(reloaded.order.status, OrderStatus::Pending);
    let sessions = TableSessionRepository::new(state.db.clone());
    assert_eq!(sessions.count_active(table.id).await.unwrap(), 1);
    assert_eq!(reload_table(&state, &table).await.status, TableStatus::Occupied);
}

#[tokio::test]
async fn release_settles_ready_orders_and_frees_table() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 5.0, vec![]).await;
    let staff = staff_user(&restaurant, "cashier");

    let a = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let b = open_verified_session(&state, &table, "5511999990002", "device-b").await;

    let order_a = state
        .orders
        .create_order(&ctx_of(&a), OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    let order_b = state
        .orders
        .create_order(&ctx_of(&b), OrderCreate { items: vec![cart(item.id, 2)], note: None })
        .await
        .unwrap();

    drive_to_ready(&state, &staff, order_a.order.id).await;
    drive_to_ready(&state, &staff, order_b.order.id).await;

    let released = state.tables.release(&staff, table.id).await.unwrap();
    assert_eq!(released.status, TableStatus::Active);

    // 所有 READY 订单批量进入 PAID 并盖支付时间戳
    for id in [order_a.order.id, order_b.order.id] {
        let order = state.orders.staff_order(&staff, id).await.unwrap();
        assert_eq!(order.order.status, OrderStatus::Paid);
        assert!(order.order.paid_at.is_some());
    }

    // 零在用会话；顾客令牌失效（fail closed）
    let sessions = TableSessionRepository::new(state.db.clone());
    assert_eq!(sessions.count_active(table.id).await.unwrap(), 0);
    assert!(
        state
            .sessions
            .validate_token(&a.session_token)
            .await
            .unwrap()
            .is_none()
    );

    // PAID 为终态：不可再迁移
    assert!(
        state
            .orders
            .transition_status(&staff, order_a.order.id, OrderStatus::Preparing, None)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn release_emits_session_closed_to_table_and_session_rooms() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 5.0, vec![]).await;
    let staff = staff_user(&restaurant, "cashier");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let order = state
        .orders
        .create_order(&ctx_of(&activated), OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    drive_to_ready(&state, &staff, order.order.id).await;

    // 两类订阅端（桌台房间 / 会话房间）都要收到 — 客户端可能只订其一
    let mut table_rx = state.fanout.subscribe(Room::Table(table.id));
    let mut session_rx = state.fanout.subscribe(Room::Session(activated.session.id));

    state.tables.release(&staff, table.id).await.unwrap();

    let deadline = std::time::Duration::from_secs(2);
    let table_event = loop {
        let event = tokio::time::timeout(deadline, table_rx.recv())
            .await
            .expect("table room event")
            .unwrap();
        if event.kind == PushEventKind::SessionClosed {
            break event;
        }
    };
    let session_event = loop {
        let event = tokio::time::timeout(deadline, session_rx.recv())
            .await
            .expect("session room event")
            .unwrap();
        if event.kind == PushEventKind::SessionClosed {
            break event;
        }
    };

    assert_eq!(table_event.event_id, session_event.event_id);
    let payload: shared::message::SessionClosed = table_event.parse_payload().unwrap();
    assert_eq!(payload.session_id, activated.session.id);
    assert!(!payload.message.is_empty());
}

#[tokio::test]
async fn force_release_cancels_outstanding_and_frees_unconditionally() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 5.0, vec![]).await;
    let admin = staff_user(&restaurant, "admin");
    let staff = staff_user(&restaurant, "cashier");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);

    let pending = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    let ready = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 2)], note: None })
        .await
        .unwrap();
    drive_to_ready(&state, &staff, ready.order.id).await;

    let released = state
        .tables
        .force_release(&admin, table.id, "party left without paying attention")
        .await
        .unwrap();
    assert_eq!(released.status, TableStatus::Active);

    // 未完结的被取消；已出餐的照常结清
    let cancelled = state.orders.staff_order(&admin, pending.order.id).await.unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    let paid = state.orders.staff_order(&admin, ready.order.id).await.unwrap();
    assert_eq!(paid.order.status, OrderStatus::Paid);

    let sessions = TableSessionRepository::new(state.db.clone());
    assert_eq!(sessions.count_active(table.id).await.unwrap(), 0);
}

#[tokio::test]
async fn bill_request_then_release_cycles_table_states() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let staff = staff_user(&restaurant, "cashier");

    open_verified_session(&state, &table, "5511999990001", "device-a").await;
    assert_eq!(reload_table(&state, &table).await.status, TableStatus::Occupied);

    let billed = state
        .tables
        .request_bill(restaurant.id, table.id)
        .await
        .unwrap();
    assert_eq!(billed.status, TableStatus::BillRequested);

    // 没有任何订单 → 直接放行
    let released = state.tables.release(&staff, table.id).await.unwrap();
    assert_eq!(released.status, TableStatus::Active);
}

#[tokio::test]
async fn close_pulls_table_out_of_rotation() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let staff = staff_user(&restaurant, "manager");

    open_verified_session(&state, &table, "5511999990001", "device-a").await;

    let closed = state.tables.close(&staff, table.id).await.unwrap();
    assert_eq!(closed.status, TableStatus::Closed);
    let sessions = TableSessionRepository::new(state.db.clone());
    assert_eq!(sessions.count_active(table.id).await.unwrap(), 0);

    // 下线的桌子不可入座
    assert!(state.sessions.check_eligibility(&table.qr_id).await.is_err());

    // CLOSED → ACTIVE 重新启用；重复启用被拒
    let reopened = state.tables.activate(&staff, table.id).await.unwrap();
    assert_eq!(reopened.status, TableStatus::Active);
    assert!(state.tables.activate(&staff, table.id).await.is_err());
}

#[tokio::test]
async fn order_audit_log_is_append_only_trail() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 5.0, vec![]).await;
    let staff = staff_user(&restaurant, "cashier");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let order = state
        .orders
        .create_order(&ctx_of(&activated), OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    drive_to_ready(&state, &staff, order.order.id).await;
    state.tables.release(&staff, table.id).await.unwrap();

    let logs = OrderRepository::new(state.db.clone())
        .find_logs(order.order.id)
        .await
        .unwrap();
    let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["CREATED", "STATUS_CHANGED", "STATUS_CHANGED", "PAID"]
    );
}
