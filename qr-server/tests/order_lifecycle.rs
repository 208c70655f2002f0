//! 订单生命周期集成测试
//!
//! 创建（快照/合计/当日流水号）→ 状态机 → 行项目聚合 → 取消 →
//! 读路径（后厨队列 / 整桌订单防泄漏）→ 双口径统计。

mod common;

use common::*;

use shared::models::{
    CartItemInput, ItemStatus, MenuExtra, OrderCreate, OrderStatus, SessionContext,
};

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
async fn create_order_snapshots_prices_and_numbers_sequentially() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let noodles = seed_menu_item(&state, &restaurant, "Dan Dan Noodles", 38.0, vec![]).await;
    let tea = seed_menu_item(
        &state,
        &restaurant,
        "Iced Tea",
        8.0,
        vec![
            MenuExtra {
                name: "Lemon".to_string(),
                price: 2.0,
            },
            MenuExtra {
                name: "Boba".to_string(),
                price: 4.0,
            },
        ],
    )
    .await;

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);

    let order = state
        .orders
        .create_order(
            &ctx,
            OrderCreate {
                items: vec![
                    cart(noodles.id, 2),
                    CartItemInput {
                        menu_item_id: tea.id,
                        quantity: 3,
                        extras: vec!["Lemon".to_string(), "Boba".to_string()],
                        note: Some("less ice".to_string()),
                    },
                ],
                note: Some("table by the window".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(order.order.order_number, 1);
    assert_eq!(order.order.status, OrderStatus::Pending);
    // 38×2 + (8+2+4)×3 = 76 + 42 = 118
    assert!((order.order.subtotal - 118.0).abs() < 1e-9);
    assert_eq!(order.order.discount, 0.0);
    assert!((order.order.total - 118.0).abs() < 1e-9);
    assert_eq!(order.items.len(), 2);
    let tea_line = order
        .items
        .iter()
        .find(|i| i.menu_item_id == tea.id)
        .unwrap();
    assert_eq!(tea_line.extras.len(), 2);
    assert!((tea_line.line_total - 42.0).abs() < 1e-9);
    assert_eq!(tea_line.status, ItemStatus::Pending);

    // 第二单拿下一个流水号
    let second = state
        .orders
        .create_order(
            &ctx,
            OrderCreate {
                items: vec![cart(noodles.id, 1)],
                note: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(second.order.order_number, 2);
}

#[tokio::test]
async fn unavailable_item_rejects_whole_order() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let good = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let gone = seed_menu_item(&state, &restaurant, "Soup", 18.0, vec![]).await;

    qr_server::db::repository::MenuItemRepository::new(state.db.clone())
        .set_available(restaurant.id, gone.id, false)
        .await
        .unwrap();

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);

    let err = state
        .orders
        .create_order(
            &ctx,
            OrderCreate {
                items: vec![cart(good.id, 1), cart(gone.id, 1)],
                note: None,
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no longer available"), "got: {err}");

    // all-or-nothing：一单都没落库
    assert!(state.orders.table_orders(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn unverified_session_cannot_order() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;

    let session = open_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = SessionContext {
        session_id: session.id,
        table_id: table.id,
        restaurant_id: restaurant.id,
    };

    let err = state
        .orders
        .create_order(
            &ctx,
            OrderCreate {
                items: vec![cart(item.id, 1)],
                note: None,
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not verified"), "got: {err}");
}

#[tokio::test]
async fn status_machine_rejects_illegal_edges_without_mutation() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "kitchen");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);
    let order = state
        .orders
        .create_order(
            &ctx,
            OrderCreate {
                items: vec![cart(item.id, 1)],
                note: None,
            },
        )
        .await
        .unwrap();
    let order_id = order.order.id;

    // PENDING → READY 不在迁移表内
    let err = state
        .orders
        .transition_status(&staff, order_id, OrderStatus::Ready, None)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("PENDING") && msg.contains("READY"), "got: {msg}");

    // 员工不能把单直接打成 PAID
    assert!(
        state
            .orders
            .transition_status(&staff, order_id, OrderStatus::Paid, None)
            .await
            .is_err()
    );

    // 未发生任何变更
    let unchanged = state.orders.staff_order(&staff, order_id).await.unwrap();
    assert_eq!(unchanged.order.status, OrderStatus::Pending);
    assert!(unchanged.order.ready_at.is_none());

    // PENDING → PREPARING 直达（接单并开做）是合法的
    let updated = state
        .orders
        .transition_status(&staff, order_id, OrderStatus::Preparing, None)
        .await
        .unwrap();
    assert_eq!(updated.order.status, OrderStatus::Preparing);
    assert!(updated.order.preparing_at.is_some());

    // 终态不可再动
    let ready = state
        .orders
        .transition_status(&staff, order_id, OrderStatus::Ready, None)
        .await
        .unwrap();
    assert_eq!(ready.order.status, OrderStatus::Ready);
}

#[tokio::test]
async fn entering_ready_force_syncs_lagging_items() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "kitchen");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let order = state
        .orders
        .create_order(
            &ctx_of(&activated),
            OrderCreate {
                items: vec![cart(item.id, 1), cart(item.id, 2)],
                note: None,
            },
        )
        .await
        .unwrap();

    let ready = drive_to_ready(&state, &staff, order.order.id).await;
    assert_eq!(ready.order.status, OrderStatus::Ready);
    assert!(ready.order.ready_at.is_some());
    // 订单 READY 时行项目不允许落后
    assert!(ready.items.iter().all(|i| i.status == ItemStatus::Ready));
}

#[tokio::test]
async fn last_item_ready_promotes_order_atomically() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "kitchen");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let order = state
        .orders
        .create_order(
            &ctx_of(&activated),
            OrderCreate {
                items: vec![cart(item.id, 1), cart(item.id, 1), cart(item.id, 1)],
                note: None,
            },
        )
        .await
        .unwrap();
    let order_id = order.order.id;

    state
        .orders
        .transition_status(&staff, order_id, OrderStatus::Preparing, None)
        .await
        .unwrap();

    // 前两个行项目就绪：订单仍在备餐
    for item_row in &order.items[..2] {
        let after = state
            .orders
            .update_item_status(&staff, order_id, item_row.id, ItemStatus::Ready)
            .await
            .unwrap();
        assert_eq!(after.order.status, OrderStatus::Preparing);
        assert!(after.order.ready_at.is_none());
    }

    // 最后一个就绪：同一逻辑操作内订单升 READY 并盖 ready_at
    let promoted = state
        .orders
        .update_item_status(&staff, order_id, order.items[2].id, ItemStatus::Ready)
        .await
        .unwrap();
    assert_eq!(promoted.order.status, OrderStatus::Ready);
    assert!(promoted.order.ready_at.is_some());
    assert!(promoted.items.iter().all(|i| i.status == ItemStatus::Ready));
}

#[tokio::test]
async fn cancel_is_blocked_on_terminal_orders() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "manager");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let order = state
        .orders
        .create_order(
            &ctx_of(&activated),
            OrderCreate {
                items: vec![cart(item.id, 1)],
                note: None,
            },
        )
        .await
        .unwrap();

    let cancelled = state
        .orders
        .cancel_order(&staff, order.order.id, "customer changed mind".to_string())
        .await
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert!(cancelled.order.cancelled_at.is_some());
    assert!(
        cancelled
            .items
            .iter()
            .all(|i| i.status == ItemStatus::Cancelled)
    );

    // 已取消的不能再取消
    assert!(
        state
            .orders
            .cancel_order(&staff, order.order.id, "again".to_string())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn kitchen_queue_is_fifo_and_excludes_terminal() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "kitchen");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);

    let first = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    let second = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    let third = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();

    state
        .orders
        .cancel_order(&staff, third.order.id, "oops".to_string())
        .await
        .unwrap();

    let queue = state.orders.kitchen_queue(restaurant.id).await.unwrap();
    let ids: Vec<i64> = queue.iter().map(|o| o.order.id).collect();
    assert_eq!(ids, vec![first.order.id, second.order.id]);
}

#[tokio::test]
async fn table_orders_exclude_closed_sessions_and_flag_ownership() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;

    // 第一组客人下单后离席
    let first = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let first_ctx = ctx_of(&first);
    state
        .orders
        .create_order(&first_ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    state.sessions.end_session(first.session.id).await.unwrap();

    // 第二组两台设备同桌
    let second = open_verified_session(&state, &table, "5511999990002", "device-b").await;
    let third = open_verified_session(&state, &table, "5511999990003", "device-c").await;
    let second_ctx = ctx_of(&second);
    let third_ctx = ctx_of(&third);

    let mine = state
        .orders
        .create_order(&second_ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    let theirs = state
        .orders
        .create_order(&third_ctx, OrderCreate { items: vec![cart(item.id, 2)], note: None })
        .await
        .unwrap();

    let visible = state.orders.table_orders(&second_ctx).await.unwrap();
    // 旧会话（已关闭）的订单不得泄漏
    assert_eq!(visible.len(), 2);
    let mine_row = visible.iter().find(|o| o.order.id == mine.order.id).unwrap();
    let theirs_row = visible
        .iter()
        .find(|o| o.order.id == theirs.order.id)
        .unwrap();
    assert!(mine_row.is_mine);
    assert!(!theirs_row.is_mine);
}

#[tokio::test]
async fn staff_list_filters_by_status_and_active_sessions() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 3.0, vec![]).await;
    let staff = staff_user(&restaurant, "cashier");

    let gone = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    state
        .orders
        .create_order(&ctx_of(&gone), OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    state.sessions.end_session(gone.session.id).await.unwrap();

    let here = open_verified_session(&state, &table, "5511999990002", "device-b").await;
    let live_order = state
        .orders
        .create_order(&ctx_of(&here), OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();

    // 全量：两单
    let all = state
        .orders
        .restaurant_orders(&staff, Default::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    // 收银视图（仅在用会话）：一单
    let active_only = state
        .orders
        .restaurant_orders(
            &staff,
            qr_server::orders::OrderFilters {
                active_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active_only.len(), 1);
    assert_eq!(active_only[0].order.id, live_order.order.id);

    // 状态过滤
    let pending = state
        .orders
        .restaurant_orders(
            &staff,
            qr_server::orders::OrderFilters {
                status: Some(OrderStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn paid_stats_and_today_activity_use_separate_clocks() {
    let state = test_state().await;
    let restaurant = seed_restaurant(&state).await;
    let table = seed_table(&state, &restaurant, 1, 4).await;
    let item = seed_menu_item(&state, &restaurant, "Rice", 10.0, vec![]).await;
    let staff = staff_user(&restaurant, "manager");

    let activated = open_verified_session(&state, &table, "5511999990001", "device-a").await;
    let ctx = ctx_of(&activated);

    let paid_one = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 1)], note: None })
        .await
        .unwrap();
    let _unpaid = state
        .orders
        .create_order(&ctx, OrderCreate { items: vec![cart(item.id, 3)], note: None })
        .await
        .unwrap();

    // 推到 READY 后整桌结账（唯一的批量 PAID 通道）——
    // 另一单仍 PENDING 会拦下 release，先把它取消
    drive_to_ready(&state, &staff, paid_one.order.id).await;
    state
        .orders
        .cancel_order(&staff, _unpaid.order.id, "test".to_string())
        .await
        .unwrap();
    state.tables.release(&staff, table.id).await.unwrap();

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let stats = state.orders.paid_stats(&staff, &today, &today).await.unwrap();
    // 营收口径只数已支付的一单（10 元）
    assert_eq!(stats.order_count, 1);
    assert!((stats.revenue - 10.0).abs() < 1e-9);

    // 动态口径数今天创建的两单（含被取消的）
    let activity = state.orders.today_activity(&staff).await.unwrap();
    assert_eq!(activity.orders_created, 2);
}
