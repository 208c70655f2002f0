//! 订单生命周期管理器
//!
//! 从已验证会话创建订单，驱动后厨/收银的订单与行项目状态机，
//! 行项目全就绪时聚合提升订单状态。每次状态变更都发实时事件并
//! 落审计日志。

use serde::Deserialize;
use sqlx::SqlitePool;

use shared::message::{OrderStatusChanged, PushEvent, PushEventKind, Room};
use shared::models::{
    CartItemInput, ItemStatus, MenuExtra, OrderCreate, OrderStatus, OrderWithItems, PaidStats,
    SessionContext, TableStatus, TodayActivity,
};
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::db::repository::{
    DiningTableRepository, MenuItemRepository, OrderRepository, RestaurantRepository,
    TableSessionRepository,
    order::{ItemInsert, OrderInsert},
};
use crate::fanout::FanoutHub;
use crate::utils::{AppError, AppResult, time};

/// 单价/数量上限 — 防御恶意输入
const MAX_QUANTITY: i64 = 99;
const MAX_ITEMS_PER_ORDER: usize = 100;

/// 员工端订单列表过滤参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    /// 营业日 YYYY-MM-DD（按创建时间换算餐厅时区）
    pub date: Option<String>,
    pub table_id: Option<i64>,
    /// 仅看当前在用会话的订单（收银视图防旧账单泄漏）
    #[serde(default)]
    pub active_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// 订单生命周期管理器
#[derive(Clone)]
pub struct OrderLifecycleManager {
    orders: OrderRepository,
    sessions: TableSessionRepository,
    tables: DiningTableRepository,
    restaurants: RestaurantRepository,
    menu: MenuItemRepository,
    fanout: FanoutHub,
}

impl OrderLifecycleManager {
    pub fn new(pool: SqlitePool, fanout: FanoutHub) -> Self {
        Self {
            orders: OrderRepository::new(pool.clone()),
            sessions: TableSessionRepository::new(pool.clone()),
            tables: DiningTableRepository::new(pool.clone()),
            restaurants: RestaurantRepository::new(pool.clone()),
            menu: MenuItemRepository::new(pool),
            fanout,
        }
    }

    // ========== 创建 ==========

    /// 从已验证会话创建订单（all-or-nothing）
    ///
    /// 任一菜品不可用则整单拒绝；行项目带价格/配料快照；
    /// 单号按 (餐厅, 营业日) 递增；订单 + 行项目 + 日志单事务落库。
    pub async fn create_order(
        &self,
        ctx: &SessionContext,
        data: OrderCreate,
    ) -> AppResult<OrderWithItems> {
        // 会话存活性复核（令牌中间件之外的第二道闸）
        let session = self
            .sessions
            .find_by_id(ctx.session_id)
            .await?
            .ok_or_else(|| AppError::forbidden("Session not found"))?;
        if !session.can_order(now_millis()) {
            return Err(AppError::forbidden(
                "Session is not verified or has expired",
            ));
        }

        if data.items.is_empty() {
            return Err(AppError::validation("Order must contain at least one item"));
        }
        if data.items.len() > MAX_ITEMS_PER_ORDER {
            return Err(AppError::validation(format!(
                "Too many items in one order (max {MAX_ITEMS_PER_ORDER})"
            )));
        }

        let restaurant = self.restaurants.find_active(ctx.restaurant_id).await?;

        // 菜品解析：全部可用才放行
        let mut items = Vec::with_capacity(data.items.len());
        let mut subtotal = 0.0_f64;
        for input in &data.items {
            let item = self.build_line(ctx.restaurant_id, input).await?;
            subtotal += item.line_total;
            items.push(item);
        }

        let discount = 0.0;
        let total = subtotal - discount;

        let created = self
            .orders
            .create_with_items(OrderInsert {
                restaurant_id: ctx.restaurant_id,
                table_id: ctx.table_id,
                session_id: ctx.session_id,
                business_date: time::business_date_string(restaurant.tz()),
                subtotal,
                discount,
                total,
                note: data.note,
                items,
            })
            .await?;

        // 桌台若仍是 ACTIVE（会话路径之外的兜底），提升为 OCCUPIED。
        // 这是跨组件写入，属于文档化的副作用而不是越权。
        self.tables
            .update_status_guarded(ctx.table_id, &[TableStatus::Active], TableStatus::Occupied)
            .await?;

        self.fanout.emit(
            ctx.restaurant_id,
            PushEvent::new(
                PushEventKind::OrderCreated,
                vec![
                    Room::Restaurant(ctx.restaurant_id),
                    Room::Kitchen(ctx.restaurant_id),
                    Room::Table(ctx.table_id),
                    Room::Session(ctx.session_id),
                ],
                serde_json::to_value(&created).unwrap_or_default(),
            ),
        );

        tracing::info!(
            order_number = created.order.order_number,
            total = created.order.total,
            "Order created"
        );
        Ok(created)
    }

    /// 解析一行输入：校验可用性，快照名称/单价/配料，算行合计
    async fn build_line(&self, restaurant_id: i64, input: &CartItemInput) -> AppResult<ItemInsert> {
        if input.quantity <= 0 || input.quantity > MAX_QUANTITY {
            return Err(AppError::validation(format!(
                "Invalid quantity {} (must be 1..={MAX_QUANTITY})",
                input.quantity
            )));
        }

        let item = self
            .menu
            .find_by_id(restaurant_id, input.menu_item_id)
            .await?
            .ok_or_else(|| {
                AppError::validation(format!("Menu item {} does not exist", input.menu_item_id))
            })?;
        if !item.is_available {
            return Err(AppError::business_rule(format!(
                "'{}' is no longer available",
                item.name
            )));
        }

        // 配料按名称从菜品快照中解析；未知配料名整单拒绝
        let mut extras: Vec<MenuExtra> = Vec::with_capacity(input.extras.len());
        for name in &input.extras {
            let extra = item
                .extras
                .iter()
                .find(|e| &e.name == name)
                .ok_or_else(|| {
                    AppError::validation(format!("Unknown extra '{}' for '{}'", name, item.name))
                })?;
            extras.push(extra.clone());
        }

        let extras_total: f64 = extras.iter().map(|e| e.price).sum();
        let line_total = (item.price + extras_total) * input.quantity as f64;
        if !line_total.is_finite() {
            return Err(AppError::validation("Line total overflows"));
        }

        Ok(ItemInsert {
            menu_item_id: item.id,
            name: item.name,
            quantity: input.quantity,
            unit_price: item.price,
            extras_json: serde_json::to_string(&extras)
                .map_err(|e| AppError::internal(format!("Encode extras: {e}")))?,
            line_total,
            note: input.note.clone(),
        })
    }

    // ========== 状态迁移 ==========

    /// 员工推进订单状态
    ///
    /// 非法迁移整体拒绝且不产生任何变更，错误文案携带当前态与
    /// 目标态；PAID 不开放为直接目标（只能经整桌结账释放）。
    pub async fn transition_status(
        &self,
        actor: &CurrentUser,
        order_id: i64,
        next: OrderStatus,
        reason: Option<String>,
    ) -> AppResult<OrderWithItems> {
        let order = self
            .orders
            .find_by_id(actor.restaurant_id, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        if next == OrderStatus::Paid {
            return Err(AppError::business_rule(
                "Orders are settled through table checkout, not a direct status change",
            ));
        }
        if !order.status.can_transition_to(next) {
            return Err(AppError::business_rule(format!(
                "Illegal transition: order #{} is {} and cannot become {}",
                order.order_number, order.status, next
            )));
        }

        let previous = order.status;
        let updated = self
            .orders
            .apply_transition(&order, next, Some(&actor.id), reason.as_deref())
            .await?;

        self.emit_status_change(&updated, previous);

        let items = self.orders.find_items(updated.id).await?;
        Ok(OrderWithItems {
            order: updated,
            items,
            is_mine: false,
        })
    }

    /// 员工推进单个行项目状态；全就绪时订单自动升 READY
    pub async fn update_item_status(
        &self,
        actor: &CurrentUser,
        order_id: i64,
        item_id: i64,
        next: ItemStatus,
    ) -> AppResult<OrderWithItems> {
        let order = self
            .orders
            .find_by_id(actor.restaurant_id, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        // READY 之后行项目不再单独变动（就绪时已强制同步），
        // 终态更不必说
        if !order.status.is_outstanding() {
            return Err(AppError::business_rule(format!(
                "Order #{} is {} and its items can no longer change",
                order.order_number, order.status
            )));
        }

        let (item, promoted) = self
            .orders
            .update_item_status(&order, item_id, next, Some(&actor.id))
            .await?;

        self.fanout.emit(
            order.restaurant_id,
            PushEvent::new(
                PushEventKind::OrderItemUpdated,
                vec![
                    Room::Kitchen(order.restaurant_id),
                    Room::Restaurant(order.restaurant_id),
                    Room::Table(order.table_id),
                ],
                serde_json::json!({
                    "order_id": order.id,
                    "order_number": order.order_number,
                    "item_id": item.id,
                    "status": item.status,
                }),
            ),
        );

        let current = match promoted {
            Some(updated) => {
                self.emit_status_change(&updated, OrderStatus::Preparing);
                updated
            }
            None => order,
        };

        let items = self.orders.find_items(current.id).await?;
        Ok(OrderWithItems {
            order: current,
            items,
            is_mine: false,
        })
    }

    /// 取消订单（PAID/CANCELLED 之外任意状态可取消）
    pub async fn cancel_order(
        &self,
        actor: &CurrentUser,
        order_id: i64,
        reason: String,
    ) -> AppResult<OrderWithItems> {
        let order = self
            .orders
            .find_by_id(actor.restaurant_id, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        if order.status.is_terminal() {
            return Err(AppError::business_rule(format!(
                "Order #{} is already {}",
                order.order_number, order.status
            )));
        }

        let updated = self.orders.cancel(&order, &reason, Some(&actor.id)).await?;

        self.fanout.emit(
            order.restaurant_id,
            PushEvent::new(
                PushEventKind::OrderCancelled,
                vec![
                    Room::Restaurant(order.restaurant_id),
                    Room::Kitchen(order.restaurant_id),
                    Room::Table(order.table_id),
                    Room::Session(order.session_id),
                ],
                serde_json::json!({
                    "order_id": updated.id,
                    "order_number": updated.order_number,
                    "reason": reason,
                }),
            ),
        );

        let items = self.orders.find_items(updated.id).await?;
        Ok(OrderWithItems {
            order: updated,
            items,
            is_mine: false,
        })
    }

    fn emit_status_change(&self, order: &shared::models::Order, previous: OrderStatus) {
        self.fanout.emit(
            order.restaurant_id,
            PushEvent::new(
                PushEventKind::OrderUpdated,
                vec![
                    Room::Restaurant(order.restaurant_id),
                    Room::Kitchen(order.restaurant_id),
                    Room::Table(order.table_id),
                    Room::Session(order.session_id),
                ],
                serde_json::to_value(OrderStatusChanged {
                    order_id: order.id,
                    order_number: order.order_number,
                    table_id: order.table_id,
                    previous: previous.to_string(),
                    current: order.status.to_string(),
                })
                .unwrap_or_default(),
            ),
        );
    }

    // ========== 读路径 ==========

    /// 后厨队列：未完结 + 就绪订单，先进先出
    pub async fn kitchen_queue(&self, restaurant_id: i64) -> AppResult<Vec<OrderWithItems>> {
        Ok(self.orders.kitchen_queue(restaurant_id).await?)
    }

    /// 顾客视角的整桌订单
    ///
    /// 仅当前在用会话的非取消订单（旧会话的订单不泄漏给新客人），
    /// 标记哪些属于请求方自己的会话。
    pub async fn table_orders(&self, ctx: &SessionContext) -> AppResult<Vec<OrderWithItems>> {
        let mut orders = self.orders.table_orders(ctx.table_id).await?;
        for order in &mut orders {
            order.is_mine = order.order.session_id == ctx.session_id;
        }
        Ok(orders)
    }

    /// 顾客读取单个订单 — 必须属于请求方所在桌的在用会话
    pub async fn customer_order(
        &self,
        ctx: &SessionContext,
        order_id: i64,
    ) -> AppResult<OrderWithItems> {
        let mut orders = self.table_orders(ctx).await?;
        orders
            .iter()
            .position(|o| o.order.id == order_id)
            .map(|i| orders.swap_remove(i))
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))
    }

    /// 员工端订单列表（过滤 + 分页）
    pub async fn restaurant_orders(
        &self,
        actor: &CurrentUser,
        filters: OrderFilters,
    ) -> AppResult<Vec<OrderWithItems>> {
        let restaurant = self.restaurants.find_active(actor.restaurant_id).await?;
        let (from, to) = match &filters.date {
            Some(date) => {
                let date = time::parse_date(date)?;
                let tz = restaurant.tz();
                (
                    Some(time::day_start_millis(date, tz)),
                    Some(time::day_end_millis(date, tz)),
                )
            }
            None => (None, None),
        };

        let limit = filters.limit.unwrap_or(50).clamp(1, 200);
        let offset = filters.offset.unwrap_or(0).max(0);

        Ok(self
            .orders
            .list(
                actor.restaurant_id,
                filters.status,
                from,
                to,
                filters.table_id,
                filters.active_only,
                limit,
                offset,
            )
            .await?)
    }

    /// 员工读取单个订单
    pub async fn staff_order(
        &self,
        actor: &CurrentUser,
        order_id: i64,
    ) -> AppResult<OrderWithItems> {
        self.orders
            .find_with_items(actor.restaurant_id, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))
    }

    // ========== 统计 ==========

    /// 营收口径：按支付时间窗口统计已支付订单
    pub async fn paid_stats(
        &self,
        actor: &CurrentUser,
        from_date: &str,
        to_date: &str,
    ) -> AppResult<PaidStats> {
        let restaurant = self.restaurants.find_active(actor.restaurant_id).await?;
        let tz = restaurant.tz();
        let from = time::day_start_millis(time::parse_date(from_date)?, tz);
        let to = time::day_end_millis(time::parse_date(to_date)?, tz);

        let (order_count, revenue) = self.orders.paid_stats(actor.restaurant_id, from, to).await?;
        Ok(PaidStats {
            order_count,
            revenue,
        })
    }

    /// 当日动态口径：今天创建的订单数（与营收统计互不混用）
    pub async fn today_activity(&self, actor: &CurrentUser) -> AppResult<TodayActivity> {
        let restaurant = self.restaurants.find_active(actor.restaurant_id).await?;
        let tz = restaurant.tz();
        let today = time::current_business_date(tz);
        let from = time::day_start_millis(today, tz);
        let to = time::day_end_millis(today, tz);

        let orders_created = self
            .orders
            .created_count(actor.restaurant_id, from, to)
            .await?;
        Ok(TodayActivity { orders_created })
    }
}
