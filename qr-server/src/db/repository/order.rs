//! Order Repository
//!
//! 订单与行项目的持久化。所有多步写入都在单事务内完成：
//! 单号分配 + 订单/行项目/日志插入；状态迁移 + 时间戳 + 日志；
//! 行项目更新 + 全就绪聚合提升。

use super::{RepoError, RepoResult};
use shared::models::{ItemStatus, Order, OrderItem, OrderLog, OrderStatus, OrderWithItems};
use shared::util::{now_millis, snowflake_id};
use sqlx::{Sqlite, SqlitePool, Transaction};

const ORDER_COLUMNS: &str = "id, restaurant_id, table_id, session_id, business_date, order_number, status, subtotal, discount, total, note, confirmed_at, preparing_at, ready_at, paid_at, cancelled_at, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, menu_item_id, name, quantity, unit_price, extras, line_total, note, status, created_at, updated_at";

/// 新订单写入参数（快照与合计由 OrderLifecycleManager 计算）
pub struct OrderInsert {
    pub restaurant_id: i64,
    pub table_id: i64,
    pub session_id: i64,
    pub business_date: String,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub note: Option<String>,
    pub items: Vec<ItemInsert>,
}

/// 行项目快照
pub struct ItemInsert {
    pub menu_item_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    /// 已序列化的配料快照 JSON
    pub extras_json: String,
    pub line_total: f64,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========== 读取 ==========

    pub async fn find_by_id(&self, restaurant_id: i64, id: i64) -> RepoResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ? AND restaurant_id = ?");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(restaurant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn find_items(&self, order_id: i64) -> RepoResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = ? ORDER BY id");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn find_with_items(
        &self,
        restaurant_id: i64,
        id: i64,
    ) -> RepoResult<Option<OrderWithItems>> {
        let Some(order) = self.find_by_id(restaurant_id, id).await? else {
            return Ok(None);
        };
        let items = self.find_items(order.id).await?;
        Ok(Some(OrderWithItems {
            order,
            items,
            is_mine: false,
        }))
    }

    /// 后厨队列：未完结 + 就绪订单，先进先出
    pub async fn kitchen_queue(&self, restaurant_id: i64) -> RepoResult<Vec<OrderWithItems>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE restaurant_id = ? AND status IN ('PENDING', 'CONFIRMED', 'PREPARING', 'READY') ORDER BY created_at ASC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(restaurant_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_items(orders).await
    }

    /// 整桌订单：仅"当前在用会话"的非取消订单
    ///
    /// 上一组客人（会话已关闭）的订单明确排除，防止旧账单泄漏到
    /// 新入座的客人面前。
    pub async fn table_orders(&self, table_id: i64) -> RepoResult<Vec<OrderWithItems>> {
        let sql = "SELECT o.id, o.restaurant_id, o.table_id, o.session_id, o.business_date, o.order_number, o.status, o.subtotal, o.discount, o.total, o.note, o.confirmed_at, o.preparing_at, o.ready_at, o.paid_at, o.cancelled_at, o.created_at, o.updated_at FROM orders o JOIN table_session s ON o.session_id = s.id WHERE o.table_id = ? AND s.active = 1 AND o.status != 'CANCELLED' ORDER BY o.created_at ASC";
        let orders = sqlx::query_as::<_, Order>(sql)
            .bind(table_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_items(orders).await
    }

    /// 员工端订单列表（状态/日期/桌台过滤 + 分页）
    ///
    /// `active_only` 供收银视图使用，同样用于防旧账单泄漏。
    #[allow(clippy::too_many_arguments)]
    pub async fn list(
        &self,
        restaurant_id: i64,
        status: Option<OrderStatus>,
        from_millis: Option<i64>,
        to_millis: Option<i64>,
        table_id: Option<i64>,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<OrderWithItems>> {
        let mut sql = format!(
            "SELECT o.id, o.restaurant_id, o.table_id, o.session_id, o.business_date, o.order_number, o.status, o.subtotal, o.discount, o.total, o.note, o.confirmed_at, o.preparing_at, o.ready_at, o.paid_at, o.cancelled_at, o.created_at, o.updated_at FROM orders o"
        );
        if active_only {
            sql.push_str(" JOIN table_session s ON o.session_id = s.id");
        }
        sql.push_str(" WHERE o.restaurant_id = ?");
        if active_only {
            sql.push_str(" AND s.active = 1");
        }
        if status.is_some() {
            sql.push_str(" AND o.status = ?");
        }
        if from_millis.is_some() {
            sql.push_str(" AND o.created_at >= ?");
        }
        if to_millis.is_some() {
            sql.push_str(" AND o.created_at < ?");
        }
        if table_id.is_some() {
            sql.push_str(" AND o.table_id = ?");
        }
        sql.push_str(" ORDER BY o.created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, Order>(&sql).bind(restaurant_id);
        if let Some(s) = status {
            query = query.bind(s.to_string());
        }
        if let Some(f) = from_millis {
            query = query.bind(f);
        }
        if let Some(t) = to_millis {
            query = query.bind(t);
        }
        if let Some(t) = table_id {
            query = query.bind(t);
        }
        query = query.bind(limit).bind(offset);

        let orders = query.fetch_all(&self.pool).await?;
        self.attach_items(orders).await
    }

    pub async fn find_logs(&self, order_id: i64) -> RepoResult<Vec<OrderLog>> {
        let logs = sqlx::query_as::<_, OrderLog>(
            "SELECT id, order_id, action, actor_id, detail, created_at FROM order_log WHERE order_id = ? ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    // ========== 统计 ==========

    /// 已支付口径：按 paid_at 过滤的订单数与营收
    pub async fn paid_stats(
        &self,
        restaurant_id: i64,
        from_millis: i64,
        to_millis: i64,
    ) -> RepoResult<(i64, f64)> {
        let row: (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(total) FROM orders WHERE restaurant_id = ? AND status = 'PAID' AND paid_at >= ? AND paid_at < ?",
        )
        .bind(restaurant_id)
        .bind(from_millis)
        .bind(to_millis)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0, row.1.unwrap_or(0.0)))
    }

    /// 当日动态口径：按 created_at 过滤的下单数（与营收统计互不混用）
    pub async fn created_count(
        &self,
        restaurant_id: i64,
        from_millis: i64,
        to_millis: i64,
    ) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE restaurant_id = ? AND created_at >= ? AND created_at < ?",
        )
        .bind(restaurant_id)
        .bind(from_millis)
        .bind(to_millis)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ========== 写入 ==========

    /// 创建订单：单号分配 + 订单 + 行项目 + CREATED 日志，单事务
    pub async fn create_with_items(&self, data: OrderInsert) -> RepoResult<OrderWithItems> {
        let mut tx = self.pool.begin().await?;

        // 当日流水号（按餐厅 + 营业日递增）
        let order_number: i64 = sqlx::query_scalar(
            "INSERT INTO order_counter (restaurant_id, business_date, value) VALUES (?, ?, 1) ON CONFLICT (restaurant_id, business_date) DO UPDATE SET value = value + 1 RETURNING value",
        )
        .bind(data.restaurant_id)
        .bind(&data.business_date)
        .fetch_one(&mut *tx)
        .await?;

        let order_id = snowflake_id();
        let now = now_millis();

        sqlx::query(
            "INSERT INTO orders (id, restaurant_id, table_id, session_id, business_date, order_number, status, subtotal, discount, total, note, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 'PENDING', ?, ?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(data.restaurant_id)
        .bind(data.table_id)
        .bind(data.session_id)
        .bind(&data.business_date)
        .bind(order_number)
        .bind(data.subtotal)
        .bind(data.discount)
        .bind(data.total)
        .bind(&data.note)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &data.items {
            sqlx::query(
                "INSERT INTO order_item (id, order_id, menu_item_id, name, quantity, unit_price, extras, line_total, note, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'PENDING', ?, ?)",
            )
            .bind(snowflake_id())
            .bind(order_id)
            .bind(item.menu_item_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(&item.extras_json)
            .bind(item.line_total)
            .bind(&item.note)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        insert_log(
            &mut tx,
            order_id,
            "CREATED",
            None,
            Some(serde_json::json!({
                "order_number": order_number,
                "item_count": data.items.len(),
                "total": data.total,
            })),
        )
        .await?;

        tx.commit().await?;

        self.find_with_items(data.restaurant_id, order_id)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create order".into()))
    }

    /// 状态迁移：`WHERE status = <from>` 守卫写 + 时间戳 + 日志，单事务
    ///
    /// 进入 READY 时把所有未就绪（且未取消）的行项目强制同步为
    /// READY — 订单不允许在行项目落后时呈现就绪态。
    pub async fn apply_transition(
        &self,
        order: &Order,
        next: OrderStatus,
        actor_id: Option<&str>,
        reason: Option<&str>,
    ) -> RepoResult<Order> {
        let now = now_millis();
        let timestamp_column = match next {
            OrderStatus::Confirmed => Some("confirmed_at"),
            OrderStatus::Preparing => Some("preparing_at"),
            OrderStatus::Ready => Some("ready_at"),
            OrderStatus::Paid => Some("paid_at"),
            OrderStatus::Cancelled => Some("cancelled_at"),
            OrderStatus::Pending => None,
        };

        let mut tx = self.pool.begin().await?;

        let sql = match timestamp_column {
            Some(col) => format!(
                "UPDATE orders SET status = ?, {col} = ?, updated_at = ? WHERE id = ? AND status = ?"
            ),
            None => {
                "UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?".into()
            }
        };
        let mut query = sqlx::query(&sql).bind(next.to_string());
        if timestamp_column.is_some() {
            query = query.bind(now);
        }
        query = query
            .bind(now)
            .bind(order.id)
            .bind(order.status.to_string());

        let rows = query.execute(&mut *tx).await?;
        if rows.rows_affected() == 0 {
            // 并发下状态已被他人改写 — 不产生任何部分变更
            return Err(RepoError::Conflict(format!(
                "Order {} is no longer {}",
                order.order_number, order.status
            )));
        }

        if next == OrderStatus::Ready {
            sqlx::query(
                "UPDATE order_item SET status = 'READY', updated_at = ? WHERE order_id = ? AND status NOT IN ('READY', 'CANCELLED')",
            )
            .bind(now)
            .bind(order.id)
            .execute(&mut *tx)
            .await?;
        }

        insert_log(
            &mut tx,
            order.id,
            "STATUS_CHANGED",
            actor_id,
            Some(serde_json::json!({
                "from": order.status.to_string(),
                "to": next.to_string(),
                "reason": reason,
            })),
        )
        .await?;

        tx.commit().await?;

        self.find_by_id(order.restaurant_id, order.id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Order {} not found", order.id)))
    }

    /// 行项目状态更新 + 全就绪聚合提升，单事务
    ///
    /// 同一事务内完成"全部行项目 READY"判定与订单提升，判定与
    /// 提升之间不会插入其他状态写。返回更新后的行项目与（若发生
    /// 提升）更新后的订单。
    pub async fn update_item_status(
        &self,
        order: &Order,
        item_id: i64,
        next: ItemStatus,
        actor_id: Option<&str>,
    ) -> RepoResult<(OrderItem, Option<Order>)> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "UPDATE order_item SET status = ?, updated_at = ? WHERE id = ? AND order_id = ?",
        )
        .bind(next.to_string())
        .bind(now)
        .bind(item_id)
        .bind(order.id)
        .execute(&mut *tx)
        .await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!(
                "Item {} not found in order {}",
                item_id, order.order_number
            )));
        }

        insert_log(
            &mut tx,
            order.id,
            "ITEM_STATUS_CHANGED",
            actor_id,
            Some(serde_json::json!({
                "item_id": item_id,
                "to": next.to_string(),
            })),
        )
        .await?;

        // 全就绪检测：还有未 READY 且未取消的行项目吗？
        let lagging: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_item WHERE order_id = ? AND status NOT IN ('READY', 'CANCELLED')",
        )
        .bind(order.id)
        .fetch_one(&mut *tx)
        .await?;

        let mut promoted = false;
        if lagging == 0 && order.status == OrderStatus::Preparing {
            let rows = sqlx::query(
                "UPDATE orders SET status = 'READY', ready_at = ?, updated_at = ? WHERE id = ? AND status = 'PREPARING'",
            )
            .bind(now)
            .bind(now)
            .bind(order.id)
            .execute(&mut *tx)
            .await?;
            if rows.rows_affected() > 0 {
                promoted = true;
                insert_log(
                    &mut tx,
                    order.id,
                    "STATUS_CHANGED",
                    actor_id,
                    Some(serde_json::json!({
                        "from": "PREPARING",
                        "to": "READY",
                        "reason": "all items ready",
                    })),
                )
                .await?;
            }
        }

        tx.commit().await?;

        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_item WHERE id = ?");
        let item = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;

        let updated_order = if promoted {
            self.find_by_id(order.restaurant_id, order.id).await?
        } else {
            None
        };
        Ok((item, updated_order))
    }

    /// 取消订单：订单 + 全部行项目 + 日志，单事务
    pub async fn cancel(
        &self,
        order: &Order,
        reason: &str,
        actor_id: Option<&str>,
    ) -> RepoResult<Order> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "UPDATE orders SET status = 'CANCELLED', cancelled_at = ?, updated_at = ? WHERE id = ? AND status NOT IN ('PAID', 'CANCELLED')",
        )
        .bind(now)
        .bind(now)
        .bind(order.id)
        .execute(&mut *tx)
        .await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::Conflict(format!(
                "Order {} is already settled or cancelled",
                order.order_number
            )));
        }

        sqlx::query(
            "UPDATE order_item SET status = 'CANCELLED', updated_at = ? WHERE order_id = ? AND status != 'CANCELLED'",
        )
        .bind(now)
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

        insert_log(
            &mut tx,
            order.id,
            "CANCELLED",
            actor_id,
            Some(serde_json::json!({ "reason": reason })),
        )
        .await?;

        tx.commit().await?;

        self.find_by_id(order.restaurant_id, order.id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Order {} not found", order.id)))
    }

    // ========== 内部 ==========

    async fn attach_items(&self, orders: Vec<Order>) -> RepoResult<Vec<OrderWithItems>> {
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.find_items(order.id).await?;
            result.push(OrderWithItems {
                order,
                items,
                is_mine: false,
            });
        }
        Ok(result)
    }
}

/// 追加一条审计日志（append-only，无更新/删除路径）
pub async fn insert_log(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: i64,
    action: &str,
    actor_id: Option<&str>,
    detail: Option<serde_json::Value>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO order_log (order_id, action, actor_id, detail, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(action)
    .bind(actor_id)
    .bind(detail.map(|d| d.to_string()))
    .bind(now_millis())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
