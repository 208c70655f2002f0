//! 桌台状态控制器
//!
//! 桌台状态机 `INACTIVE ⇄ ACTIVE → OCCUPIED → (BILL_REQUESTED) → ACTIVE`
//! 以及结账释放（release）：对账未完结订单、批量结清就绪订单、
//! 停用会话、把桌台交还给下一组客人。
//!
//! release 是订单允许批量进入 PAID 的唯一入口。检查与写入全部在
//! 一个事务里完成，拦截"读检查与写之间插入新订单"的竞态。

use sqlx::SqlitePool;

use shared::message::{PushEvent, PushEventKind, Room, SessionClosed};
use shared::models::{
    DiningTable, DiningTableCreate, DiningTableSummary, TableStatus,
};
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::db::repository::{DiningTableRepository, TableSessionRepository};
use crate::fanout::FanoutHub;
use crate::utils::{AppError, AppResult};

/// 桌台状态控制器
#[derive(Clone)]
pub struct TableStateController {
    pool: SqlitePool,
    tables: DiningTableRepository,
    sessions: TableSessionRepository,
    fanout: FanoutHub,
}

impl TableStateController {
    pub fn new(pool: SqlitePool, fanout: FanoutHub) -> Self {
        Self {
            tables: DiningTableRepository::new(pool.clone()),
            sessions: TableSessionRepository::new(pool.clone()),
            pool,
            fanout,
        }
    }

    async fn load_table(&self, actor: &CurrentUser, table_id: i64) -> AppResult<DiningTable> {
        self.tables
            .find_by_id(actor.restaurant_id, table_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Table {table_id} not found")))
    }

    // ========== 基础操作 ==========

    /// 启用桌台：INACTIVE/CLOSED → ACTIVE；已启用则报错
    pub async fn activate(&self, actor: &CurrentUser, table_id: i64) -> AppResult<DiningTable> {
        let table = self.load_table(actor, table_id).await?;
        if table.status == TableStatus::Active {
            return Err(AppError::business_rule(format!(
                "Table {} is already active",
                table.number
            )));
        }

        let flipped = self
            .tables
            .update_status_guarded(
                table.id,
                &[TableStatus::Inactive, TableStatus::Closed],
                TableStatus::Active,
            )
            .await?;
        if !flipped {
            return Err(AppError::business_rule(format!(
                "Table {} cannot be activated while {}",
                table.number, table.status
            )));
        }

        let table = self.load_table(actor, table_id).await?;
        self.emit_table_updated(&table);
        Ok(table)
    }

    /// 请求买单：OCCUPIED → BILL_REQUESTED
    pub async fn request_bill(&self, restaurant_id: i64, table_id: i64) -> AppResult<DiningTable> {
        let table = self
            .tables
            .find_by_id(restaurant_id, table_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Table {table_id} not found")))?;

        let flipped = self
            .tables
            .update_status_guarded(table.id, &[TableStatus::Occupied], TableStatus::BillRequested)
            .await?;
        if !flipped && table.status != TableStatus::BillRequested {
            return Err(AppError::business_rule(format!(
                "Table {} has no open party to bill (status {})",
                table.number, table.status
            )));
        }

        let table = self
            .tables
            .find_by_id(restaurant_id, table_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Table {table_id} not found")))?;
        self.emit_table_updated(&table);
        Ok(table)
    }

    /// 下线桌台：停用其全部会话并置 CLOSED（把桌子撤出轮转）
    pub async fn close(&self, actor: &CurrentUser, table_id: i64) -> AppResult<DiningTable> {
        let table = self.load_table(actor, table_id).await?;

        let session_ids = self.deactivate_sessions_and_notify(&table, "Table closed by staff").await?;
        self.tables
            .update_status_guarded(
                table.id,
                &[
                    TableStatus::Inactive,
                    TableStatus::Active,
                    TableStatus::Occupied,
                    TableStatus::BillRequested,
                ],
                TableStatus::Closed,
            )
            .await?;

        tracing::info!(
            table = table.number,
            sessions_closed = session_ids.len(),
            "Table closed"
        );
        let table = self.load_table(actor, table_id).await?;
        self.emit_table_updated(&table);
        Ok(table)
    }

    // ========== 结账释放 ==========

    /// 结账释放（checkout）
    ///
    /// 后厨必须先完结所有订单：存在 PENDING/CONFIRMED/PREPARING
    /// 订单时整体失败并在文案里列出拦路单号。通过后在同一事务里
    /// 把 READY 订单批量结为 PAID（盖支付时间戳 + 审计日志）、
    /// 停用全部在用会话、桌台回 ACTIVE。
    pub async fn release(&self, actor: &CurrentUser, table_id: i64) -> AppResult<DiningTable> {
        let table = self.load_table(actor, table_id).await?;
        let now = now_millis();

        let mut tx = self.pool.begin().await?;

        // 先写桌台状态：事务内第一条写语句即取得写锁，后续的
        // 未完结订单检查不会再被并发下单插队（检查失败则整体回滚）
        sqlx::query("UPDATE dining_table SET status = 'ACTIVE', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(table.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        // 拦截未完结订单 — 检查与全部写入同事务
        let blocking: Vec<i64> = sqlx::query_scalar(
            "SELECT order_number FROM orders WHERE table_id = ? AND status IN ('PENDING', 'CONFIRMED', 'PREPARING') ORDER BY order_number",
        )
        .bind(table.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        if !blocking.is_empty() {
            let numbers = blocking
                .iter()
                .map(|n| format!("#{n}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::business_rule(format!(
                "Kitchen must finish orders {numbers} before the table can be released"
            )));
        }

        // READY → PAID 批量结清（唯一允许批量进入 PAID 的地方）
        let ready_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE table_id = ? AND status = 'READY'",
        )
        .bind(table.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query(
            "UPDATE orders SET status = 'PAID', paid_at = ?, updated_at = ? WHERE table_id = ? AND status = 'READY'",
        )
        .bind(now)
        .bind(now)
        .bind(table.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        for order_id in &ready_ids {
            sqlx::query(
                "INSERT INTO order_log (order_id, action, actor_id, detail, created_at) VALUES (?, 'PAID', ?, ?, ?)",
            )
            .bind(order_id)
            .bind(&actor.id)
            .bind(serde_json::json!({"via": "table_release"}).to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        }

        // 停用全部在用会话
        let session_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM table_session WHERE table_id = ? AND active = 1",
        )
        .bind(table.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query("UPDATE table_session SET active = 0, updated_at = ? WHERE table_id = ? AND active = 1")
            .bind(now)
            .bind(table.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tx.commit().await.map_err(|e| AppError::database(e.to_string()))?;

        // 事件在提交之后发 — 扇出永远不回滚事实源
        self.notify_sessions_closed(&table, &session_ids, "Table checked out; thank you!");

        tracing::info!(
            table = table.number,
            orders_paid = ready_ids.len(),
            sessions_closed = session_ids.len(),
            "Table released"
        );
        let table = self.load_table(actor, table_id).await?;
        self.emit_table_updated(&table);
        Ok(table)
    }

    /// 强制释放（管理员）：取消一切未完结订单后无条件释放
    ///
    /// READY 订单按已出餐结清为 PAID；未完结订单带原因取消。
    /// 结束时桌台必为 ACTIVE 且在用会话数为零。
    pub async fn force_release(
        &self,
        actor: &CurrentUser,
        table_id: i64,
        reason: &str,
    ) -> AppResult<DiningTable> {
        let table = self.load_table(actor, table_id).await?;
        let now = now_millis();

        let mut tx = self.pool.begin().await?;

        // 与 release 相同：先写桌台状态取得写锁
        sqlx::query("UPDATE dining_table SET status = 'ACTIVE', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(table.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let outstanding_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE table_id = ? AND status IN ('PENDING', 'CONFIRMED', 'PREPARING')",
        )
        .bind(table.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query(
            "UPDATE orders SET status = 'CANCELLED', cancelled_at = ?, updated_at = ? WHERE table_id = ? AND status IN ('PENDING', 'CONFIRMED', 'PREPARING')",
        )
        .bind(now)
        .bind(now)
        .bind(table.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        for order_id in &outstanding_ids {
            sqlx::query(
                "UPDATE order_item SET status = 'CANCELLED', updated_at = ? WHERE order_id = ? AND status != 'CANCELLED'",
            )
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

            sqlx::query(
                "INSERT INTO order_log (order_id, action, actor_id, detail, created_at) VALUES (?, 'CANCELLED', ?, ?, ?)",
            )
            .bind(order_id)
            .bind(&actor.id)
            .bind(serde_json::json!({"reason": reason, "via": "force_release"}).to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        }

        // 已出餐的照常结清
        sqlx::query(
            "UPDATE orders SET status = 'PAID', paid_at = ?, updated_at = ? WHERE table_id = ? AND status = 'READY'",
        )
        .bind(now)
        .bind(now)
        .bind(table.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        let session_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM table_session WHERE table_id = ? AND active = 1",
        )
        .bind(table.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query("UPDATE table_session SET active = 0, updated_at = ? WHERE table_id = ? AND active = 1")
            .bind(now)
            .bind(table.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        tx.commit().await.map_err(|e| AppError::database(e.to_string()))?;

        self.notify_sessions_closed(&table, &session_ids, reason);

        tracing::warn!(
            table = table.number,
            orders_cancelled = outstanding_ids.len(),
            "Table force-released"
        );
        let table = self.load_table(actor, table_id).await?;
        self.emit_table_updated(&table);
        Ok(table)
    }

    // ========== 员工桌台管理（外围 CRUD） ==========

    pub async fn create_table(
        &self,
        actor: &CurrentUser,
        data: DiningTableCreate,
    ) -> AppResult<DiningTable> {
        let table = self.tables.create(actor.restaurant_id, data).await?;
        self.emit_table_updated(&table);
        Ok(table)
    }

    /// 桌台列表（带实时在用会话数）
    pub async fn list_tables(&self, actor: &CurrentUser) -> AppResult<Vec<DiningTableSummary>> {
        let tables = self.tables.find_all(actor.restaurant_id).await?;
        let mut result = Vec::with_capacity(tables.len());
        for table in tables {
            let active_sessions = self.sessions.count_active(table.id).await?;
            result.push(DiningTableSummary {
                table,
                active_sessions,
            });
        }
        Ok(result)
    }

    /// 删除桌台 — 仅当从未有过会话和订单
    pub async fn delete_table(&self, actor: &CurrentUser, table_id: i64) -> AppResult<()> {
        self.tables.delete(actor.restaurant_id, table_id).await?;
        Ok(())
    }

    // ========== 内部 ==========

    /// 逐个停用会话并通知（close 用的非事务路径）
    async fn deactivate_sessions_and_notify(
        &self,
        table: &DiningTable,
        message: &str,
    ) -> AppResult<Vec<i64>> {
        let sessions = self.sessions.find_active_by_table(table.id).await?;
        let ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        for session in &sessions {
            self.sessions.deactivate(session.id).await?;
        }
        self.notify_sessions_closed(table, &ids, message);
        Ok(ids)
    }

    /// `session:closed` 发到桌台房间和每个会话房间 —
    /// 客户端可能只订阅了其中一个。
    fn notify_sessions_closed(&self, table: &DiningTable, session_ids: &[i64], message: &str) {
        for session_id in session_ids {
            self.fanout.emit(
                table.restaurant_id,
                PushEvent::new(
                    PushEventKind::SessionClosed,
                    vec![Room::Table(table.id), Room::Session(*session_id)],
                    serde_json::to_value(SessionClosed {
                        session_id: *session_id,
                        table_id: table.id,
                        message: message.to_string(),
                    })
                    .unwrap_or_default(),
                ),
            );
        }
    }

    fn emit_table_updated(&self, table: &DiningTable) {
        self.fanout.emit(
            table.restaurant_id,
            PushEvent::new(
                PushEventKind::TableUpdated,
                vec![
                    Room::Restaurant(table.restaurant_id),
                    Room::Staff(table.restaurant_id),
                    Room::Table(table.id),
                ],
                serde_json::to_value(table).unwrap_or_default(),
            ),
        );
    }
}
