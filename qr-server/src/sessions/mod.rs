//! 会话管理器 - 桌台会话状态机
//!
//! 入座资格检查、会话创建（幂等 + 容量受控 + 地理围栏）、
//! 验证交接、会话令牌签发/校验、会话终止。
//!
//! 会话状态机：`unverified → verified → (active | inactive)`，
//! `inactive` 为终态。

use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use shared::message::{PushEvent, PushEventKind, Room, SessionClosed};
use shared::models::{
    DiningTable, OperatingStatus, Restaurant, SessionActivated, SessionContext, SessionCreate,
    TableSession, TableStatus,
};
use shared::util::{normalize_phone, now_millis};

use crate::core::Config;
use crate::db::repository::{
    DiningTableRepository, RepoError, RestaurantRepository, TableSessionRepository,
    table_session::SessionInsert,
};
use crate::fanout::FanoutHub;
use crate::kv::EphemeralStore;
use crate::utils::{AppError, AppResult, geo};
use crate::verification::{CheckOutcome, VerificationService};

/// 扫码资格检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eligibility {
    pub table_id: i64,
    pub table_number: i64,
    pub table_status: TableStatus,
    pub capacity: i64,
    pub active_sessions: i64,
    pub restaurant_id: i64,
    pub restaurant_name: String,
    pub operating_status: OperatingStatus,
    pub require_geofence: bool,
    pub geofence_radius_m: f64,
    pub can_join: bool,
}

/// 会话管理器
#[derive(Clone)]
pub struct SessionManager {
    tables: DiningTableRepository,
    sessions: TableSessionRepository,
    restaurants: RestaurantRepository,
    store: EphemeralStore,
    fanout: FanoutHub,
    verification: VerificationService,
    session_window: Duration,
    geofence_enabled: bool,
}

impl SessionManager {
    pub fn new(
        pool: SqlitePool,
        store: EphemeralStore,
        fanout: FanoutHub,
        verification: VerificationService,
        config: &Config,
    ) -> Self {
        Self {
            tables: DiningTableRepository::new(pool.clone()),
            sessions: TableSessionRepository::new(pool.clone()),
            restaurants: RestaurantRepository::new(pool),
            store,
            fanout,
            verification,
            session_window: Duration::from_secs(config.session_timeout_secs),
            geofence_enabled: config.geofence_enabled,
        }
    }

    fn token_key(token: &str) -> String {
        format!("session_token:{token}")
    }

    /// 解析二维码并校验餐厅/桌台可用性（共用入口）
    async fn resolve_qr(&self, qr_id: &str) -> AppResult<(DiningTable, Restaurant)> {
        let table = self
            .tables
            .find_by_qr(qr_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Unknown QR code {qr_id}")))?;

        let restaurant = self
            .restaurants
            .find_by_id(table.restaurant_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| AppError::business_rule("This restaurant is not accepting orders"))?;

        Ok((table, restaurant))
    }

    // ========== 资格检查 ==========

    /// 扫码资格检查
    ///
    /// `can_join` 为真当且仅当：桌台可入座、餐厅营业中、
    /// 在用会话数未达容量。
    pub async fn check_eligibility(&self, qr_id: &str) -> AppResult<Eligibility> {
        let (table, restaurant) = self.resolve_qr(qr_id).await?;

        if !table.status.accepts_sessions() {
            return Err(AppError::business_rule(format!(
                "Table {} is not open for seating (status {})",
                table.number, table.status
            )));
        }

        let active_sessions = self.sessions.count_active(table.id).await?;
        let now_local = chrono::Utc::now().with_timezone(&restaurant.tz());
        let operating_status = restaurant.weekly_hours().status_at(now_local);

        let can_join =
            operating_status == OperatingStatus::Open && active_sessions < table.capacity;

        Ok(Eligibility {
            table_id: table.id,
            table_number: table.number,
            table_status: table.status,
            capacity: table.capacity,
            active_sessions,
            restaurant_id: restaurant.id,
            restaurant_name: restaurant.name,
            operating_status,
            require_geofence: restaurant.require_geofence,
            geofence_radius_m: restaurant.geofence_radius_m,
            can_join,
        })
    }

    /// 幂等探测：同设备是否已有在用会话
    pub async fn lookup_existing(
        &self,
        qr_id: &str,
        device_fingerprint: &str,
    ) -> AppResult<Option<TableSession>> {
        let (table, _) = self.resolve_qr(qr_id).await?;
        Ok(self
            .sessions
            .find_active_by_fingerprint(table.id, device_fingerprint)
            .await?)
    }

    // ========== 会话创建 ==========

    /// 创建未验证会话
    ///
    /// - 同设备重复扫码幂等返回既有会话
    /// - 营业时间 / 容量 / 地理围栏均在此校验
    /// - 首个会话把 ACTIVE 桌台翻为 OCCUPIED
    pub async fn create_session(
        &self,
        data: SessionCreate,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<TableSession> {
        let (table, restaurant) = self.resolve_qr(&data.qr_id).await?;

        if !table.status.accepts_sessions() {
            return Err(AppError::business_rule(format!(
                "Table {} is not open for seating (status {})",
                table.number, table.status
            )));
        }

        // 重复扫码：直接返回既有会话，不再做下面的校验
        if let Some(existing) = self
            .sessions
            .find_active_by_fingerprint(table.id, &data.device_fingerprint)
            .await?
        {
            tracing::debug!(session_id = existing.id, "Re-scan returned existing session");
            return Ok(existing);
        }

        // 营业时间
        let now_local = chrono::Utc::now().with_timezone(&restaurant.tz());
        if let OperatingStatus::Closed { next_open } =
            restaurant.weekly_hours().status_at(now_local)
        {
            let message = match next_open {
                Some(t) => format!("Restaurant is closed; opens at {t}"),
                None => "Restaurant is closed".to_string(),
            };
            return Err(AppError::business_rule(message));
        }

        // 地理围栏：需要启用 + 餐厅有坐标；客户端没给定位则软跳过
        self.enforce_geofence(&restaurant, data.latitude, data.longitude)?;

        let customer_phone = normalize_phone(&data.customer_phone);
        if customer_phone.is_empty() {
            return Err(AppError::validation("A phone number is required"));
        }
        if data.customer_name.trim().is_empty() {
            return Err(AppError::validation("A name is required"));
        }

        let insert = SessionInsert {
            restaurant_id: restaurant.id,
            table_id: table.id,
            customer_name: data.customer_name.trim().to_string(),
            customer_phone,
            device_fingerprint: data.device_fingerprint.clone(),
            client_ip,
            user_agent,
            expires_at: now_millis() + self.session_window.as_millis() as i64,
        };

        let session = match self.sessions.create_bounded(insert, table.capacity).await {
            Ok(session) => session,
            Err(RepoError::Conflict(_)) => {
                return Err(AppError::business_rule(format!(
                    "Table {} is full ({} parties seated); ask the staff for help",
                    table.number, table.capacity
                )));
            }
            // 并发重复扫码撞唯一索引 — 回退为幂等读取
            Err(RepoError::Duplicate(_)) => self
                .sessions
                .find_active_by_fingerprint(table.id, &data.device_fingerprint)
                .await?
                .ok_or_else(|| AppError::internal("Session vanished after duplicate insert"))?,
            Err(e) => return Err(e.into()),
        };

        // 首个会话：ACTIVE → OCCUPIED（已占用则 no-op）
        self.tables
            .update_status_guarded(table.id, &[TableStatus::Active], TableStatus::Occupied)
            .await?;

        tracing::info!(
            session_id = session.id,
            table = table.number,
            "Session created (unverified)"
        );
        Ok(session)
    }

    fn enforce_geofence(
        &self,
        restaurant: &Restaurant,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> AppResult<()> {
        if !self.geofence_enabled || !restaurant.require_geofence {
            return Ok(());
        }
        let (Some(r_lat), Some(r_lon)) = (restaurant.latitude, restaurant.longitude) else {
            return Ok(());
        };
        let (Some(lat), Some(lon)) = (latitude, longitude) else {
            // 浏览器可能拒绝定位授权 — 软跳过而不是拒绝
            tracing::warn!(
                restaurant_id = restaurant.id,
                "Client omitted coordinates; skipping geofence check"
            );
            return Ok(());
        };

        let distance = geo::haversine_distance_m(r_lat, r_lon, lat, lon);
        if distance > restaurant.geofence_radius_m {
            return Err(AppError::business_rule(format!(
                "You appear to be {:.0} m away; ordering is only available within {:.0} m of the restaurant",
                distance, restaurant.geofence_radius_m
            )));
        }
        Ok(())
    }

    // ========== 验证交接 ==========

    /// 校验验证码并激活会话，签发会话令牌
    pub async fn verify_and_activate(
        &self,
        qr_id: &str,
        phone: &str,
        code: &str,
        device_fingerprint: &str,
    ) -> AppResult<SessionActivated> {
        let (table, restaurant) = self.resolve_qr(qr_id).await?;
        let phone = normalize_phone(phone);

        match self
            .verification
            .check_code(&phone, code, table.id)
            .await?
        {
            CheckOutcome::Valid => {}
            CheckOutcome::Mismatch { remaining } => {
                return Err(AppError::business_rule(format!(
                    "Incorrect code; {remaining} attempts remaining"
                )));
            }
        }

        let session = self
            .sessions
            .find_pending(table.id, &phone, device_fingerprint)
            .await?
            .ok_or_else(|| {
                AppError::not_found("No pending session for this phone and device")
            })?;

        self.sessions.mark_verified(session.id).await?;
        let session = self
            .sessions
            .find_by_id(session.id)
            .await?
            .ok_or_else(|| AppError::internal("Session vanished after verification"))?;

        let session_token = self.mint_token(&session, restaurant.id);

        tracing::info!(
            session_id = session.id,
            table = table.number,
            "Session verified and activated"
        );
        Ok(SessionActivated {
            session,
            session_token,
        })
    }

    /// 签发不透明令牌，TTL = 会话剩余窗口
    fn mint_token(&self, session: &TableSession, restaurant_id: i64) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let ctx = SessionContext {
            session_id: session.id,
            table_id: session.table_id,
            restaurant_id,
        };
        let ttl_ms = (session.expires_at - now_millis()).max(1) as u64;
        self.store.set(
            Self::token_key(&token),
            serde_json::to_string(&ctx).expect("SessionContext serializes"),
            Duration::from_millis(ttl_ms),
        );
        token
    }

    // ========== 令牌校验 ==========

    /// 解析令牌并对事实源复核（fail closed）
    ///
    /// 会话已停用 / 未验证 / 已过期都会导致令牌被逐出并返回 None。
    pub async fn validate_token(&self, token: &str) -> AppResult<Option<SessionContext>> {
        let key = Self::token_key(token);
        let Some(raw) = self.store.get(&key) else {
            return Ok(None);
        };
        let ctx: SessionContext = serde_json::from_str(&raw)
            .map_err(|e| AppError::internal(format!("Decode session context: {e}")))?;

        let live = self
            .sessions
            .find_by_id(ctx.session_id)
            .await?
            .map(|s| s.can_order(now_millis()))
            .unwrap_or(false);

        if !live {
            self.store.delete(&key);
            return Ok(None);
        }
        Ok(Some(ctx))
    }

    // ========== 会话终止 ==========

    /// 顾客主动结束会话；幂等
    ///
    /// 若这是桌上最后一个在用会话，OCCUPIED 桌台回落为 ACTIVE。
    pub async fn end_session(&self, session_id: i64) -> AppResult<()> {
        let Some(session) = self.sessions.find_by_id(session_id).await? else {
            return Err(AppError::not_found(format!("Session {session_id} not found")));
        };

        let newly_closed = self.sessions.deactivate(session_id).await?;
        self.release_table_if_empty(session.table_id).await?;

        if newly_closed {
            self.fanout.emit(
                session.restaurant_id,
                PushEvent::new(
                    PushEventKind::SessionClosed,
                    vec![Room::Table(session.table_id), Room::Session(session.id)],
                    serde_json::to_value(SessionClosed {
                        session_id: session.id,
                        table_id: session.table_id,
                        message: "Session ended".to_string(),
                    })
                    .unwrap_or_default(),
                ),
            );
            tracing::info!(session_id, "Session ended by customer");
        }
        Ok(())
    }

    /// 桌上没有在用会话时，把 OCCUPIED 回落为 ACTIVE
    async fn release_table_if_empty(&self, table_id: i64) -> AppResult<()> {
        if self.sessions.count_active(table_id).await? == 0 {
            self.tables
                .update_status_guarded(table_id, &[TableStatus::Occupied], TableStatus::Active)
                .await?;
        }
        Ok(())
    }

    // ========== 后台清扫 ==========

    /// 过期会话清扫：停用过期会话并回落空桌
    ///
    /// `validate_token` 在读路径上已经拒绝过期会话；这里把
    /// 残留的行和桌台状态收敛掉。
    pub async fn sweep_expired(&self) -> AppResult<usize> {
        let table_ids = self.sessions.deactivate_expired(now_millis()).await?;
        for table_id in &table_ids {
            self.release_table_if_empty(*table_id).await?;
        }
        Ok(table_ids.len())
    }

    /// 周期清扫任务入口
    pub async fn run_expiry_sweeper(self, shutdown: tokio_util::sync::CancellationToken) {
        const INTERVAL: Duration = Duration::from_secs(60);
        tracing::info!("Session expiry sweeper started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(INTERVAL) => {
                    match self.sweep_expired().await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!("Swept expired sessions on {} table(s)", n),
                        Err(e) => tracing::error!("Session sweep failed: {}", e),
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Session expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

}
