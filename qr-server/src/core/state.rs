use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::fanout::FanoutHub;
use crate::kv::EphemeralStore;
use crate::orders::OrderLifecycleManager;
use crate::sessions::SessionManager;
use crate::tables::TableStateController;
use crate::verification::{SmsDispatcher, VerificationService};

/// 服务器状态 - 持有所有服务的单例引用
///
/// 使用 Arc / 池句柄实现浅拷贝，克隆成本极低。
///
/// # 服务组件
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | db | SQLite 连接池 |
/// | store | 临时键值存储（TTL + 发布/订阅） |
/// | fanout | 实时推送扇出枢纽 |
/// | jwt_service | 员工 JWT 认证服务 |
/// | verification | 验证码服务 |
/// | sessions | 会话管理器 |
/// | orders | 订单生命周期管理器 |
/// | tables | 桌台状态控制器 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: SqlitePool,
    pub store: EphemeralStore,
    pub fanout: FanoutHub,
    pub jwt_service: Arc<JwtService>,
    pub verification: Arc<VerificationService>,
    pub sessions: Arc<SessionManager>,
    pub orders: Arc<OrderLifecycleManager>,
    pub tables: Arc<TableStateController>,
    /// 后台任务关闭令牌
    pub shutdown_token: CancellationToken,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：工作目录 → 数据库（含迁移）→ 各服务。
    ///
    /// # Panics
    ///
    /// 工作目录或数据库初始化失败时 panic
    pub async fn initialize(config: &Config) -> Self {
        config
            .ensure_work_dir_structure()
            .expect("Failed to create work directory structure");

        let db_path = config.database_path();
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        Self::with_pool(config, db.pool)
    }

    /// 用现成连接池组装（测试用内存库走这里）
    pub fn with_pool(config: &Config, pool: SqlitePool) -> Self {
        let store = EphemeralStore::new();
        let fanout = FanoutHub::new(store.clone());

        let dispatcher = SmsDispatcher::from_config(config.sms_webhook_url.as_deref());
        let verification = Arc::new(VerificationService::new(
            pool.clone(),
            store.clone(),
            dispatcher,
            config,
        ));
        let sessions = Arc::new(SessionManager::new(
            pool.clone(),
            store.clone(),
            fanout.clone(),
            (*verification).clone(),
            config,
        ));
        let orders = Arc::new(OrderLifecycleManager::new(pool.clone(), fanout.clone()));
        let tables = Arc::new(TableStateController::new(pool.clone(), fanout.clone()));

        Self {
            config: config.clone(),
            db: pool,
            store,
            fanout,
            jwt_service: Arc::new(JwtService::new(config.jwt.clone())),
            verification,
            sessions,
            orders,
            tables,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 之前调用。
    ///
    /// 启动的任务：
    /// - 临时存储过期清扫
    /// - 扇出桥接（广播通道 → 本地房间）
    /// - 会话过期清扫
    pub fn start_background_tasks(&self) {
        tokio::spawn(self.store.clone().run_sweeper(self.shutdown_token.clone()));
        self.fanout.spawn_bridge(self.shutdown_token.clone());
        tokio::spawn(
            (*self.sessions)
                .clone()
                .run_expiry_sweeper(self.shutdown_token.clone()),
        );
    }

    /// 优雅关闭：取消全部后台任务
    pub fn shutdown(&self) {
        tracing::info!("Shutting down background tasks");
        self.shutdown_token.cancel();
    }
}
