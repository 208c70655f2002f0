//! QR 点餐服务端 - 桌台会话与订单生命周期引擎
//!
//! # 架构概述
//!
//! 堂食顾客扫桌贴二维码 → 手机号验证开启会话 → 下单 →
//! 后厨/收银推进订单状态 → 整桌结账释放桌台；全程通过
//! 扇出枢纽向所有在线端推送状态变更。
//!
//! # 模块结构
//!
//! ```text
//! qr-server/src/
//! ├── core/          # 配置、状态、HTTP 服务器
//! ├── auth/          # 员工 JWT 认证、能力检查、顾客会话令牌
//! ├── db/            # SQLite 连接池与仓储层
//! ├── kv/            # 临时键值存储（TTL + 发布/订阅）
//! ├── fanout/        # 实时推送扇出（房间寻址 + 跨实例桥接）
//! ├── verification/  # 验证码签发与校验
//! ├── sessions/      # 桌台会话状态机
//! ├── orders/        # 订单生命周期状态机
//! ├── tables/        # 桌台状态机与结账释放
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、时间、地理、日志工具
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod fanout;
pub mod kv;
pub mod orders;
pub mod sessions;
pub mod tables;
pub mod utils;
pub mod verification;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use fanout::FanoutHub;
pub use kv::EphemeralStore;
pub use orders::OrderLifecycleManager;
pub use sessions::SessionManager;
pub use tables::TableStateController;
pub use utils::{AppError, AppResult};
pub use verification::VerificationService;

/// 环境准备：加载 .env 并初始化日志
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").ok();
    utils::logger::init_logger_with_file(level.as_deref(), None);
}
