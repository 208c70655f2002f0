use std::path::PathBuf;

use crate::auth::JwtConfig;

/// 服务器配置 - 所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/qr-server | 工作目录（数据库、日志） |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | VERIFICATION_CODE_TTL_SECS | 300 | 验证码有效期（秒） |
/// | VERIFICATION_MAX_ATTEMPTS | 3 | 验证码最大尝试次数 |
/// | VERIFICATION_COOLDOWN_SECS | 60 | 同一手机号重发冷却（秒） |
/// | SESSION_TIMEOUT_SECS | 14400 | 会话窗口（秒，默认 4 小时） |
/// | GEOFENCE_ENABLED | true | 是否启用地理围栏 |
/// | DEFAULT_GEOFENCE_RADIUS_M | 150 | 默认围栏半径（米） |
/// | SMS_WEBHOOK_URL | (无) | 短信网关 webhook；缺省时验证码走日志兜底 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/qr HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// JWT 认证配置（员工端）
    pub jwt: JwtConfig,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 验证码 ===
    /// 验证码有效期（秒）
    pub verification_code_ttl_secs: u64,
    /// 验证码最大尝试次数
    pub verification_max_attempts: i64,
    /// 同一手机号重发冷却（秒）
    pub verification_cooldown_secs: u64,

    // === 会话 ===
    /// 会话窗口（秒），同时是会话令牌 TTL 上限
    pub session_timeout_secs: u64,

    // === 地理围栏 ===
    pub geofence_enabled: bool,
    pub default_geofence_radius_m: f64,

    // === 外部短信网关 ===
    /// 缺省时验证码打印到运维日志（开发兜底）
    pub sms_webhook_url: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/qr-server".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            jwt: JwtConfig::default(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            verification_code_ttl_secs: std::env::var("VERIFICATION_CODE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            verification_max_attempts: std::env::var("VERIFICATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            verification_cooldown_secs: std::env::var("VERIFICATION_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            session_timeout_secs: std::env::var("SESSION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4 * 3600),

            geofence_enabled: std::env::var("GEOFENCE_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            default_geofence_radius_m: std::env::var("DEFAULT_GEOFENCE_RADIUS_M")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(150.0),

            sms_webhook_url: std::env::var("SMS_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 数据库文件路径 (work_dir/database/qr.db)
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database").join("qr.db")
    }

    /// 日志目录 (work_dir/logs)
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(PathBuf::from(&self.work_dir).join("database"))?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
