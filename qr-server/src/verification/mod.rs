//! 验证码服务
//!
//! 对 (手机号, 桌台) 签发一次性 6 位数字码并校验，带冷却窗口与
//! 尝试次数预算。热路径记录存临时存储（TTL 即生命周期），
//! 数据库只留审计行。

pub mod sender;

use std::time::Duration;

use rand::Rng;
use sqlx::SqlitePool;

use shared::models::CodeRecord;
use shared::util::now_millis;

use crate::core::Config;
use crate::db::repository::VerificationCodeRepository;
use crate::kv::EphemeralStore;
use crate::utils::{AppError, AppResult};

pub use sender::SmsDispatcher;

/// 校验结果
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// 通过
    Valid,
    /// 码不匹配，还剩 n 次机会
    Mismatch { remaining: i64 },
}

/// 验证码服务
#[derive(Clone)]
pub struct VerificationService {
    audit: VerificationCodeRepository,
    store: EphemeralStore,
    dispatcher: SmsDispatcher,
    code_ttl: Duration,
    cooldown: Duration,
    max_attempts: i64,
}

impl VerificationService {
    pub fn new(
        pool: SqlitePool,
        store: EphemeralStore,
        dispatcher: SmsDispatcher,
        config: &Config,
    ) -> Self {
        Self {
            audit: VerificationCodeRepository::new(pool),
            store,
            dispatcher,
            code_ttl: Duration::from_secs(config.verification_code_ttl_secs),
            cooldown: Duration::from_secs(config.verification_cooldown_secs),
            max_attempts: config.verification_max_attempts,
        }
    }

    fn code_key(phone: &str, table_id: i64) -> String {
        format!("verify:{phone}:{table_id}")
    }

    fn cooldown_key(phone: &str) -> String {
        format!("verify_cooldown:{phone}")
    }

    /// 签发验证码
    ///
    /// 冷却窗口内重复请求直接拒绝（文案带剩余秒数）。
    /// 返回验证码有效期（秒）。
    pub async fn send_code(
        &self,
        phone: &str,
        table_id: i64,
        restaurant_id: i64,
    ) -> AppResult<u64> {
        let cooldown_key = Self::cooldown_key(phone);
        if let Some(left) = self.store.ttl_remaining(&cooldown_key) {
            return Err(AppError::business_rule(format!(
                "A code was sent recently; try again in {} seconds",
                left.as_secs().max(1)
            )));
        }

        let code = generate_code();
        let expires_at = now_millis() + self.code_ttl.as_millis() as i64;

        // 审计行先落库 — 发送失败也要留痕
        self.audit
            .create(restaurant_id, table_id, phone, &code, expires_at)
            .await?;

        let record = CodeRecord {
            code: code.clone(),
            attempts: 0,
        };
        self.store.set(
            Self::code_key(phone, table_id),
            serde_json::to_string(&record)
                .map_err(|e| AppError::internal(format!("Encode code record: {e}")))?,
            self.code_ttl,
        );
        self.store.set(&cooldown_key, "1", self.cooldown);

        self.dispatcher.dispatch(phone, &code).await;

        Ok(self.code_ttl.as_secs())
    }

    /// 校验验证码
    ///
    /// - 记录缺失（过期 / 从未签发）→ 业务错误
    /// - 尝试次数到顶 → 删除记录，旧码彻底作废
    /// - 不匹配 → 计数 +1，返回剩余次数
    /// - 匹配 → 回填审计 used_at，删除记录（单次使用）
    pub async fn check_code(
        &self,
        phone: &str,
        code: &str,
        table_id: i64,
    ) -> AppResult<CheckOutcome> {
        let key = Self::code_key(phone, table_id);
        let raw = self.store.get(&key).ok_or_else(|| {
            AppError::business_rule("Verification code expired or not found; request a new one")
        })?;

        let mut record: CodeRecord = serde_json::from_str(&raw)
            .map_err(|e| AppError::internal(format!("Decode code record: {e}")))?;

        if record.attempts >= self.max_attempts {
            self.store.delete(&key);
            return Err(AppError::business_rule(
                "Too many attempts; request a new code",
            ));
        }

        if record.code != code {
            record.attempts += 1;
            let remaining = self.max_attempts - record.attempts;
            if remaining <= 0 {
                // 最后一次机会也用完 — 立即清除，正确的码此后也无效
                self.store.delete(&key);
                return Err(AppError::business_rule(
                    "Too many attempts; request a new code",
                ));
            }
            // 写回不触碰 TTL 以外的语义：保留原剩余有效期
            let ttl = self
                .store
                .ttl_remaining(&key)
                .unwrap_or(Duration::from_secs(1));
            self.store.set(
                &key,
                serde_json::to_string(&record)
                    .map_err(|e| AppError::internal(format!("Encode code record: {e}")))?,
                ttl,
            );
            return Ok(CheckOutcome::Mismatch { remaining });
        }

        // 命中：单次使用，立即销毁
        self.store.delete(&key);
        self.audit.mark_used(table_id, phone).await?;
        Ok(CheckOutcome::Valid)
    }
}

/// 生成 6 位数字验证码
fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}
