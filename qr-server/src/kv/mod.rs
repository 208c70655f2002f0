//! 临时键值存储 - 短生命周期高频状态
//!
//! 承载在途验证码、会话令牌、发码冷却标记等带 TTL 的热路径状态，
//! 同时兼任跨实例推送的发布/订阅通道。
//!
//! # 架构
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               EphemeralStore                  │
//! │  ┌─────────────────────┐ ┌─────────────────┐ │
//! │  │ DashMap<key, Entry> │ │ broadcast::     │ │
//! │  │  (TTL, 读时懒过期)   │ │ Sender<Envelope>│ │
//! │  └─────────────────────┘ └─────────────────┘ │
//! └──────────────────────────────────────────────┘
//!          ▲                        │
//!     run_sweeper (30s)       subscribe() → 各实例桥接任务
//! ```
//!
//! 发布/订阅是 at-least-once：消费端把消息当作幂等刷新信号。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use shared::util::now_millis;

/// 清扫周期
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// 广播通道容量
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// Unix millis；到点即视为不存在
    expires_at: i64,
}

/// 发布/订阅信封：通道名 + 字节载荷
#[derive(Debug, Clone)]
pub struct Envelope {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// 临时键值存储
#[derive(Debug, Clone)]
pub struct EphemeralStore {
    entries: Arc<DashMap<String, Entry>>,
    bus_tx: broadcast::Sender<Envelope>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        let (bus_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(DashMap::new()),
            bus_tx,
        }
    }

    // ========== TTL KV ==========

    /// 写入（覆盖旧值与旧 TTL）
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let expires_at = now_millis() + ttl.as_millis() as i64;
        self.entries.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at,
            },
        );
    }

    /// 读取；过期条目读时即删（懒过期）
    pub fn get(&self, key: &str) -> Option<String> {
        let now = now_millis();
        // 先释放读守卫再删除，避免与 DashMap 分片写锁互等
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        None
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 剩余 TTL；不存在或已过期返回 None
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = now_millis();
        self.entries.get(key).and_then(|entry| {
            let left = entry.expires_at - now;
            (left > 0).then(|| Duration::from_millis(left as u64))
        })
    }

    /// 当前未过期条目数（测试/指标用）
    pub fn len(&self) -> usize {
        let now = now_millis();
        self.entries
            .iter()
            .filter(|e| e.value().expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========== Pub/Sub ==========

    /// 在指定通道上发布载荷（跨实例广播）
    ///
    /// 无订阅者时发送失败是正常情况，不作为错误传播。
    pub fn publish(&self, channel: impl Into<String>, payload: Vec<u8>) {
        let envelope = Envelope {
            channel: channel.into(),
            payload,
        };
        if let Err(e) = self.bus_tx.send(envelope) {
            tracing::debug!("No subscribers on ephemeral bus: {}", e);
        }
    }

    /// 订阅全部通道；订阅方按通道前缀过滤（模式订阅）
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.bus_tx.subscribe()
    }

    // ========== 后台清扫 ==========

    /// 周期性清除过期条目；`shutdown` 取消后退出
    pub async fn run_sweeper(self, shutdown: CancellationToken) {
        tracing::info!("Ephemeral store sweeper started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                    let now = now_millis();
                    let before = self.entries.len();
                    self.entries.retain(|_, entry| entry.expires_at > now);
                    let removed = before - self.entries.len();
                    if removed > 0 {
                        tracing::debug!("Swept {} expired ephemeral entries", removed);
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Ephemeral store sweeper shutting down");
                    return;
                }
            }
        }
    }
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = EphemeralStore::new();
        store.set("k1", "v1", Duration::from_secs(60));
        assert_eq!(store.get("k1").as_deref(), Some("v1"));
        assert!(store.delete("k1"));
        assert_eq!(store.get("k1"), None);
        assert!(!store.delete("k1"));
    }

    #[tokio::test]
    async fn test_expiry_on_read() {
        let store = EphemeralStore::new();
        store.set("short", "x", Duration::from_millis(30));
        assert!(store.exists("short"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("short"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let store = EphemeralStore::new();
        store.set("k", "old", Duration::from_millis(30));
        store.set("k", "new", Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("k").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let store = EphemeralStore::new();
        let mut rx = store.subscribe();
        store.publish("fanout:restaurant:1", b"hello".to_vec());
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.channel, "fanout:restaurant:1");
        assert_eq!(envelope.payload, b"hello");
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let store = EphemeralStore::new();
        store.set("k", "v", Duration::from_secs(60));
        let left = store.ttl_remaining("k").unwrap();
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(58));
        assert!(store.ttl_remaining("missing").is_none());
    }
}
