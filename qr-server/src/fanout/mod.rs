//! 实时推送扇出
//!
//! # 架构
//!
//! ```text
//! manager.emit(event)
//!        │
//!        ▼
//! EphemeralStore.publish("fanout:restaurant:{id}", bytes)   ◄── 跨实例广播
//!        │
//!        ▼ (每个服务器实例各自运行)
//! 桥接任务: subscribe → 按 "fanout:" 前缀过滤 → 解析 PushEvent
//!        │
//!        ▼
//! FanoutHub rooms (DashMap<room_key, broadcast::Sender>)
//!        │
//!        ▼
//! 已连接的 WebSocket (顾客手机 / 后厨大屏 / 收银台)
//! ```
//!
//! 本地分发只有桥接任务一条路径：事件一律先上广播通道再回流，
//! 保证本实例与其他实例看到同一份投递流。通知失败只记日志，
//! 绝不回滚已提交的状态变更 — 存储层才是事实源。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use shared::message::{PushEvent, Room};

use crate::kv::EphemeralStore;

/// 单房间广播容量 — 慢消费者会丢最旧事件（Lagged），
/// 客户端按幂等刷新语义自行对账
const ROOM_CAPACITY: usize = 256;

/// 广播通道前缀（按餐厅分通道）
const CHANNEL_PREFIX: &str = "fanout:";

/// 推送扇出枢纽 — 房间寻址的本地分发表
#[derive(Debug, Clone)]
pub struct FanoutHub {
    rooms: Arc<DashMap<String, broadcast::Sender<PushEvent>>>,
    store: EphemeralStore,
}

impl FanoutHub {
    pub fn new(store: EphemeralStore) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            store,
        }
    }

    /// 订阅一个逻辑房间
    pub fn subscribe(&self, room: Room) -> broadcast::Receiver<PushEvent> {
        self.rooms
            .entry(room.key())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// 发布事件（穿过跨实例广播通道后由桥接任务回流本地分发）
    ///
    /// 扇出是 best-effort：序列化失败只记日志。
    pub fn emit(&self, restaurant_id: i64, event: PushEvent) {
        match event.to_bytes() {
            Ok(bytes) => {
                self.store
                    .publish(format!("{CHANNEL_PREFIX}restaurant:{restaurant_id}"), bytes);
            }
            Err(e) => {
                tracing::error!(kind = %event.kind, "Failed to serialize push event: {}", e);
            }
        }
    }

    /// 分发一条事件到其目标房间（桥接任务专用）
    fn dispatch_local(&self, event: &PushEvent) {
        for room in &event.rooms {
            if let Some(sender) = self.rooms.get(&room.key()) {
                // 房间无人订阅时 send 返回 Err，属正常情况
                let _ = sender.send(event.clone());
            }
        }
    }

    /// 启动桥接任务：订阅广播通道，把事件回流到本地房间
    ///
    /// 每个服务器进程启动一个；任何实例发布的事件都会经由
    /// 各实例自己的桥接投递到各自连接的客户端。
    /// 订阅在 spawn 之前同步完成，启动期间发布的事件不会丢。
    pub fn spawn_bridge(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let rx = self.store.subscribe();
        tokio::spawn(self.clone().bridge_loop(rx, shutdown))
    }

    async fn bridge_loop(
        self,
        mut rx: broadcast::Receiver<crate::kv::Envelope>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Fanout bridge started");
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(envelope) => {
                            if !envelope.channel.starts_with(CHANNEL_PREFIX) {
                                continue;
                            }
                            match PushEvent::from_bytes(&envelope.payload) {
                                Ok(event) => self.dispatch_local(&event),
                                Err(e) => {
                                    tracing::warn!(
                                        channel = %envelope.channel,
                                        "Dropping malformed fanout payload: {}", e
                                    );
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // 丢失的事件由客户端的幂等刷新兜底
                            tracing::warn!("Fanout bridge lagged, {} events dropped", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Ephemeral bus closed, fanout bridge exiting");
                            return;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Fanout bridge shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::PushEventKind;

    fn hub_with_bridge() -> (FanoutHub, CancellationToken) {
        let store = EphemeralStore::new();
        let hub = FanoutHub::new(store);
        let shutdown = CancellationToken::new();
        hub.spawn_bridge(shutdown.clone());
        (hub, shutdown)
    }

    #[tokio::test]
    async fn test_emit_reaches_subscribed_room() {
        let (hub, shutdown) = hub_with_bridge();
        let mut rx = hub.subscribe(Room::Table(5));

        hub.emit(
            1,
            PushEvent::new(
                PushEventKind::OrderCreated,
                vec![Room::Restaurant(1), Room::Table(5)],
                serde_json::json!({"order_id": 42}),
            ),
        );

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(event.kind, PushEventKind::OrderCreated);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_event_delivered_to_every_addressed_room() {
        let (hub, shutdown) = hub_with_bridge();
        let mut table_rx = hub.subscribe(Room::Table(3));
        let mut session_rx = hub.subscribe(Room::Session(9));

        hub.emit(
            1,
            PushEvent::new(
                PushEventKind::SessionClosed,
                vec![Room::Table(3), Room::Session(9)],
                serde_json::json!({"message": "checked out"}),
            ),
        );

        let a = tokio::time::timeout(std::time::Duration::from_secs(1), table_rx.recv())
            .await
            .expect("timed out")
            .unwrap();
        let b = tokio::time::timeout(std::time::Duration::from_secs(1), session_rx.recv())
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(a.event_id, b.event_id);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unsubscribed_room_is_ignored() {
        let (hub, shutdown) = hub_with_bridge();
        let mut rx = hub.subscribe(Room::Kitchen(1));

        // 目标房间无人订阅 — 不 panic，不投递
        hub.emit(
            1,
            PushEvent::new(
                PushEventKind::OrderUpdated,
                vec![Room::Table(99)],
                serde_json::json!({}),
            ),
        );
        hub.emit(
            1,
            PushEvent::new(
                PushEventKind::OrderUpdated,
                vec![Room::Kitchen(1)],
                serde_json::json!({"seq": 2}),
            ),
        );

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(event.payload["seq"], 2);
        shutdown.cancel();
    }
}
