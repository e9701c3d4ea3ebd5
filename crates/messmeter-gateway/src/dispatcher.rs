use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use messmeter_types::events::GatewayEvent;

/// Manages all connected dashboard clients and fans out live events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events — all connected clients receive
    /// all broadcast events
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Track online users: user_id -> username
    online_users: RwLock<HashMap<Uuid, String>>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Send a targeted event to a specific user, if connected.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Register a user as online.
    pub async fn user_online(&self, user_id: Uuid, username: String) {
        self.inner
            .online_users
            .write()
            .await
            .insert(user_id, username.clone());

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            username,
            online: true,
        });
    }

    /// Register a user as offline. Only cleans up if conn_id matches, so a
    /// reconnect that already replaced the channel is left alone. The check
    /// and removal happen under one write lock, so a reconnect can never
    /// slip in between them.
    pub async fn user_offline(&self, user_id: Uuid, conn_id: Uuid) {
        {
            let mut channels = self.inner.user_channels.write().await;
            match channels.get(&user_id) {
                Some((cid, _)) if *cid == conn_id => {
                    channels.remove(&user_id);
                }
                _ => return,
            }
        }

        let username = self
            .inner
            .online_users
            .write()
            .await
            .remove(&user_id)
            .unwrap_or_default();

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            username,
            online: false,
        });
    }

    /// Get list of online users.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .online_users
            .read()
            .await
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use messmeter_types::models::TxSource;

    fn points_event(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::PointsAdjusted {
            user_id,
            delta: 5,
            balance: 5,
            source: TxSource::Attendance,
        }
    }

    #[tokio::test]
    async fn stale_disconnect_leaves_a_reconnected_channel_alone() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();

        let (old_conn, _old_rx) = dispatcher.register_user_channel(user).await;
        dispatcher.user_online(user, "asha".into()).await;

        // Reconnect replaces the channel before the old connection tears down
        let (_new_conn, mut new_rx) = dispatcher.register_user_channel(user).await;
        dispatcher.user_online(user, "asha".into()).await;

        dispatcher.user_offline(user, old_conn).await;

        // The fresh channel must still receive targeted events
        dispatcher.send_to_user(user, points_event(user)).await;
        assert!(new_rx.try_recv().is_ok());
        assert!(dispatcher
            .online_users()
            .await
            .iter()
            .any(|(id, _)| *id == user));
    }

    #[tokio::test]
    async fn matching_disconnect_cleans_up() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();

        let (conn, mut rx) = dispatcher.register_user_channel(user).await;
        dispatcher.user_online(user, "asha".into()).await;
        dispatcher.user_offline(user, conn).await;

        dispatcher.send_to_user(user, points_event(user)).await;
        assert!(rx.try_recv().is_err());
        assert!(dispatcher.online_users().await.is_empty());
    }
}
