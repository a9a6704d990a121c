use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// A freshly registered session: its id, the receiver the connection
/// task drains, and a sender clone identifying this registration.
pub struct Registration {
    pub session_id: String,
    pub receiver: mpsc::UnboundedReceiver<Message>,
    /// Clone of the registered sender. Pass it back to
    /// [`SessionRegistry::unregister_matching`] so a connection that was
    /// evicted by a reconnect cannot tear down its replacement.
    pub sender: WsSender,
}

/// Metadata for a single live session channel.
struct SessionChannel {
    sender: WsSender,
    connected_at: chrono::DateTime<chrono::Utc>,
}

/// Tracks live viewer sessions by id: at most one channel per id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application. Channels are independent mpsc
/// senders, so a failure on one never blocks delivery to the others.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionChannel>>,
}

impl SessionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session.
    ///
    /// A supplied id that is already registered evicts the prior channel
    /// (last-connect-wins); the evicted channel is sent a Close frame.
    /// With no id, a fresh random id is generated.
    pub async fn register(&self, session_id: Option<String>) -> Registration {
        let session_id =
            session_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = SessionChannel {
            sender: tx.clone(),
            connected_at: chrono::Utc::now(),
        };

        let evicted = self
            .sessions
            .write()
            .await
            .insert(session_id.clone(), channel);

        if let Some(old) = evicted {
            tracing::info!(session_id = %session_id, "Evicting previous session channel");
            let _ = old.sender.send(Message::Close(None));
        }

        Registration {
            session_id,
            receiver: rx,
            sender: tx,
        }
    }

    /// Remove a session by id. Idempotent; an unknown id is a no-op.
    pub async fn unregister(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Remove a session only if `sender` still identifies its channel.
    ///
    /// Used by connection teardown: a connection evicted by a reconnect
    /// holds a stale sender and must not remove its replacement.
    pub async fn unregister_matching(&self, session_id: &str, sender: &WsSender) {
        let mut sessions = self.sessions.write().await;
        if let Some(current) = sessions.get(session_id) {
            if current.sender.same_channel(sender) {
                sessions.remove(session_id);
            }
        }
    }

    /// Whether a session with this id is registered.
    pub async fn lookup(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// How long the session has been connected, if registered.
    pub async fn connected_since(
        &self,
        session_id: &str,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|c| c.connected_at)
    }

    /// Send a message to one session. Returns `false` when the id is
    /// unknown or its channel has failed; a failed channel is dropped
    /// from the registry.
    pub async fn send(&self, session_id: &str, message: Message) -> bool {
        let delivered = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(channel) => channel.sender.send(message).is_ok(),
                None => return false,
            }
        };

        if !delivered {
            tracing::warn!(session_id = %session_id, "Session channel closed, dropping");
            self.sessions.write().await.remove(session_id);
        }
        delivered
    }

    /// Broadcast a message to every session.
    ///
    /// A delivery failure on one channel never prevents delivery to the
    /// others; failed channels are logged and dropped afterwards.
    pub async fn broadcast(&self, message: Message) {
        let stale: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, channel)| channel.sender.send(message.clone()).is_err())
                .map(|(id, _)| id.clone())
                .collect()
        };

        if !stale.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in stale {
                tracing::warn!(session_id = %id, "Session channel closed, dropping");
                sessions.remove(&id);
            }
        }
    }

    /// Return the current number of live sessions.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for channel in sessions.values() {
            let _ = channel.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all WebSocket sessions");
    }

    /// Send a Ping frame to every session.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for channel in sessions.values() {
            let _ = channel.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
