use crate::websocket::events::ServerEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

/// Outbound channel of one live connection. The connection task drains the
/// receiving end and owns the socket; everything else only ever sends.
pub type SessionHandle = UnboundedSender<ServerEvent>;

/// user_id -> live connection handle. Last registration wins; registering
/// does not close the prior handle (the old connection task notices its
/// receiver closing). Presence is ephemeral, nothing survives a restart.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_session(&self, user_id: &str, handle: SessionHandle) {
        let mut guard = self.inner.write().await;
        guard.insert(user_id.to_string(), handle);
    }

    pub async fn get_session(&self, user_id: &str) -> Option<SessionHandle> {
        let guard = self.inner.read().await;
        guard.get(user_id).cloned()
    }

    pub async fn remove_session(&self, user_id: &str) {
        let mut guard = self.inner.write().await;
        guard.remove(user_id);
    }

    /// Remove only if the stored handle is still `handle`. A disconnecting
    /// connection must not evict the session of the connection that
    /// replaced it.
    pub async fn remove_session_if_same(&self, user_id: &str, handle: &SessionHandle) {
        let mut guard = self.inner.write().await;
        if let Some(current) = guard.get(user_id) {
            if current.same_channel(handle) {
                guard.remove(user_id);
            }
        }
    }

    /// Snapshot of all mappings; safe to iterate while other handlers
    /// mutate the registry.
    pub async fn list_sessions(&self) -> Vec<(String, SessionHandle)> {
        let guard = self.inner.read().await;
        guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// chat_id -> (user_id -> handle). Rooms are joined and left explicitly
/// per connection; membership does not survive a reconnect.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    inner: Arc<RwLock<HashMap<String, HashMap<String, SessionHandle>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the user already held membership in the room.
    pub async fn join(&self, chat_id: &str, user_id: &str, handle: SessionHandle) -> bool {
        let mut guard = self.inner.write().await;
        let room = guard.entry(chat_id.to_string()).or_default();
        room.insert(user_id.to_string(), handle).is_none()
    }

    /// Removes the membership only while it still belongs to `handle`, and
    /// reports whether it did. Mirrors the session guard: a reconnect that
    /// re-joined the room must not be evicted by the old connection's
    /// teardown.
    pub async fn leave(&self, chat_id: &str, user_id: &str, handle: &SessionHandle) -> bool {
        let mut guard = self.inner.write().await;
        let Some(room) = guard.get_mut(chat_id) else {
            return false;
        };
        let removed = room
            .get(user_id)
            .is_some_and(|current| current.same_channel(handle));
        if removed {
            room.remove(user_id);
        }
        if room.is_empty() {
            guard.remove(chat_id);
        }
        removed
    }

    pub async fn leave_all(&self, user_id: &str, rooms: &HashSet<String>, handle: &SessionHandle) {
        let mut guard = self.inner.write().await;
        for chat_id in rooms {
            if let Some(room) = guard.get_mut(chat_id) {
                if room
                    .get(user_id)
                    .is_some_and(|current| current.same_channel(handle))
                {
                    room.remove(user_id);
                }
                if room.is_empty() {
                    guard.remove(chat_id);
                }
            }
        }
    }

    pub async fn contains(&self, chat_id: &str, user_id: &str) -> bool {
        let guard = self.inner.read().await;
        guard
            .get(chat_id)
            .is_some_and(|room| room.contains_key(user_id))
    }

    pub async fn broadcast(&self, chat_id: &str, event: ServerEvent) {
        self.broadcast_inner(chat_id, None, event).await;
    }

    /// Broadcast to the room, excluding one member (typically the event's
    /// originator, which already has the payload from its own request).
    pub async fn broadcast_except(&self, chat_id: &str, excluded_user: &str, event: ServerEvent) {
        self.broadcast_inner(chat_id, Some(excluded_user), event)
            .await;
    }

    async fn broadcast_inner(&self, chat_id: &str, excluded_user: Option<&str>, event: ServerEvent) {
        let mut guard = self.inner.write().await;
        if let Some(room) = guard.get_mut(chat_id) {
            // Sending to a closed handle prunes it; the peer disconnected.
            room.retain(|user_id, handle| {
                if excluded_user == Some(user_id.as_str()) {
                    return true;
                }
                handle.send(event.clone()).is_ok()
            });
            if room.is_empty() {
                guard.remove(chat_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn last_registration_wins() {
        let sessions = SessionRegistry::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();

        sessions.set_session("u1", tx1).await;
        sessions.set_session("u1", tx2).await;

        let handle = sessions.get_session("u1").await.unwrap();
        handle
            .send(ServerEvent::Connected {
                message: "hi".into(),
            })
            .unwrap();
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn stale_connection_does_not_evict_replacement() {
        let sessions = SessionRegistry::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();

        sessions.set_session("u1", tx1.clone()).await;
        sessions.set_session("u1", tx2).await;
        sessions.remove_session_if_same("u1", &tx1).await;

        assert!(sessions.get_session("u1").await.is_some());
    }

    #[tokio::test]
    async fn broadcast_excludes_originator() {
        let rooms = RoomRegistry::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();

        assert!(rooms.join("chat", "a", tx_a).await);
        assert!(rooms.join("chat", "b", tx_b).await);
        assert!(!rooms.join("chat", "b", {
            let (tx, _rx) = unbounded_channel();
            tx
        })
        .await);

        rooms
            .broadcast_except("chat", "a", ServerEvent::TypingStart)
            .await;
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::TypingStart);
    }

    #[tokio::test]
    async fn dead_handles_are_pruned() {
        let rooms = RoomRegistry::new();
        let (tx_a, rx_a) = unbounded_channel();
        rooms.join("chat", "a", tx_a).await;
        drop(rx_a);

        rooms.broadcast("chat", ServerEvent::TypingStop).await;
        assert!(!rooms.contains("chat", "a").await);
    }

    #[tokio::test]
    async fn leave_all_vacates_joined_rooms() {
        let rooms = RoomRegistry::new();
        let (tx, _rx) = unbounded_channel();
        rooms.join("c1", "a", tx.clone()).await;
        rooms.join("c2", "a", tx.clone()).await;

        let joined: HashSet<String> = ["c1".to_string(), "c2".to_string()].into();
        rooms.leave_all("a", &joined, &tx).await;
        assert!(!rooms.contains("c1", "a").await);
        assert!(!rooms.contains("c2", "a").await);
    }

    #[tokio::test]
    async fn stale_teardown_keeps_replacement_room_membership() {
        let rooms = RoomRegistry::new();
        let (tx_old, _rx_old) = unbounded_channel();
        let (tx_new, mut rx_new) = unbounded_channel();

        // Reconnect: the new connection re-joins and replaces the handle.
        rooms.join("chat", "u2", tx_old.clone()).await;
        rooms.join("chat", "u2", tx_new).await;

        let joined: HashSet<String> = ["chat".to_string()].into();
        rooms.leave_all("u2", &joined, &tx_old).await;

        assert!(rooms.contains("chat", "u2").await);
        rooms.broadcast("chat", ServerEvent::TypingStart).await;
        assert_eq!(rx_new.try_recv().unwrap(), ServerEvent::TypingStart);
    }

    #[tokio::test]
    async fn stale_explicit_leave_does_not_report_removal() {
        let rooms = RoomRegistry::new();
        let (tx_old, _rx_old) = unbounded_channel();
        let (tx_new, _rx_new) = unbounded_channel();

        rooms.join("chat", "u2", tx_old.clone()).await;
        rooms.join("chat", "u2", tx_new.clone()).await;

        assert!(!rooms.leave("chat", "u2", &tx_old).await);
        assert!(rooms.contains("chat", "u2").await);
        assert!(rooms.leave("chat", "u2", &tx_new).await);
        assert!(!rooms.contains("chat", "u2").await);
    }

    #[tokio::test]
    async fn concurrent_registration_loses_no_entries() {
        let sessions = SessionRegistry::new();
        let rooms = RoomRegistry::new();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let sessions = sessions.clone();
            let rooms = rooms.clone();
            tasks.push(tokio::spawn(async move {
                let (tx, rx) = unbounded_channel();
                let user = format!("u{i}");
                sessions.set_session(&user, tx.clone()).await;
                rooms.join("chat", &user, tx).await;
                rx
            }));
        }

        let mut receivers = Vec::new();
        for task in tasks {
            receivers.push(task.await.unwrap());
        }

        assert_eq!(sessions.list_sessions().await.len(), 32);
        rooms.broadcast("chat", ServerEvent::TypingStop).await;
        for mut rx in receivers {
            assert_eq!(rx.try_recv().unwrap(), ServerEvent::TypingStop);
        }
    }
}
