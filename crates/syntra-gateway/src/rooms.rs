use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use syntra_types::events::ServerEvent;

use crate::error::GatewayError;

pub type SessionId = Uuid;

/// Token presented on connect. Only used to label log lines; the realtime
/// channel does not authorize anything with it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub username: Option<String>,
}

struct SessionEntry {
    tx: mpsc::UnboundedSender<ServerEvent>,
    credential: Option<Credential>,
    room: Option<String>,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, SessionEntry>,
    /// snippet_id -> members. A room exists only while it has members.
    rooms: HashMap<String, HashSet<SessionId>>,
}

impl RegistryState {
    fn detach(&mut self, session_id: SessionId) -> Option<String> {
        let room = self.sessions.get_mut(&session_id)?.room.take()?;
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&session_id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
        Some(room)
    }
}

/// Tracks live sessions and the snippet room each one is in.
///
/// Both maps sit behind one lock so membership changes and broadcasts never
/// observe a half-updated registry.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. Returns its id and the receiver for events
    /// addressed to it.
    pub async fn connect(
        &self,
        credential: Option<Credential>,
    ) -> (SessionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.sessions.insert(
            session_id,
            SessionEntry {
                tx,
                credential,
                room: None,
            },
        );
        (session_id, rx)
    }

    /// Forget a session, leaving its room first.
    pub async fn disconnect(&self, session_id: SessionId) -> Option<String> {
        let mut state = self.inner.write().await;
        let room = state.detach(session_id);
        state.sessions.remove(&session_id);
        room
    }

    /// Put the session in `snippet_id`'s room. A session is in at most one
    /// room, so joining elsewhere leaves the previous room.
    pub async fn join(&self, session_id: SessionId, snippet_id: &str) -> Result<(), GatewayError> {
        let mut state = self.inner.write().await;

        let current = state
            .sessions
            .get(&session_id)
            .ok_or(GatewayError::UnknownSession(session_id))?
            .room
            .clone();

        if current.as_deref() == Some(snippet_id) {
            return Ok(());
        }
        if let Some(previous) = state.detach(session_id) {
            debug!("session {} left room {} to join {}", session_id, previous, snippet_id);
        }

        state
            .rooms
            .entry(snippet_id.to_string())
            .or_default()
            .insert(session_id);
        if let Some(entry) = state.sessions.get_mut(&session_id) {
            entry.room = Some(snippet_id.to_string());
        }
        Ok(())
    }

    /// Remove the session from its room. Returns the room it left, if any.
    pub async fn leave(&self, session_id: SessionId) -> Option<String> {
        self.inner.write().await.detach(session_id)
    }

    /// Deliver `event` to every member of the room except `exclude`.
    /// Returns how many sessions it was queued for; an unknown room is a no-op.
    pub async fn broadcast(
        &self,
        snippet_id: &str,
        event: ServerEvent,
        exclude: Option<SessionId>,
    ) -> usize {
        let state = self.inner.read().await;
        let Some(members) = state.rooms.get(snippet_id) else {
            debug!("{} to empty room {} dropped", event.name(), snippet_id);
            return 0;
        };

        let mut delivered = 0;
        for session_id in members {
            if Some(*session_id) == exclude {
                continue;
            }
            if let Some(entry) = state.sessions.get(session_id) {
                if entry.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    pub async fn room_of(&self, session_id: SessionId) -> Option<String> {
        self.inner
            .read()
            .await
            .sessions
            .get(&session_id)
            .and_then(|entry| entry.room.clone())
    }

    pub async fn members(&self, snippet_id: &str) -> Vec<SessionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(snippet_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Name used for a session in log lines: the token's username when one
    /// decoded, otherwise the session id.
    pub async fn label(&self, session_id: SessionId) -> String {
        self.inner
            .read()
            .await
            .sessions
            .get(&session_id)
            .and_then(|entry| entry.credential.as_ref())
            .and_then(|credential| credential.username.clone())
            .unwrap_or_else(|| session_id.to_string())
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Drop every session. Their outbound queues close, which ends the
    /// connection writers.
    pub async fn clear(&self) {
        let mut state = self.inner.write().await;
        let sessions = state.sessions.len();
        state.sessions.clear();
        state.rooms.clear();
        info!("Room registry cleared ({} sessions)", sessions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::drain;
    use syntra_types::models::{NotificationEvent, NotificationKind};

    fn ping() -> ServerEvent {
        ServerEvent::NewNotification(NotificationEvent {
            kind: NotificationKind::Comment,
            message: "ping".into(),
        })
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let rooms = RoomRegistry::new();
        let (a, _rx) = rooms.connect(None).await;

        rooms.join(a, "S1").await.unwrap();
        rooms.join(a, "S1").await.unwrap();

        assert_eq!(rooms.members("S1").await, vec![a]);
        assert_eq!(rooms.room_count().await, 1);
    }

    #[tokio::test]
    async fn last_join_wins() {
        let rooms = RoomRegistry::new();
        let (a, _rx) = rooms.connect(None).await;

        for key in ["S1", "S2", "S3", "S2"] {
            rooms.join(a, key).await.unwrap();
        }

        assert_eq!(rooms.room_of(a).await.as_deref(), Some("S2"));
        assert!(rooms.members("S1").await.is_empty());
        assert!(rooms.members("S3").await.is_empty());
        assert_eq!(rooms.members("S2").await, vec![a]);
        assert_eq!(rooms.room_count().await, 1);
    }

    #[tokio::test]
    async fn leave_without_room_is_noop() {
        let rooms = RoomRegistry::new();
        let (a, _rx) = rooms.connect(None).await;
        assert_eq!(rooms.leave(a).await, None);
        assert_eq!(rooms.leave(Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn join_unknown_session_fails() {
        let rooms = RoomRegistry::new();
        let err = rooms.join(Uuid::new_v4(), "S1").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn broadcast_skips_excluded_session() {
        let rooms = RoomRegistry::new();
        let (a, mut rx_a) = rooms.connect(None).await;
        let (b, mut rx_b) = rooms.connect(None).await;
        rooms.join(a, "S1").await.unwrap();
        rooms.join(b, "S1").await.unwrap();

        assert_eq!(rooms.broadcast("S1", ping(), Some(a)).await, 1);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![ping()]);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_room_is_noop() {
        let rooms = RoomRegistry::new();
        let (_a, mut rx_a) = rooms.connect(None).await;
        assert_eq!(rooms.broadcast("nowhere", ping(), None).await, 0);
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn disconnect_removes_member() {
        let rooms = RoomRegistry::new();
        let (a, _rx_a) = rooms.connect(None).await;
        let (b, mut rx_b) = rooms.connect(None).await;
        rooms.join(a, "S1").await.unwrap();
        rooms.join(b, "S1").await.unwrap();

        assert_eq!(rooms.disconnect(b).await.as_deref(), Some("S1"));
        assert_eq!(rooms.broadcast("S1", ping(), None).await, 1);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(rooms.session_count().await, 1);
    }

    #[tokio::test]
    async fn label_prefers_username() {
        let rooms = RoomRegistry::new();
        let credential = Credential {
            token: "t".into(),
            username: Some("alice".into()),
        };
        let (a, _rx) = rooms.connect(Some(credential)).await;
        let (b, _rx_b) = rooms.connect(None).await;

        assert_eq!(rooms.label(a).await, "alice");
        assert_eq!(rooms.label(b).await, b.to_string());
    }
}
