use std::sync::Arc;

use tracing::{info, warn};

use syntra_types::events::ClientCommand;

use crate::annotations::AnnotationBroadcaster;
use crate::error::GatewayError;
use crate::history::HistoryLog;
use crate::notify::Notifier;
use crate::rooms::{RoomRegistry, SessionId};
use crate::store::{HistoryStore, SnippetStore};
use crate::sync::LineSync;

/// Owns the realtime components. Created once at server start and shared by
/// every connection.
#[derive(Clone)]
pub struct Gateway {
    rooms: RoomRegistry,
    line_sync: LineSync,
    annotations: AnnotationBroadcaster,
    history: HistoryLog,
}

impl Gateway {
    pub fn new(snippets: Arc<dyn SnippetStore>, history: Arc<dyn HistoryStore>) -> Self {
        let rooms = RoomRegistry::new();
        let history = HistoryLog::new(history);
        let line_sync = LineSync::new(rooms.clone(), snippets, history.clone());
        let annotations = AnnotationBroadcaster::new(rooms.clone(), Notifier::new(rooms.clone()));

        Self {
            rooms,
            line_sync,
            annotations,
            history,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn line_sync(&self) -> &LineSync {
        &self.line_sync
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Route one client command. Failures are logged and never propagate:
    /// one bad event must not end the session.
    pub async fn handle_command(&self, session_id: SessionId, cmd: ClientCommand) {
        if let Err(e) = self.dispatch(session_id, cmd).await {
            let who = self.rooms.label(session_id).await;
            warn!("{} event dropped: {}", who, e);
        }
    }

    async fn dispatch(&self, session_id: SessionId, cmd: ClientCommand) -> Result<(), GatewayError> {
        match cmd {
            ClientCommand::JoinRoom(room) => {
                if room.trim().is_empty() {
                    return Err(GatewayError::Validation("join-room without a room key".into()));
                }
                self.rooms.join(session_id, &room).await?;
                let who = self.rooms.label(session_id).await;
                info!("{} joined room {}", who, room);
            }

            ClientCommand::SendComment(payload) => {
                self.annotations.send(session_id, payload).await?;
            }

            ClientCommand::CodeChange(payload) => {
                self.line_sync.apply(session_id, payload).await?;
            }
        }
        Ok(())
    }

    /// Tear down: drop all sessions and let queued writes finish.
    pub async fn shutdown(&self) {
        self.rooms.clear().await;
        self.line_sync.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, drain};
    use syntra_types::events::{CodeChangePayload, CommentPayload, ServerEvent};

    fn gateway(store: &Arc<MemoryStore>) -> Gateway {
        Gateway::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn two_viewers_edit_scenario() {
        let store = Arc::new(MemoryStore::with_snippet("S1", "fn f() {\n    return 0;\n}"));
        let gw = gateway(&store);
        let (a, mut rx_a) = gw.rooms().connect(None).await;
        let (b, mut rx_b) = gw.rooms().connect(None).await;

        gw.handle_command(a, ClientCommand::JoinRoom("S1".into())).await;
        gw.handle_command(b, ClientCommand::JoinRoom("S1".into())).await;

        let sent = CodeChangePayload {
            line_number: Some(2),
            line_code: Some("return 1;".into()),
            snippet_id: Some("S1".into()),
            author: Some("alice".into()),
            ..Default::default()
        };
        gw.handle_command(a, ClientCommand::CodeChange(sent.clone())).await;
        gw.line_sync().flush("S1").await;

        let b_events = drain(&mut rx_b);
        assert_eq!(b_events[0], ServerEvent::CodeChange(sent));

        for events in [drain(&mut rx_a), b_events[1..].to_vec()] {
            assert_eq!(events.len(), 1);
            let ServerEvent::ChangeHistoryUpdate(update) = &events[0] else {
                panic!("expected history update, got {:?}", events[0]);
            };
            assert!(update.detail.contains("line 2"));
        }

        let history = gw.history().list("S1").await.unwrap();
        assert_eq!(history[0].detail, "Code changed on line 2: return 1;");
        assert_eq!(store.code("S1").unwrap(), "fn f() {\nreturn 1;\n}");
    }

    #[tokio::test]
    async fn comment_to_unjoined_room_reaches_nobody() {
        let store = Arc::new(MemoryStore::default());
        let gw = gateway(&store);
        let (a, mut rx_a) = gw.rooms().connect(None).await;
        let (b, mut rx_b) = gw.rooms().connect(None).await;
        gw.handle_command(b, ClientCommand::JoinRoom("S1".into())).await;

        gw.handle_command(
            a,
            ClientCommand::SendComment(CommentPayload {
                text: Some("hi".into()),
                line: Some(1),
                snippet_id: Some("S2".into()),
                snippet_title: Some("Other".into()),
                ..Default::default()
            }),
        )
        .await;

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn disconnected_session_gets_nothing_more() {
        let store = Arc::new(MemoryStore::with_snippet("S1", "x"));
        let gw = gateway(&store);
        let (a, _rx_a) = gw.rooms().connect(None).await;
        let (b, mut rx_b) = gw.rooms().connect(None).await;
        gw.handle_command(a, ClientCommand::JoinRoom("S1".into())).await;
        gw.handle_command(b, ClientCommand::JoinRoom("S1".into())).await;

        gw.rooms().disconnect(b).await;
        assert!(!gw.rooms().members("S1").await.contains(&b));

        gw.handle_command(
            a,
            ClientCommand::SendComment(CommentPayload {
                text: Some("still here?".into()),
                snippet_id: Some("S1".into()),
                ..Default::default()
            }),
        )
        .await;
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn blank_room_key_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let gw = gateway(&store);
        let (a, _rx) = gw.rooms().connect(None).await;

        gw.handle_command(a, ClientCommand::JoinRoom("  ".into())).await;
        assert_eq!(gw.rooms().room_of(a).await, None);
    }
}
