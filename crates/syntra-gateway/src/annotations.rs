use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use syntra_types::events::{CommentPayload, ServerEvent};
use syntra_types::models::Annotation;

use crate::error::GatewayError;
use crate::notify::{self, Notifier};
use crate::rooms::{RoomRegistry, SessionId};

/// Check a `send-comment` payload and build the annotation it describes.
/// A missing line anchors the comment to the whole snippet.
pub fn validate(payload: &CommentPayload) -> Result<Annotation, GatewayError> {
    let snippet_id = payload
        .snippet_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| GatewayError::Validation("send-comment without snippetId".into()))?;

    let text = payload.text.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GatewayError::Validation("send-comment with empty text".into()));
    }

    let line = payload.line.unwrap_or(0);
    let line_number = u32::try_from(line)
        .map_err(|_| GatewayError::Validation(format!("comment line {} out of range", line)))?;

    Ok(Annotation {
        id: Uuid::new_v4(),
        snippet_id: snippet_id.to_string(),
        line_number,
        text: text.to_string(),
        author_id: payload.author.clone().unwrap_or_else(|| "anonymous".into()),
        timestamp: Utc::now(),
    })
}

/// Relays comments to a snippet's room. Storing them is the REST path's job;
/// nothing here checks that the sender may comment.
#[derive(Clone)]
pub struct AnnotationBroadcaster {
    rooms: RoomRegistry,
    notifier: Notifier,
}

impl AnnotationBroadcaster {
    pub fn new(rooms: RoomRegistry, notifier: Notifier) -> Self {
        Self { rooms, notifier }
    }

    pub async fn send(
        &self,
        sender: SessionId,
        payload: CommentPayload,
    ) -> Result<Annotation, GatewayError> {
        let annotation = validate(&payload)?;
        let notification = notify::derive(&payload);

        let delivered = self
            .rooms
            .broadcast(&annotation.snippet_id, ServerEvent::NewComment(payload), None)
            .await;
        let who = self.rooms.label(sender).await;
        info!(
            "comment from {} on {} line {} relayed to {} sessions",
            who,
            annotation.snippet_id,
            annotation.line_number,
            delivered
        );

        self.notifier
            .dispatch(&annotation.snippet_id, notification)
            .await;

        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::drain;

    fn payload(snippet_id: &str, text: &str, line: i64) -> CommentPayload {
        CommentPayload {
            text: Some(text.into()),
            line: Some(line),
            author: Some("rev-1".into()),
            snippet_id: Some(snippet_id.into()),
            snippet_title: Some("Binary search".into()),
            ..Default::default()
        }
    }

    fn broadcaster(rooms: &RoomRegistry) -> AnnotationBroadcaster {
        AnnotationBroadcaster::new(rooms.clone(), Notifier::new(rooms.clone()))
    }

    #[tokio::test]
    async fn comment_and_notification_reach_whole_room() {
        let rooms = RoomRegistry::new();
        let (a, mut rx_a) = rooms.connect(None).await;
        let (b, mut rx_b) = rooms.connect(None).await;
        rooms.join(a, "S1").await.unwrap();
        rooms.join(b, "S1").await.unwrap();

        let sent = payload("S1", "off by one here", 7);
        let annotation = broadcaster(&rooms).send(a, sent.clone()).await.unwrap();
        assert_eq!(annotation.line_number, 7);

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(events.len(), 2);
            assert_eq!(events[0], ServerEvent::NewComment(sent.clone()));
            let ServerEvent::NewNotification(n) = &events[1] else {
                panic!("expected notification, got {:?}", events[1]);
            };
            assert!(n.message.contains("line 7"));
            assert!(n.message.contains("Binary search"));
        }
    }

    #[tokio::test]
    async fn comment_to_room_without_members_goes_nowhere() {
        let rooms = RoomRegistry::new();
        let (a, mut rx_a) = rooms.connect(None).await;

        let result = broadcaster(&rooms).send(a, payload("S2", "hello", 1)).await;
        assert!(result.is_ok());
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_dropped() {
        let rooms = RoomRegistry::new();
        let (a, mut rx_a) = rooms.connect(None).await;
        rooms.join(a, "S1").await.unwrap();

        let err = broadcaster(&rooms).send(a, payload("S1", "   \n", 1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn lineless_comment_notifies_without_line() {
        let rooms = RoomRegistry::new();
        let (a, mut rx_a) = rooms.connect(None).await;
        rooms.join(a, "S1").await.unwrap();

        let mut sent = payload("S1", "overall fine", 0);
        sent.line = None;
        let annotation = broadcaster(&rooms).send(a, sent).await.unwrap();
        assert_eq!(annotation.line_number, 0);

        let events = drain(&mut rx_a);
        let ServerEvent::NewNotification(n) = &events[1] else {
            panic!("expected notification, got {:?}", events[1]);
        };
        assert_eq!(n.message, "New comment for your snippet: Binary search");
    }

    #[test]
    fn whole_snippet_and_bad_lines() {
        let mut p = payload("S1", "general remark", 0);
        p.line = None;
        assert_eq!(validate(&p).unwrap().line_number, 0);

        assert!(validate(&payload("S1", "x", -1)).is_err());
        assert!(validate(&payload("  ", "x", 1)).is_err());
    }
}
