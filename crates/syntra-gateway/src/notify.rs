use tracing::debug;

use syntra_types::events::{CommentPayload, ServerEvent};
use syntra_types::models::{NotificationEvent, NotificationKind};

use crate::rooms::RoomRegistry;

/// Build the alert shown for a new comment. Line and title are copied from
/// the comment as sent; a comment without a line names no line.
pub fn derive(comment: &CommentPayload) -> NotificationEvent {
    let title = comment.snippet_title.as_deref().unwrap_or_default();
    let message = match comment.line {
        Some(line) => format!("New comment on line {} for your snippet: {}", line, title),
        None => format!("New comment for your snippet: {}", title),
    };
    NotificationEvent {
        kind: NotificationKind::Comment,
        message,
    }
}

/// Delivers notifications to a whole room, author included.
#[derive(Clone)]
pub struct Notifier {
    rooms: RoomRegistry,
}

impl Notifier {
    pub fn new(rooms: RoomRegistry) -> Self {
        Self { rooms }
    }

    pub async fn dispatch(&self, snippet_id: &str, notification: NotificationEvent) -> usize {
        let delivered = self
            .rooms
            .broadcast(snippet_id, ServerEvent::NewNotification(notification), None)
            .await;
        debug!("notification for {} delivered to {} sessions", snippet_id, delivered);
        delivered
    }
}
