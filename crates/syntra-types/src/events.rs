use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::NotificationEvent;

/// Label carried in `change-history-update` events.
pub const CODE_CHANGED_LABEL: &str = "Code Changed";

/// Payload of a `code-change` event as the client sent it.
///
/// Fields are optional so that a missing value is reported as a validation
/// failure rather than a parse failure. Unknown fields are kept in `extra`
/// and re-emitted untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `send-comment` event, re-emitted unchanged as `new-comment`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryUpdate {
    pub user: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
}

/// Commands sent FROM client TO server over the realtime socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Enter the room for a snippet. No reply.
    JoinRoom(String),

    SendComment(CommentPayload),

    CodeChange(CodeChangePayload),
}

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewComment(CommentPayload),

    NewNotification(NotificationEvent),

    /// Relayed to every room member except the editor.
    CodeChange(CodeChangePayload),

    /// Sent to the whole room once the history append succeeded.
    ChangeHistoryUpdate(HistoryUpdate),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewComment(_) => "new-comment",
            Self::NewNotification(_) => "new-notification",
            Self::CodeChange(_) => "code-change",
            Self::ChangeHistoryUpdate(_) => "change-history-update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_change_command_keeps_unknown_fields() {
        let raw = json!({
            "event": "code-change",
            "data": {
                "lineNumber": 2,
                "lineCode": "return 1;",
                "snippetId": "S1",
                "author": "alice",
                "cursor": { "col": 4 }
            }
        });

        let cmd: ClientCommand = serde_json::from_value(raw.clone()).unwrap();
        let ClientCommand::CodeChange(payload) = cmd else {
            panic!("expected code-change");
        };
        assert_eq!(payload.line_number, Some(2));
        assert_eq!(payload.extra["cursor"], json!({ "col": 4 }));

        let relayed = serde_json::to_value(ServerEvent::CodeChange(payload)).unwrap();
        assert_eq!(relayed, raw);
    }

    #[test]
    fn non_numeric_line_number_is_rejected() {
        let raw = r#"{"event":"code-change","data":{"lineNumber":"two","snippetId":"S1"}}"#;
        assert!(serde_json::from_str::<ClientCommand>(raw).is_err());
    }

    #[test]
    fn join_room_carries_bare_key() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"event":"join-room","data":"S1"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::JoinRoom("S1".into()));
    }

    #[test]
    fn history_update_uses_type_field() {
        let event = ServerEvent::ChangeHistoryUpdate(HistoryUpdate {
            user: "alice".into(),
            kind: CODE_CHANGED_LABEL.into(),
            detail: "Code changed on line 2: x".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "change-history-update");
        assert_eq!(json["data"]["type"], "Code Changed");
    }
}
