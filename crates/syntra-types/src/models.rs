use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnippetStatus {
    #[serde(rename = "Pending Review")]
    PendingReview,
    #[serde(rename = "Reviewed")]
    Reviewed,
}

impl SnippetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "Pending Review",
            Self::Reviewed => "Reviewed",
        }
    }
}

impl FromStr for SnippetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Review" => Ok(Self::PendingReview),
            "Reviewed" => Ok(Self::Reviewed),
            other => Err(format!("unknown snippet status: {}", other)),
        }
    }
}

/// A shared code snippet. `code` is the authoritative text; its lines are
/// the `\n`-separated segments, numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub language: String,
    pub code: String,
    pub author_id: String,
    pub status: SnippetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snippet {
    pub fn line_count(&self) -> usize {
        self.code.split('\n').count()
    }
}

/// A validated single-line replacement received over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChangeEvent {
    pub snippet_id: String,
    /// 1-based; always >= 1 once validated.
    pub line_number: u32,
    pub line_text: String,
    pub author_id: String,
    pub timestamp: DateTime<Utc>,
}

impl CodeChangeEvent {
    /// Human-readable description stored in the change history.
    pub fn detail(&self) -> String {
        format!("Code changed on line {}: {}", self.line_number, self.line_text)
    }
}

/// A comment anchored to a line, or to the whole snippet when `line_number` is 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: Uuid,
    pub snippet_id: String,
    pub line_number: u32,
    pub text: String,
    pub author_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryKind {
    Comment,
    CodeChange,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::CodeChange => "code-change",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(Self::Comment),
            "code-change" => Ok(Self::CodeChange),
            other => Err(format!("unknown history kind: {}", other)),
        }
    }
}

/// Immutable change-log entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHistoryRecord {
    pub id: Uuid,
    pub snippet_id: String,
    #[serde(rename = "user")]
    pub actor: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeHistoryRecord {
    pub fn for_code_change(event: &CodeChangeEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            snippet_id: event.snippet_id.clone(),
            actor: event.author_id.clone(),
            kind: HistoryKind::CodeChange,
            detail: event.detail(),
            timestamp: event.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Comment,
}

/// Transient alert derived from an annotation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_follows_newline_split() {
        let now = Utc::now();
        let snippet = Snippet {
            id: "s1".into(),
            title: "t".into(),
            description: None,
            language: "rust".into(),
            code: "fn main() {\n}\n".into(),
            author_id: "a".into(),
            status: SnippetStatus::PendingReview,
            created_at: now,
            updated_at: now,
        };
        // Trailing newline yields an empty final line.
        assert_eq!(snippet.line_count(), 3);
    }

    #[test]
    fn history_record_serializes_with_wire_names() {
        let event = CodeChangeEvent {
            snippet_id: "s1".into(),
            line_number: 2,
            line_text: "return 1;".into(),
            author_id: "alice".into(),
            timestamp: Utc::now(),
        };
        let record = ChangeHistoryRecord::for_code_change(&event);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["user"], "alice");
        assert_eq!(json["type"], "code-change");
        assert_eq!(json["detail"], "Code changed on line 2: return 1;");
        assert_eq!(json["snippetId"], "s1");
    }

    #[test]
    fn status_parses_display_names() {
        assert_eq!("Reviewed".parse::<SnippetStatus>(), Ok(SnippetStatus::Reviewed));
        assert!("reviewed".parse::<SnippetStatus>().is_err());
    }
}
