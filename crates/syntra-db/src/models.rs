// Database row types, mapping directly to SQLite rows.
// Conversion into the syntra-types models happens here so callers never see
// raw timestamp strings.
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use syntra_types::models::{Annotation, ChangeHistoryRecord, Snippet};

/// Outcome of a whole-line replacement against the stored code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineReplace {
    Applied,
    /// The target line is past the end; the document was left as is.
    OutOfRange { line_count: usize },
    /// The replacement text spans more than one line; nothing was written.
    NotSingleLine,
    SnippetMissing,
}

pub struct SnippetRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub language: String,
    pub code: String,
    pub author_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub snippet_id: String,
    pub line: i64,
    pub text: String,
    pub author_id: String,
    pub created_at: String,
}

pub struct HistoryRow {
    pub id: String,
    pub snippet_id: String,
    pub actor: String,
    pub kind: String,
    pub detail: String,
    pub created_at: String,
}

/// Fixed-width RFC 3339 so that lexical order in SQLite equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

impl TryFrom<SnippetRow> for Snippet {
    type Error = anyhow::Error;

    fn try_from(row: SnippetRow) -> Result<Self> {
        Ok(Snippet {
            status: row.status.parse().map_err(anyhow::Error::msg)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            title: row.title,
            description: row.description,
            language: row.language,
            code: row.code,
            author_id: row.author_id,
        })
    }
}

impl TryFrom<CommentRow> for Annotation {
    type Error = anyhow::Error;

    fn try_from(row: CommentRow) -> Result<Self> {
        Ok(Annotation {
            id: Uuid::parse_str(&row.id).with_context(|| format!("corrupt comment id '{}'", row.id))?,
            line_number: u32::try_from(row.line)
                .with_context(|| format!("corrupt line {} on comment '{}'", row.line, row.id))?,
            timestamp: parse_timestamp(&row.created_at)?,
            snippet_id: row.snippet_id,
            text: row.text,
            author_id: row.author_id,
        })
    }
}

impl TryFrom<HistoryRow> for ChangeHistoryRecord {
    type Error = anyhow::Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(ChangeHistoryRecord {
            id: Uuid::parse_str(&row.id).with_context(|| format!("corrupt history id '{}'", row.id))?,
            kind: row.kind.parse().map_err(anyhow::Error::msg)?,
            timestamp: parse_timestamp(&row.created_at)?,
            snippet_id: row.snippet_id,
            actor: row.actor,
            detail: row.detail,
        })
    }
}
