use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use syntra_types::models::{Annotation, ChangeHistoryRecord, Snippet, SnippetStatus};

use crate::Database;
use crate::models::{CommentRow, HistoryRow, LineReplace, SnippetRow, format_timestamp};

/// Fields supplied when a snippet is created by the metadata service.
pub struct NewSnippet<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub language: &'a str,
    pub code: &'a str,
    pub author_id: &'a str,
}

impl Database {
    // -- Snippets --

    pub fn create_snippet(&self, new: &NewSnippet<'_>) -> Result<Snippet> {
        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(&Utc::now());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO snippets (id, title, description, language, code, author_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id,
                    new.title,
                    new.description,
                    new.language,
                    new.code,
                    new.author_id,
                    SnippetStatus::PendingReview.as_str(),
                    now
                ],
            )?;
            query_snippet(conn, &id)?.ok_or_else(|| anyhow::anyhow!("Snippet vanished after insert: {}", id))
        })
    }

    pub fn get_snippet(&self, id: &str) -> Result<Option<Snippet>> {
        self.with_conn(|conn| query_snippet(conn, id))
    }

    /// Replace line `line_number` (1-based) of the stored code. Never adds or
    /// removes lines.
    pub fn replace_line(&self, snippet_id: &str, line_number: u32, text: &str) -> Result<LineReplace> {
        if text.contains(['\n', '\r']) {
            return Ok(LineReplace::NotSingleLine);
        }
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let code: Option<String> = tx
                .query_row("SELECT code FROM snippets WHERE id = ?1", [snippet_id], |row| row.get(0))
                .optional()?;

            let Some(code) = code else {
                return Ok(LineReplace::SnippetMissing);
            };

            let mut lines: Vec<&str> = code.split('\n').collect();
            let index = line_number as usize;
            if index == 0 || index > lines.len() {
                return Ok(LineReplace::OutOfRange { line_count: lines.len() });
            }
            lines[index - 1] = text;

            tx.execute(
                "UPDATE snippets SET code = ?1, updated_at = ?2 WHERE id = ?3",
                params![lines.join("\n"), format_timestamp(&Utc::now()), snippet_id],
            )?;
            tx.commit()?;

            Ok(LineReplace::Applied)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, annotation: &Annotation) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, snippet_id, line, text, author_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    annotation.id.to_string(),
                    annotation.snippet_id,
                    annotation.line_number,
                    annotation.text,
                    annotation.author_id,
                    format_timestamp(&annotation.timestamp)
                ],
            )?;
            Ok(())
        })
    }

    /// Comments for a snippet, newest first.
    pub fn get_comments(&self, snippet_id: &str) -> Result<Vec<Annotation>> {
        self.with_conn(|conn| query_comments(conn, snippet_id))
    }

    pub fn count_comments(&self, snippet_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE snippet_id = ?1",
                [snippet_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    // -- Change history --

    pub fn insert_history(&self, record: &ChangeHistoryRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO change_history (id, snippet_id, actor, kind, detail, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id.to_string(),
                    record.snippet_id,
                    record.actor,
                    record.kind.as_str(),
                    record.detail,
                    format_timestamp(&record.timestamp)
                ],
            )?;
            Ok(())
        })
    }

    /// History for a snippet, newest first. Equal timestamps fall back to
    /// insertion order, latest first.
    pub fn get_history(&self, snippet_id: &str) -> Result<Vec<ChangeHistoryRecord>> {
        self.with_conn(|conn| query_history(conn, snippet_id))
    }
}

fn query_snippet(conn: &Connection, id: &str) -> Result<Option<Snippet>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, language, code, author_id, status, created_at, updated_at
         FROM snippets WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(SnippetRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                language: row.get(3)?,
                code: row.get(4)?,
                author_id: row.get(5)?,
                status: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
            })
        })
        .optional()?;

    row.map(Snippet::try_from).transpose()
}

fn query_comments(conn: &Connection, snippet_id: &str) -> Result<Vec<Annotation>> {
    let mut stmt = conn.prepare(
        "SELECT id, snippet_id, line, text, author_id, created_at
         FROM comments
         WHERE snippet_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt
        .query_map([snippet_id], |row| {
            Ok(CommentRow {
                id: row.get(0)?,
                snippet_id: row.get(1)?,
                line: row.get(2)?,
                text: row.get(3)?,
                author_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Annotation::try_from).collect()
}

fn query_history(conn: &Connection, snippet_id: &str) -> Result<Vec<ChangeHistoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, snippet_id, actor, kind, detail, created_at
         FROM change_history
         WHERE snippet_id = ?1
         ORDER BY created_at DESC, seq DESC",
    )?;

    let rows = stmt
        .query_map([snippet_id], |row| {
            Ok(HistoryRow {
                id: row.get(0)?,
                snippet_id: row.get(1)?,
                actor: row.get(2)?,
                kind: row.get(3)?,
                detail: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(ChangeHistoryRecord::try_from).collect()
}
