//! Durable-store seams used by the realtime path.
//!
//! Both traits are synchronous; callers run them on the blocking pool. Writes
//! for one snippet are issued by a single writer task, so implementations see
//! them in receipt order.

use anyhow::Result;

use syntra_db::{Database, LineReplace};
use syntra_types::models::ChangeHistoryRecord;

pub trait SnippetStore: Send + Sync {
    /// Replace one 1-based line of the stored code. Must not change the line count.
    fn replace_line(&self, snippet_id: &str, line_number: u32, text: &str) -> Result<LineReplace>;
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &ChangeHistoryRecord) -> Result<()>;

    /// All records for the snippet, newest first.
    fn list(&self, snippet_id: &str) -> Result<Vec<ChangeHistoryRecord>>;
}

impl SnippetStore for Database {
    fn replace_line(&self, snippet_id: &str, line_number: u32, text: &str) -> Result<LineReplace> {
        Database::replace_line(self, snippet_id, line_number, text)
    }
}

impl HistoryStore for Database {
    fn append(&self, record: &ChangeHistoryRecord) -> Result<()> {
        self.insert_history(record)
    }

    fn list(&self, snippet_id: &str) -> Result<Vec<ChangeHistoryRecord>> {
        self.get_history(snippet_id)
    }
}
