use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use tokio::sync::mpsc;

use syntra_db::LineReplace;
use syntra_types::events::ServerEvent;
use syntra_types::models::ChangeHistoryRecord;

use crate::store::{HistoryStore, SnippetStore};

/// In-memory stand-in for the durable store with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    snippets: Mutex<HashMap<String, Vec<String>>>,
    history: Mutex<Vec<ChangeHistoryRecord>>,
    pub fail_writes: AtomicBool,
    pub fail_history: AtomicBool,
}

impl MemoryStore {
    pub fn with_snippet(snippet_id: &str, code: &str) -> Self {
        let store = Self::default();
        store
            .snippets
            .lock()
            .unwrap()
            .insert(snippet_id.to_string(), code.split('\n').map(str::to_string).collect());
        store
    }

    pub fn code(&self, snippet_id: &str) -> Option<String> {
        self.snippets.lock().unwrap().get(snippet_id).map(|lines| lines.join("\n"))
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

impl SnippetStore for MemoryStore {
    fn replace_line(&self, snippet_id: &str, line_number: u32, text: &str) -> Result<LineReplace> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("snippet store unavailable");
        }
        if text.contains(['\n', '\r']) {
            return Ok(LineReplace::NotSingleLine);
        }
        let mut snippets = self.snippets.lock().unwrap();
        let Some(lines) = snippets.get_mut(snippet_id) else {
            return Ok(LineReplace::SnippetMissing);
        };
        let index = line_number as usize;
        if index == 0 || index > lines.len() {
            return Ok(LineReplace::OutOfRange { line_count: lines.len() });
        }
        lines[index - 1] = text.to_string();
        Ok(LineReplace::Applied)
    }
}

impl HistoryStore for MemoryStore {
    fn append(&self, record: &ChangeHistoryRecord) -> Result<()> {
        if self.fail_history.load(Ordering::SeqCst) {
            bail!("history store unavailable");
        }
        self.history.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn list(&self, snippet_id: &str) -> Result<Vec<ChangeHistoryRecord>> {
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .rev()
            .filter(|r| r.snippet_id == snippet_id)
            .cloned()
            .collect())
    }
}

/// Everything queued for a session so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
