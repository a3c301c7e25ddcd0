//! Line-level code synchronisation.
//!
//! An edit is relayed to the rest of the room first, then handed to the
//! snippet's writer task, which persists it and appends the history record.
//! Broadcast and hand-off happen under one lock, so each snippet's writer sees
//! edits in the order they were relayed. Nothing that happens in the writer
//! can hold back or undo the relay.
//!
//! A writer exits as soon as its queue runs dry; the next edit to that snippet
//! starts a fresh one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use syntra_db::LineReplace;
use syntra_types::events::{CODE_CHANGED_LABEL, CodeChangePayload, HistoryUpdate, ServerEvent};
use syntra_types::models::{ChangeHistoryRecord, CodeChangeEvent};

use crate::error::GatewayError;
use crate::history::HistoryLog;
use crate::rooms::{RoomRegistry, SessionId};
use crate::store::SnippetStore;

/// Check a `code-change` payload and turn it into an event.
pub fn validate(payload: &CodeChangePayload) -> Result<CodeChangeEvent, GatewayError> {
    let snippet_id = payload
        .snippet_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| GatewayError::Validation("code-change without snippetId".into()))?;

    let line = payload
        .line_number
        .ok_or_else(|| GatewayError::Validation("code-change without lineNumber".into()))?;
    let line_number = u32::try_from(line)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| GatewayError::Validation(format!("lineNumber {} is not a positive line", line)))?;

    let line_text = payload.line_code.clone().unwrap_or_default();
    if line_text.contains(['\n', '\r']) {
        return Err(GatewayError::Validation(format!(
            "lineCode for line {} spans several lines",
            line_number
        )));
    }

    Ok(CodeChangeEvent {
        snippet_id: snippet_id.to_string(),
        line_number,
        line_text,
        author_id: payload.author.clone().unwrap_or_else(|| "anonymous".into()),
        timestamp: Utc::now(),
    })
}

enum WriteJob {
    Apply(CodeChangeEvent),
    Flush(oneshot::Sender<()>),
}

struct SnippetWriter {
    generation: u64,
    tx: mpsc::UnboundedSender<WriteJob>,
    task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct LineSync {
    inner: Arc<LineSyncInner>,
}

struct LineSyncInner {
    rooms: RoomRegistry,
    snippets: Arc<dyn SnippetStore>,
    history: HistoryLog,
    /// snippet_id -> writer. Also serialises relay + enqueue per process.
    writers: Mutex<HashMap<String, SnippetWriter>>,
    next_generation: AtomicU64,
    closed: AtomicBool,
}

impl LineSync {
    pub fn new(rooms: RoomRegistry, snippets: Arc<dyn SnippetStore>, history: HistoryLog) -> Self {
        Self {
            inner: Arc::new(LineSyncInner {
                rooms,
                snippets,
                history,
                writers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Relay an edit to the sender's room-mates and queue it for persistence.
    /// Returns once the edit is relayed; persistence completes later.
    pub async fn apply(
        &self,
        sender: SessionId,
        payload: CodeChangePayload,
    ) -> Result<CodeChangeEvent, GatewayError> {
        let event = validate(&payload)?;

        let mut writers = self.inner.writers.lock().await;
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(GatewayError::ShuttingDown);
        }

        let delivered = self
            .inner
            .rooms
            .broadcast(&event.snippet_id, ServerEvent::CodeChange(payload), Some(sender))
            .await;
        debug!(
            "line {} of {} relayed to {} sessions",
            event.line_number, event.snippet_id, delivered
        );

        let writer = writers
            .entry(event.snippet_id.clone())
            .or_insert_with(|| spawn_writer(&self.inner, &event.snippet_id));
        if writer.tx.send(WriteJob::Apply(event.clone())).is_err() {
            warn!("writer for {} is gone; edit to line {} not persisted", event.snippet_id, event.line_number);
        }

        Ok(event)
    }

    /// Wait until every edit queued so far for `snippet_id` has been persisted
    /// (or has failed to be).
    pub async fn flush(&self, snippet_id: &str) {
        let (done_tx, done_rx) = oneshot::channel();
        {
            let writers = self.inner.writers.lock().await;
            let Some(writer) = writers.get(snippet_id) else {
                return;
            };
            if writer.tx.send(WriteJob::Flush(done_tx)).is_err() {
                return;
            }
        }
        let _ = done_rx.await;
    }

    /// Number of snippets with a live writer task.
    pub async fn writer_count(&self) -> usize {
        self.inner.writers.lock().await.len()
    }

    /// Stop accepting writes and wait for every queued edit to settle.
    /// Later edits fail with [`GatewayError::ShuttingDown`] before any relay.
    pub async fn shutdown(&self) {
        let writers: Vec<(String, SnippetWriter)> = {
            let mut writers = self.inner.writers.lock().await;
            self.inner.closed.store(true, Ordering::Release);
            writers.drain().collect()
        };
        let count = writers.len();

        for (snippet_id, writer) in writers {
            drop(writer.tx);
            if let Err(e) = writer.task.await {
                warn!("writer for {} ended abnormally: {}", snippet_id, e);
            }
        }
        info!("Line sync stopped ({} snippet writers drained)", count);
    }
}

fn spawn_writer(inner: &Arc<LineSyncInner>, snippet_id: &str) -> SnippetWriter {
    let (tx, rx) = mpsc::unbounded_channel();
    let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed);
    let task = tokio::spawn(run_writer(inner.clone(), snippet_id.to_string(), generation, rx));
    debug!("writer started for snippet {}", snippet_id);
    SnippetWriter { generation, tx, task }
}

async fn run_writer(
    inner: Arc<LineSyncInner>,
    snippet_id: String,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Apply(event) => persist(&inner.rooms, &inner.snippets, &inner.history, event).await,
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }

        if rx.is_empty() {
            // Jobs are only enqueued under this lock, so an empty queue here
            // stays empty once the entry is gone.
            let mut writers = inner.writers.lock().await;
            let ours = writers.get(&snippet_id).is_some_and(|w| w.generation == generation);
            if ours && rx.is_empty() {
                writers.remove(&snippet_id);
                debug!("writer for snippet {} idle, released", snippet_id);
                return;
            }
        }
    }
    debug!("writer for snippet {} stopped", snippet_id);
}

async fn persist(
    rooms: &RoomRegistry,
    snippets: &Arc<dyn SnippetStore>,
    history: &HistoryLog,
    event: CodeChangeEvent,
) {
    let store = snippets.clone();
    let job = event.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        store.replace_line(&job.snippet_id, job.line_number, &job.line_text)
    })
    .await;

    match outcome {
        Ok(Ok(LineReplace::Applied)) => {
            debug!("line {} of {} stored", event.line_number, event.snippet_id);
        }
        Ok(Ok(LineReplace::OutOfRange { line_count })) => {
            warn!(
                "line {} is past the end of {} ({} lines); document unchanged",
                event.line_number, event.snippet_id, line_count
            );
        }
        Ok(Ok(LineReplace::NotSingleLine)) => {
            warn!("multi-line text for line {} of {} refused", event.line_number, event.snippet_id);
        }
        Ok(Ok(LineReplace::SnippetMissing)) => {
            warn!("code change for unknown snippet {}", event.snippet_id);
        }
        Ok(Err(e)) => {
            warn!(
                "{}",
                GatewayError::Persistence(e.context(format!(
                    "storing line {} of {}",
                    event.line_number, event.snippet_id
                )))
            );
        }
        Err(e) => {
            warn!("persistence task for {} failed: {}", event.snippet_id, e);
        }
    }

    // Logged whatever happened above.
    let record = ChangeHistoryRecord::for_code_change(&event);
    let update = HistoryUpdate {
        user: record.actor.clone(),
        kind: CODE_CHANGED_LABEL.to_string(),
        detail: record.detail.clone(),
    };
    if history.append(record).await {
        rooms
            .broadcast(&event.snippet_id, ServerEvent::ChangeHistoryUpdate(update), None)
            .await;
    }
}
