use std::sync::Arc;

use syntra_db::Database;
use syntra_gateway::history::HistoryLog;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    /// Same log the realtime gateway appends to.
    pub history: HistoryLog,
    pub jwt_secret: String,
}
