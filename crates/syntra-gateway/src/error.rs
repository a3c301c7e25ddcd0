use thiserror::Error;

use crate::rooms::SessionId;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The event was malformed and has been dropped without broadcasting.
    #[error("invalid event: {0}")]
    Validation(String),

    /// The durable store failed. Any broadcast has already gone out.
    #[error("persistence failed: {0:#}")]
    Persistence(#[from] anyhow::Error),

    #[error("line sync is shut down")]
    ShuttingDown,

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}
