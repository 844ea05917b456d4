use micue_core::MarkerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid marker payload: {0}")]
    Marker(#[from] MarkerError),

    #[error("failed to encode recorder line: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed recorder line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("no free recording file name for stream {0}")]
    NoFreeName(String),

    #[error("streams not started")]
    NotStarted,

    #[error("bridge worker has shut down")]
    WorkerGone,
}
