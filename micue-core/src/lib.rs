pub mod chain;
pub mod cue;
pub mod error;
pub mod marker;
pub mod stage;

pub use chain::{ChainSummary, TaskCounts, verify_chain};
pub use cue::{CuePhase, TASK_POOL};
pub use error::{ChainError, MarkerError};
pub use marker::{MarkerEvent, MarkerSink, NONE_LABEL};
pub use stage::{SessionStage, Stage};
