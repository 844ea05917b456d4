use thiserror::Error;

use crate::cue::CuePhase;
use crate::marker::MarkerEvent;

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("unknown phase label {0:?}")]
    UnknownPhase(String),

    #[error("failed to encode marker: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed marker: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Ways a recorded marker sequence can fail to describe one session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("marker sequence is empty")]
    Empty,

    #[error("session must open with {{None -> BLINK}}, found {0}")]
    BadOpening(MarkerEvent),

    #[error("marker {index} stops {found:?} but the previous marker started {expected:?}")]
    Broken {
        index: usize,
        expected: Option<CuePhase>,
        found: Option<CuePhase>,
    },

    #[error("marker {index} ({marker}) does not alternate between BLINK and a task")]
    NotAlternating { index: usize, marker: MarkerEvent },

    #[error("marker {index} follows the end of the session")]
    AfterEnd { index: usize },

    #[error("session never ended; last marker is {0}")]
    Unterminated(MarkerEvent),

    #[error("expected {expected} rounds, found {found}")]
    RoundCount { expected: u32, found: u32 },
}
