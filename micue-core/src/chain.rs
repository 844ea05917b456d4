//! Checks that a marker sequence describes exactly one well-formed session.

use serde::Serialize;

use crate::cue::CuePhase;
use crate::error::ChainError;
use crate::marker::MarkerEvent;

/// How often each task was presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub left: u32,
    pub right: u32,
    pub rest: u32,
}

impl TaskCounts {
    pub fn record(&mut self, phase: CuePhase) {
        match phase {
            CuePhase::Left => self.left += 1,
            CuePhase::Right => self.right += 1,
            CuePhase::Rest => self.rest += 1,
            CuePhase::Blink => {}
        }
    }

    pub fn get(&self, phase: CuePhase) -> u32 {
        match phase {
            CuePhase::Left => self.left,
            CuePhase::Right => self.right,
            CuePhase::Rest => self.rest,
            CuePhase::Blink => 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.left + self.right + self.rest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainSummary {
    pub markers: usize,
    /// Completed task dwells, including the one closed by the final marker.
    pub rounds: u32,
    pub tasks: TaskCounts,
}

impl ChainSummary {
    pub fn check_rounds(&self, expected: u32) -> Result<(), ChainError> {
        if self.rounds == expected {
            Ok(())
        } else {
            Err(ChainError::RoundCount {
                expected,
                found: self.rounds,
            })
        }
    }
}

/// Verifies opening, continuity, BLINK/task alternation and termination.
pub fn verify_chain(events: &[MarkerEvent]) -> Result<ChainSummary, ChainError> {
    let first = events.first().ok_or(ChainError::Empty)?;
    if *first != MarkerEvent::session_start() {
        return Err(ChainError::BadOpening(*first));
    }

    let mut rounds = 0;
    let mut tasks = TaskCounts::default();

    for (index, pair) in events.windows(2).enumerate() {
        let (prev, marker) = (pair[0], pair[1]);
        let index = index + 1;

        if prev.is_session_end() {
            return Err(ChainError::AfterEnd { index });
        }
        if marker.stop != prev.start {
            return Err(ChainError::Broken {
                index,
                expected: prev.start,
                found: marker.stop,
            });
        }

        // stop is Some here: prev.start was Some
        let stop = marker.stop.unwrap_or(CuePhase::Blink);
        let alternates = match marker.start {
            Some(start) => stop.is_task() != start.is_task(),
            None => stop.is_task(),
        };
        if !alternates {
            return Err(ChainError::NotAlternating { index, marker });
        }

        if stop.is_task() {
            rounds += 1;
        } else if let Some(task) = marker.start {
            tasks.record(task);
        }
    }

    let last = events[events.len() - 1];
    if !last.is_session_end() {
        return Err(ChainError::Unterminated(last));
    }

    Ok(ChainSummary {
        markers: events.len(),
        rounds,
        tasks,
    })
}
