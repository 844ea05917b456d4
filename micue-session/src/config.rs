use std::fs;
use std::path::{Path, PathBuf};

use micue_core::{CuePhase, TASK_POOL};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use thiserror::Error;

/// Task rounds per session.
pub const MAX_ROUNDS: u32 = 5;
/// Dwell of the inter-trial blink interval.
pub const BLINK_DURATION_MS: u64 = 4000;
/// Dwell of a task cue. Kept apart from the blink dwell; the two may diverge.
pub const TASK_DURATION_MS: u64 = 4000;
pub const RELAXATION_DURATION_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("max_rounds must be at least 1")]
    NoRounds,

    #[error("task_pool must not be empty")]
    EmptyPool,

    #[error("task_pool may only hold task phases, found {0}")]
    BlinkInPool(CuePhase),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub max_rounds: u32,
    pub blink_duration_ms: u64,
    pub task_duration_ms: u64,
    pub task_pool: Vec<CuePhase>,
    pub relaxation_duration_ms: u64,
    /// Fixed seed for reproducible task draws; OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: MAX_ROUNDS,
            blink_duration_ms: BLINK_DURATION_MS,
            task_duration_ms: TASK_DURATION_MS,
            task_pool: TASK_POOL.to_vec(),
            relaxation_duration_ms: RELAXATION_DURATION_MS,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.task_pool.is_empty() {
            return Err(ConfigError::EmptyPool);
        }
        if let Some(phase) = self.task_pool.iter().find(|p| !p.is_task()) {
            return Err(ConfigError::BlinkInPool(*phase));
        }
        Ok(())
    }

    /// Nearest valid settings: at least one round, and a pool of task phases
    /// only, falling back to the standard pool when nothing is left.
    pub fn normalized(mut self) -> Self {
        self.max_rounds = self.max_rounds.max(1);
        self.task_pool.retain(|p| p.is_task());
        if self.task_pool.is_empty() {
            self.task_pool = TASK_POOL.to_vec();
        }
        self
    }

    /// Dwell of the given phase in milliseconds.
    pub fn duration_ms(&self, phase: CuePhase) -> u64 {
        if phase.is_task() {
            self.task_duration_ms
        } else {
            self.blink_duration_ms
        }
    }

    /// Task-draw generator: seeded when `seed` is set.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Nominal length of a full session: one blink before every task.
    pub fn session_length_ms(&self) -> u64 {
        self.max_rounds as u64 * (self.blink_duration_ms + self.task_duration_ms)
    }
}
