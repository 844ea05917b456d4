use micue_core::{CuePhase, TASK_POOL};
use rand::Rng;

/// Draws the next task cue: uniform, independent per call, with replacement.
///
/// Runs of the same task are expected and deliberately not balanced away.
pub struct TaskSelector<R: Rng> {
    pool: Vec<CuePhase>,
    rng: R,
}

impl<R: Rng> TaskSelector<R> {
    /// Non-task entries are dropped; an empty pool falls back to the standard one.
    pub fn new(pool: &[CuePhase], rng: R) -> Self {
        let mut pool: Vec<CuePhase> = pool.iter().copied().filter(CuePhase::is_task).collect();
        if pool.is_empty() {
            pool = TASK_POOL.to_vec();
        }
        Self { pool, rng }
    }

    pub fn standard(rng: R) -> Self {
        Self::new(&TASK_POOL, rng)
    }

    pub fn pick_task(&mut self) -> CuePhase {
        self.pool[self.rng.random_range(0..self.pool.len())]
    }

    pub fn pool(&self) -> &[CuePhase] {
        &self.pool
    }
}
