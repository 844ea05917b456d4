use micue_core::{CuePhase, MarkerEvent, MarkerSink};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::selector::TaskSelector;

/// One phase boundary, as decided by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub marker: MarkerEvent,
    pub at_ms: u64,
    /// How far past its nominal end the finished phase ran before a tick saw it.
    pub lateness_ms: u64,
    pub completed_rounds: u32,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        self.marker.is_session_end()
    }
}

/// Read-only view of the scheduler for renderers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    pub current: CuePhase,
    /// Bookkeeping only; transitions never consult it.
    pub previous: Option<CuePhase>,
    pub phase_start_ms: u64,
    pub completed_rounds: u32,
    pub active: bool,
}

/// Alternates BLINK with drawn tasks until `max_rounds` task dwells complete.
///
/// Every decided transition goes to the sink before the scheduler's own state
/// moves, so the sink observes markers in the order they happen.
pub struct TrialScheduler<R: Rng> {
    config: SessionConfig,
    selector: TaskSelector<R>,
    state: SchedulerState,
}

impl<R: Rng> TrialScheduler<R> {
    /// Enters BLINK at `now_ms` and emits `{None -> BLINK}`.
    ///
    /// A config that fails [`SessionConfig::validate`] is logged and replaced
    /// by [`SessionConfig::normalized`], so `completed_rounds` never exceeds
    /// `max_rounds`.
    pub fn start<S: MarkerSink>(config: SessionConfig, rng: R, now_ms: u64, sink: &mut S) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "invalid session config; using nearest valid settings");
        }
        let config = config.normalized();
        let selector = TaskSelector::new(&config.task_pool, rng);
        sink.emit(&MarkerEvent::session_start());
        debug!(now_ms, "scheduler started in BLINK");
        Self {
            config,
            selector,
            state: SchedulerState {
                current: CuePhase::Blink,
                previous: None,
                phase_start_ms: now_ms,
                completed_rounds: 0,
                active: true,
            },
        }
    }

    /// Advances at most one phase. A no-op before the dwell elapses and after
    /// the session has ended.
    pub fn tick<S: MarkerSink>(&mut self, now_ms: u64, sink: &mut S) -> Option<Transition> {
        if !self.state.active {
            return None;
        }

        let current = self.state.current;
        let dwell = self.config.duration_ms(current);
        let elapsed = self.elapsed_ms(now_ms);
        if elapsed < dwell {
            return None;
        }

        let marker = if current.is_task() {
            if self.state.completed_rounds + 1 >= self.config.max_rounds {
                MarkerEvent::session_end(current)
            } else {
                MarkerEvent::between(current, CuePhase::Blink)
            }
        } else {
            MarkerEvent::between(CuePhase::Blink, self.selector.pick_task())
        };

        sink.emit(&marker);

        if current.is_task() {
            self.state.completed_rounds += 1;
        }
        self.state.previous = Some(current);
        match marker.start {
            Some(next) => {
                self.state.current = next;
                self.state.phase_start_ms = now_ms;
            }
            None => self.state.active = false,
        }

        let lateness_ms = elapsed - dwell;
        if lateness_ms > 0 {
            debug!(%marker, lateness_ms, "transition observed late");
        }

        Some(Transition {
            marker,
            at_ms: now_ms,
            lateness_ms,
            completed_rounds: self.state.completed_rounds,
        })
    }

    /// Time spent in the current phase; a clock that ran backwards reads as 0.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state.phase_start_ms)
    }

    /// Fraction of the current dwell that has passed, in `[0, 1]`.
    pub fn progress(&self, now_ms: u64) -> f64 {
        if !self.state.active {
            return 1.0;
        }
        let dwell = self.config.duration_ms(self.state.current);
        if dwell == 0 {
            return 1.0;
        }
        (self.elapsed_ms(now_ms) as f64 / dwell as f64).min(1.0)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn current_phase(&self) -> CuePhase {
        self.state.current
    }

    pub fn completed_rounds(&self) -> u32 {
        self.state.completed_rounds
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micue_core::{TASK_POOL, verify_chain};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn start(sink: &mut Vec<MarkerEvent>) -> TrialScheduler<StdRng> {
        TrialScheduler::start(SessionConfig::default(), StdRng::seed_from_u64(1), 0, sink)
    }

    #[test]
    fn emits_opening_marker_immediately() {
        let mut sink = Vec::new();
        let scheduler = start(&mut sink);
        assert_eq!(sink, vec![MarkerEvent::session_start()]);
        assert_eq!(scheduler.current_phase(), CuePhase::Blink);
        assert_eq!(scheduler.completed_rounds(), 0);
        assert!(scheduler.is_active());
    }

    #[test]
    fn ticks_inside_dwell_change_nothing() {
        let mut sink = Vec::new();
        let mut scheduler = start(&mut sink);
        let before = scheduler.state();
        for now in [0, 1, 2000, 3999] {
            assert_eq!(scheduler.tick(now, &mut sink), None);
        }
        assert_eq!(scheduler.state(), before);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn literal_five_round_scenario() {
        let mut sink = Vec::new();
        let mut scheduler = start(&mut sink);
        let mut times = vec![0];
        for now in (4000..=40_000).step_by(4000) {
            let transition = scheduler.tick(now, &mut sink).expect("boundary");
            assert_eq!(transition.at_ms, now);
            assert_eq!(transition.lateness_ms, 0);
            times.push(now);
        }

        assert_eq!(sink.len(), 11);
        // one opening marker plus ten boundaries, the last at 10 x 4000
        assert_eq!(times.last(), Some(&40_000));
        assert!(scheduler.tick(44_000, &mut sink).is_none());
        assert_eq!(scheduler.completed_rounds(), 5);
        assert!(!scheduler.is_active());
        assert!(sink[sink.len() - 1].is_session_end());

        let summary = verify_chain(&sink).unwrap();
        assert_eq!(summary.rounds, 5);
        assert_eq!(summary.tasks.total(), 5);
    }

    #[test]
    fn blink_exit_never_ends_session() {
        let mut sink = Vec::new();
        let mut scheduler = start(&mut sink);
        let t = scheduler.tick(4000, &mut sink).unwrap();
        assert!(!t.is_terminal());
        assert_eq!(t.marker.stop, Some(CuePhase::Blink));
        assert!(t.marker.start.is_some_and(|p| p.is_task()));
        assert_eq!(scheduler.state().previous, Some(CuePhase::Blink));
        assert_eq!(t.completed_rounds, 0);
    }

    #[test]
    fn ticks_after_end_are_inert() {
        let mut sink = Vec::new();
        let mut scheduler = start(&mut sink);
        let mut now = 0;
        while scheduler.is_active() {
            now += 4000;
            scheduler.tick(now, &mut sink);
        }
        let frozen = scheduler.state();
        let markers = sink.len();
        for later in [now, now + 1, now + 4000, now + 100_000] {
            assert_eq!(scheduler.tick(later, &mut sink), None);
        }
        assert_eq!(scheduler.state(), frozen);
        assert_eq!(sink.len(), markers);
        assert_eq!(scheduler.progress(now + 5), 1.0);
    }

    #[test]
    fn backwards_clock_is_clamped() {
        let mut sink = Vec::new();
        let mut scheduler =
            TrialScheduler::start(SessionConfig::default(), StdRng::seed_from_u64(2), 10_000, &mut sink);
        assert_eq!(scheduler.elapsed_ms(9_000), 0);
        assert_eq!(scheduler.progress(9_000), 0.0);
        assert_eq!(scheduler.tick(9_000, &mut sink), None);
        assert_eq!(sink.len(), 1);
        assert!(scheduler.tick(14_000, &mut sink).is_some());
    }

    #[test]
    fn progress_is_monotone_and_clamped() {
        let mut sink = Vec::new();
        let scheduler = start(&mut sink);
        let mut last = 0.0;
        for now in (0..=8000).step_by(250) {
            let p = scheduler.progress(now);
            assert!((0.0..=1.0).contains(&p));
            assert!(p >= last);
            last = p;
        }
        assert_eq!(scheduler.progress(2000), 0.5);
        assert_eq!(scheduler.progress(8000), 1.0);
    }

    #[test]
    fn late_tick_restarts_phase_at_observation_time() {
        let mut sink = Vec::new();
        let mut scheduler = start(&mut sink);
        let t = scheduler.tick(4_250, &mut sink).unwrap();
        assert_eq!(t.lateness_ms, 250);
        assert_eq!(scheduler.state().phase_start_ms, 4_250);
        assert_eq!(scheduler.tick(8_000, &mut sink), None);
        assert!(scheduler.tick(8_250, &mut sink).is_some());
    }

    #[test]
    fn uses_separate_blink_and_task_dwells() {
        let config = SessionConfig {
            blink_duration_ms: 1000,
            task_duration_ms: 3000,
            max_rounds: 2,
            ..Default::default()
        };
        let mut sink = Vec::new();
        let mut scheduler = TrialScheduler::start(config, StdRng::seed_from_u64(9), 0, &mut sink);
        assert!(scheduler.tick(1000, &mut sink).is_some()); // BLINK -> task
        assert!(scheduler.tick(3999, &mut sink).is_none());
        assert!(scheduler.tick(4000, &mut sink).is_some()); // task -> BLINK
        assert!(scheduler.tick(5000, &mut sink).is_some()); // BLINK -> task
        let last = scheduler.tick(8000, &mut sink).unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.completed_rounds, 2);
        assert_eq!(sink.len(), 5);
    }

    #[test]
    fn single_round_session() {
        let config = SessionConfig {
            max_rounds: 1,
            ..Default::default()
        };
        let mut sink = Vec::new();
        let mut scheduler = TrialScheduler::start(config, StdRng::seed_from_u64(4), 0, &mut sink);
        scheduler.tick(4000, &mut sink);
        let end = scheduler.tick(8000, &mut sink).unwrap();
        assert!(end.is_terminal());
        assert_eq!(verify_chain(&sink).unwrap().rounds, 1);
    }

    #[test]
    fn unvalidated_config_is_normalized() {
        let config = SessionConfig {
            max_rounds: 0,
            task_pool: vec![CuePhase::Blink],
            ..Default::default()
        };
        let mut sink = Vec::new();
        let mut scheduler = TrialScheduler::start(config, StdRng::seed_from_u64(6), 0, &mut sink);
        assert_eq!(scheduler.config().max_rounds, 1);
        assert_eq!(scheduler.config().task_pool, TASK_POOL.to_vec());

        let to_task = scheduler.tick(4000, &mut sink).unwrap();
        assert!(to_task.marker.start.is_some_and(|p| p.is_task()));
        let end = scheduler.tick(8000, &mut sink).unwrap();
        assert!(end.is_terminal());
        assert_eq!(end.completed_rounds, scheduler.config().max_rounds);
        assert_eq!(verify_chain(&sink).unwrap().rounds, 1);
    }
}
