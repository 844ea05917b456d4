use micue_bridge::{Bridge, MarkerEmitter};
use micue_core::{CuePhase, TaskCounts};
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::config::SessionConfig;
use crate::scheduler::{SchedulerState, Transition, TrialScheduler};
use crate::subject::SubjectId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub subject: String,
    pub rounds: u32,
    pub tasks: TaskCounts,
    pub markers: usize,
    pub duration_ms: u64,
    pub max_lateness_ms: u64,
    pub bridge_connected: bool,
}

/// One recording run, from readiness confirmation to the terminal marker.
///
/// Owns the scheduler and the emitter; all mutation goes through `tick` on
/// the thread that owns the session.
pub struct Session<R: Rng> {
    subject: SubjectId,
    scheduler: TrialScheduler<R>,
    emitter: MarkerEmitter,
    started_at_ms: u64,
    ended_at_ms: Option<u64>,
    max_lateness_ms: u64,
    tasks: TaskCounts,
}

impl<R: Rng> Session<R> {
    /// Starts acquisition, then enters BLINK and emits the opening marker.
    pub fn start(subject_raw: &str, config: SessionConfig, mut bridge: Bridge, rng: R, now_ms: u64) -> Self {
        let subject = SubjectId::from_form(subject_raw);
        info!(
            subject = %subject,
            rounds = config.max_rounds,
            blink_ms = config.blink_duration_ms,
            task_ms = config.task_duration_ms,
            bridge = ?bridge,
            "session starting"
        );
        bridge.start_streams(subject.as_str());

        let mut emitter = MarkerEmitter::new(bridge);
        let scheduler = TrialScheduler::start(config, rng, now_ms, &mut emitter);

        Self {
            subject,
            scheduler,
            emitter,
            started_at_ms: now_ms,
            ended_at_ms: None,
            max_lateness_ms: 0,
            tasks: TaskCounts::default(),
        }
    }

    /// One scheduling step. On the terminal transition the bridge is told to
    /// stop before this returns; the caller then shows the closing screen.
    pub fn tick(&mut self, now_ms: u64) -> Option<Transition> {
        let transition = self.scheduler.tick(now_ms, &mut self.emitter)?;

        self.max_lateness_ms = self.max_lateness_ms.max(transition.lateness_ms);
        if let Some(task) = transition.marker.start.filter(CuePhase::is_task) {
            self.tasks.record(task);
        }
        if transition.is_terminal() {
            self.finish(now_ms);
        }
        Some(transition)
    }

    fn finish(&mut self, now_ms: u64) {
        self.emitter.bridge_mut().stop_streams();
        self.ended_at_ms = Some(now_ms);
        let summary = self.summary();
        info!(
            subject = %summary.subject,
            rounds = summary.rounds,
            left = summary.tasks.left,
            right = summary.tasks.right,
            rest = summary.tasks.rest,
            markers = summary.markers,
            duration_ms = summary.duration_ms,
            max_lateness_ms = summary.max_lateness_ms,
            "session finished"
        );
    }

    pub fn summary(&self) -> SessionSummary {
        let end = self.ended_at_ms.unwrap_or(self.started_at_ms);
        SessionSummary {
            subject: self.subject.to_string(),
            rounds: self.scheduler.completed_rounds(),
            tasks: self.tasks,
            markers: self.emitter.sent(),
            duration_ms: end.saturating_sub(self.started_at_ms),
            max_lateness_ms: self.max_lateness_ms,
            bridge_connected: self.emitter.bridge().is_connected(),
        }
    }

    pub fn progress(&self, now_ms: u64) -> f64 {
        self.scheduler.progress(now_ms)
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn current_phase(&self) -> CuePhase {
        self.scheduler.current_phase()
    }

    pub fn completed_rounds(&self) -> u32 {
        self.scheduler.completed_rounds()
    }

    pub fn max_rounds(&self) -> u32 {
        self.scheduler.config().max_rounds
    }

    pub fn is_active(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Clock reading at which the opening marker was emitted.
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Hands the bridge back, e.g. to join a worker thread explicitly.
    pub fn into_bridge(self) -> Bridge {
        self.emitter.into_bridge()
    }
}
