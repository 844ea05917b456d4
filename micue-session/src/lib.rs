pub mod config;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod simulate;
pub mod subject;

pub use config::{
    BLINK_DURATION_MS, ConfigError, MAX_ROUNDS, RELAXATION_DURATION_MS, SessionConfig, TASK_DURATION_MS,
};
pub use scheduler::{SchedulerState, Transition, TrialScheduler};
pub use selector::TaskSelector;
pub use session::{Session, SessionSummary};
pub use simulate::{SimulationReport, run_headless};
pub use subject::{FormError, SubjectId, UNKNOWN_SUBJECT, validate_form};
