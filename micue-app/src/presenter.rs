use micue_bridge::Bridge;
use micue_core::{SessionStage, Stage};
use micue_render::{Scene, breath_level};
use micue_session::{Session, SessionConfig, validate_form};
use rand::rngs::StdRng;
use tracing::{info, warn};

const MAX_SUBJECT_LEN: usize = 32;

/// Keyboard input after platform key mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Backspace,
    Enter,
    Space,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Walks the screens around a session and owns the session once it starts.
pub struct Presenter {
    stage: SessionStage,
    config: SessionConfig,
    subject: String,
    form_error: Option<String>,
    stage_started_ms: u64,
    bridge: Option<Bridge>,
    session: Option<Session<StdRng>>,
    rounds_done: u32,
}

impl Presenter {
    pub fn new(config: SessionConfig, bridge: Bridge, subject: Option<String>) -> Self {
        Self {
            stage: SessionStage::default(),
            config,
            subject: subject.unwrap_or_default(),
            form_error: None,
            stage_started_ms: 0,
            bridge: Some(bridge),
            session: None,
            rounds_done: 0,
        }
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    fn advance(&mut self, now_ms: u64) {
        if let Some(next) = self.stage.next() {
            info!(from = ?self.stage, to = ?next, "stage change");
            self.stage = next;
            self.stage_started_ms = now_ms;
        }
    }

    pub fn handle(&mut self, input: Input, now_ms: u64) -> Flow {
        if input == Input::Escape {
            return Flow::Exit;
        }

        match self.stage {
            s if s.accepts_text() => self.handle_form(input, now_ms),
            s if s.is_relaxation() => {
                if input == Input::Space {
                    info!("relaxation skipped");
                    self.advance(now_ms);
                }
            }
            s if s.is_ready() => {
                if input == Input::Space {
                    self.start_session(now_ms);
                }
            }
            s if s.is_closing() => {
                if input == Input::Space {
                    return Flow::Exit;
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_form(&mut self, input: Input, now_ms: u64) {
        match input {
            Input::Text(text) => {
                for ch in text.chars().filter(|c| !c.is_control()) {
                    if self.subject.chars().count() < MAX_SUBJECT_LEN {
                        self.subject.push(ch);
                    }
                }
                self.form_error = None;
            }
            Input::Space => {
                if self.subject.chars().count() < MAX_SUBJECT_LEN {
                    self.subject.push(' ');
                }
            }
            Input::Backspace => {
                self.subject.pop();
                self.form_error = None;
            }
            Input::Enter => match validate_form(&self.subject) {
                Ok(id) => {
                    info!(subject = %id, "subject accepted");
                    self.form_error = None;
                    self.advance(now_ms);
                }
                Err(e) => self.form_error = Some(e.to_string()),
            },
            Input::Escape => {}
        }
    }

    fn start_session(&mut self, now_ms: u64) {
        let bridge = self.bridge.take().unwrap_or(Bridge::Disconnected);
        let rng = self.config.rng();
        self.session = Some(Session::start(
            &self.subject,
            self.config.clone(),
            bridge,
            rng,
            now_ms,
        ));
        self.advance(now_ms);
    }

    /// Time-driven progress: relaxation timeout and session ticks.
    pub fn update(&mut self, now_ms: u64) {
        if self.stage.is_relaxation() {
            let elapsed = now_ms.saturating_sub(self.stage_started_ms);
            if elapsed >= self.config.relaxation_duration_ms {
                self.advance(now_ms);
            }
        } else if self.stage.is_trials() {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if let Some(transition) = session.tick(now_ms) {
                if transition.is_terminal() {
                    self.rounds_done = transition.completed_rounds;
                    self.advance(now_ms);
                }
            }
        }
    }

    pub fn scene(&self, now_ms: u64) -> Scene<'_> {
        match self.stage {
            SessionStage::Welcome => Scene::Welcome {
                subject: &self.subject,
                error: self.form_error.as_deref(),
            },
            SessionStage::Relaxation => {
                let elapsed = now_ms.saturating_sub(self.stage_started_ms);
                let remaining_ms = self.config.relaxation_duration_ms.saturating_sub(elapsed);
                Scene::Relaxation {
                    breath: breath_level(elapsed),
                    remaining_s: remaining_ms.div_ceil(1000),
                }
            }
            SessionStage::Ready => Scene::Ready {
                subject: self.subject.trim(),
            },
            SessionStage::Trials => match &self.session {
                Some(session) => Scene::Cue {
                    phase: session.current_phase(),
                    progress: session.progress(now_ms) as f32,
                    completed_rounds: session.completed_rounds(),
                    max_rounds: session.max_rounds(),
                },
                None => Scene::Closing {
                    rounds: self.rounds_done,
                },
            },
            SessionStage::Closing => Scene::Closing {
                rounds: self.rounds_done,
            },
        }
    }

    /// Releases the bridge. An unfinished session is stopped without a
    /// terminal marker, so its recording will not verify as complete.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            if session.is_active() {
                warn!(
                    rounds = session.completed_rounds(),
                    max_rounds = session.max_rounds(),
                    "session aborted before completion"
                );
                let mut bridge = session.into_bridge();
                bridge.stop_streams();
            }
        }
        self.bridge = None;
    }
}
