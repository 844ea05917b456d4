use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::recorder::JsonlRecorder;
use crate::threaded::ThreadedBridge;

/// Operations the acquisition process exposes to the trial loop.
///
/// Implementations should return quickly; anything that can block belongs
/// behind [`crate::ThreadedBridge`].
pub trait AcquisitionBridge: Send {
    fn name(&self) -> &str;
    fn start_streams(&mut self, subject_id: &str) -> Result<(), BridgeError>;
    fn send_marker(&mut self, marker_json: &str) -> Result<(), BridgeError>;
    fn stop_streams(&mut self) -> Result<(), BridgeError>;

    // Forms that carry the moment the call was made. Queueing bridges apply
    // calls later and pass that moment through; bridges that record time
    // override these.

    fn start_streams_at(&mut self, subject_id: &str, _at: Instant) -> Result<(), BridgeError> {
        self.start_streams(subject_id)
    }

    fn send_marker_at(&mut self, marker_json: &str, _at: Instant) -> Result<(), BridgeError> {
        self.send_marker(marker_json)
    }

    fn stop_streams_at(&mut self, _at: Instant) -> Result<(), BridgeError> {
        self.stop_streams()
    }
}

/// The bridge as the core sees it: either forwarding or a logged no-op.
///
/// Calls are fire-and-forget. Failures are logged and dropped, never
/// returned, so the scheduler cannot stall on the acquisition side.
pub enum Bridge {
    Connected(Box<dyn AcquisitionBridge>),
    Disconnected,
}

impl Bridge {
    pub fn connected(bridge: impl AcquisitionBridge + 'static) -> Self {
        Bridge::Connected(Box::new(bridge))
    }

    /// Picks the variant at startup: a threaded file recorder when a usable
    /// record directory is given, otherwise log-only.
    pub fn detect(record_dir: Option<&Path>, trial: u32) -> Self {
        let Some(dir) = record_dir else {
            info!("no acquisition bridge attached; markers go to the local log only");
            return Bridge::Disconnected;
        };
        if let Err(e) = fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "record directory unusable; running without bridge");
            return Bridge::Disconnected;
        }
        match ThreadedBridge::spawn(JsonlRecorder::new(dir, trial)) {
            Ok(bridge) => Bridge::connected(bridge),
            Err(e) => {
                warn!(error = %e, "could not start bridge worker; running without bridge");
                Bridge::Disconnected
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Bridge::Connected(_))
    }

    pub fn start_streams(&mut self, subject_id: &str) {
        match self {
            Bridge::Connected(inner) => {
                info!(bridge = inner.name(), subject_id, "starting acquisition streams");
                if let Err(e) = inner.start_streams(subject_id) {
                    warn!(bridge = inner.name(), error = %e, "start_streams failed; acquisition not recorded");
                }
            }
            Bridge::Disconnected => {
                debug!(subject_id, "no bridge attached; start_streams skipped");
            }
        }
    }

    pub fn send_marker(&mut self, marker_json: &str) {
        match self {
            Bridge::Connected(inner) => {
                if let Err(e) = inner.send_marker(marker_json) {
                    warn!(bridge = inner.name(), error = %e, marker = marker_json, "send_marker failed");
                }
            }
            Bridge::Disconnected => {
                debug!(marker = marker_json, "no bridge attached; marker kept in local log only");
            }
        }
    }

    pub fn stop_streams(&mut self) {
        match self {
            Bridge::Connected(inner) => {
                info!(bridge = inner.name(), "stopping acquisition streams");
                if let Err(e) = inner.stop_streams() {
                    warn!(bridge = inner.name(), error = %e, "stop_streams failed");
                }
            }
            Bridge::Disconnected => {
                debug!("no bridge attached; stop_streams skipped");
            }
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bridge::Connected(inner) => f.debug_tuple("Connected").field(&inner.name()).finish(),
            Bridge::Disconnected => f.write_str("Disconnected"),
        }
    }
}
