use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn};

use crate::bridge::AcquisitionBridge;
use crate::error::BridgeError;

/// A queued call and the moment the caller made it.
enum Command {
    Start(String, Instant),
    Marker(String, Instant),
    Stop(Instant),
}

/// Runs a bridge on its own thread so the caller only ever enqueues.
///
/// Commands are applied in the order they were sent, through the inner
/// bridge's `*_at` methods, so a backlog on the worker never shifts recorded
/// times. Dropping the handle drains the queue and joins the worker.
pub struct ThreadedBridge {
    name: String,
    tx: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedBridge {
    pub fn spawn<B: AcquisitionBridge + 'static>(mut inner: B) -> Result<Self, BridgeError> {
        let name = format!("threaded({})", inner.name());
        let (tx, rx) = mpsc::channel::<Command>();
        let worker = thread::Builder::new()
            .name("micue-bridge".into())
            .spawn(move || {
                for command in rx {
                    let result = match &command {
                        Command::Start(subject, at) => inner.start_streams_at(subject, *at),
                        Command::Marker(json, at) => inner.send_marker_at(json, *at),
                        Command::Stop(at) => inner.stop_streams_at(*at),
                    };
                    if let Err(e) = result {
                        warn!(bridge = inner.name(), error = %e, "bridge worker call failed");
                    }
                }
                debug!(bridge = inner.name(), "bridge worker finished");
            })?;
        Ok(Self {
            name,
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> Result<(), BridgeError> {
        self.tx
            .as_ref()
            .ok_or(BridgeError::WorkerGone)?
            .send(command)
            .map_err(|_| BridgeError::WorkerGone)
    }

    /// Waits until every queued command has been applied.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(bridge = %self.name, "bridge worker panicked");
            }
        }
    }
}

impl AcquisitionBridge for ThreadedBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_streams(&mut self, subject_id: &str) -> Result<(), BridgeError> {
        self.start_streams_at(subject_id, Instant::now())
    }

    fn send_marker(&mut self, marker_json: &str) -> Result<(), BridgeError> {
        self.send_marker_at(marker_json, Instant::now())
    }

    fn stop_streams(&mut self) -> Result<(), BridgeError> {
        self.stop_streams_at(Instant::now())
    }

    fn start_streams_at(&mut self, subject_id: &str, at: Instant) -> Result<(), BridgeError> {
        self.send(Command::Start(subject_id.to_string(), at))
    }

    fn send_marker_at(&mut self, marker_json: &str, at: Instant) -> Result<(), BridgeError> {
        self.send(Command::Marker(marker_json.to_string(), at))
    }

    fn stop_streams_at(&mut self, at: Instant) -> Result<(), BridgeError> {
        self.send(Command::Stop(at))
    }
}

impl Drop for ThreadedBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
