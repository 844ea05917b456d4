//! Acquisition-side collaborators: the bridge capability the trial loop
//! talks to, the marker emitter, and concrete bridges.

pub mod bridge;
pub mod emitter;
pub mod error;
pub mod memory;
pub mod recorder;
pub mod threaded;

pub use bridge::{AcquisitionBridge, Bridge};
pub use emitter::MarkerEmitter;
pub use error::BridgeError;
pub use memory::{BridgeCall, MemoryBridge};
pub use recorder::{JsonlRecorder, LogEntry, LogRecord, read_marker_log, stream_name};
pub use threaded::ThreadedBridge;
