use micue_core::{MarkerEvent, MarkerSink};
use micue_core::marker::endpoint_label;
use tracing::{error, info};

use crate::bridge::Bridge;

/// Encodes markers, writes them to the local log and forwards them.
#[derive(Debug)]
pub struct MarkerEmitter {
    bridge: Bridge,
    sent: usize,
}

impl MarkerEmitter {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge, sent: 0 }
    }

    pub fn emit(&mut self, event: &MarkerEvent) {
        let wire = match event.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                error!(%event, error = %e, "marker could not be encoded");
                return;
            }
        };
        self.sent += 1;
        info!(
            target: "micue::marker",
            seq = self.sent,
            stop = endpoint_label(event.stop),
            start = endpoint_label(event.start),
            connected = self.bridge.is_connected(),
            "{wire}"
        );
        self.bridge.send_marker(&wire);
    }

    /// Markers emitted so far, whether or not a bridge took them.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    pub fn into_bridge(self) -> Bridge {
        self.bridge
    }
}

impl MarkerSink for MarkerEmitter {
    fn emit(&mut self, event: &MarkerEvent) {
        MarkerEmitter::emit(self, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBridge;
    use micue_core::CuePhase;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes).unwrap().lines().map(str::to_owned).collect()
        }
    }

    fn logged_at_info(f: impl FnOnce()) -> Vec<String> {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.lines()
    }

    #[test]
    fn forwards_exact_wire_strings_in_order() {
        let memory = MemoryBridge::new();
        let mut emitter = MarkerEmitter::new(Bridge::connected(memory.clone()));
        emitter.emit(&MarkerEvent::session_start());
        emitter.emit(&MarkerEvent::between(CuePhase::Blink, CuePhase::Left));
        emitter.emit(&MarkerEvent::session_end(CuePhase::Left));
        assert_eq!(
            memory.markers(),
            vec![
                r#"{"stop":"None","start":"BLINK"}"#,
                r#"{"stop":"BLINK","start":"LEFT"}"#,
                r#"{"stop":"LEFT","start":"None"}"#,
            ]
        );
        assert_eq!(emitter.sent(), 3);
    }

    #[test]
    fn counts_markers_without_bridge() {
        let mut emitter = MarkerEmitter::new(Bridge::Disconnected);
        emitter.emit(&MarkerEvent::session_start());
        assert_eq!(emitter.sent(), 1);
        assert!(!emitter.bridge().is_connected());
    }

    #[test]
    fn every_marker_reaches_the_local_log() {
        let opening = r#"{"stop":"None","start":"BLINK"}"#;
        for bridge in [Bridge::Disconnected, Bridge::connected(MemoryBridge::new())] {
            let connected = bridge.is_connected();
            let lines = logged_at_info(|| {
                let mut emitter = MarkerEmitter::new(bridge);
                emitter.emit(&MarkerEvent::session_start());
            });
            let markers: Vec<&String> = lines.iter().filter(|l| l.contains("micue::marker")).collect();
            assert_eq!(markers.len(), 1, "{lines:?}");
            assert!(markers[0].contains(" INFO "), "{lines:?}");
            assert!(markers[0].contains(opening), "{lines:?}");
            assert!(markers[0].contains(&format!("connected={connected}")), "{lines:?}");
        }
    }

    #[test]
    fn missing_bridge_is_only_visible_in_the_log() {
        let lines = logged_at_info(|| {
            let mut emitter = MarkerEmitter::new(Bridge::Disconnected);
            emitter.emit(&MarkerEvent::session_start());
            emitter.emit(&MarkerEvent::between(CuePhase::Blink, CuePhase::Rest));
        });
        assert!(lines.iter().all(|l| l.contains(" INFO ")), "{lines:?}");
        assert_eq!(lines.iter().filter(|l| l.contains("connected=false")).count(), 2);
    }
}
