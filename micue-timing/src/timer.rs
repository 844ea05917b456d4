use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock driving the trial loop. Timestamps are nanoseconds since the
/// timer's origin.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn frame_stats(&self) -> FrameTimingStats;
    fn frame_count(&self) -> usize;

    fn now_ms(&self) -> u64 {
        self.now() / 1_000_000
    }

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTimingStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Bounded window of recent frame durations.
#[derive(Debug, Clone)]
pub struct FrameTimes {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl FrameTimes {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn push(&mut self, d: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(d);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> FrameTimingStats {
        if self.samples.is_empty() {
            return FrameTimingStats::default();
        }
        let times: Vec<f64> = self.samples.iter().map(|d| d.as_nanos() as f64).collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        FrameTimingStats {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl Default for FrameTimes {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Monotonic wall clock backed by `Instant`.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frames: FrameTimes,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }
    fn frame_stats(&self) -> FrameTimingStats {
        self.frames.stats()
    }
    fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: FrameTimes::default(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` outlives the call and a null remainder pointer is allowed.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated clock. `sleep` advances time instantly; clones share the same
/// time source so a test can hold a handle while the driver owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    pub frames: FrameTimes,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_ms(ms: u64) -> Self {
        let timer = Self::default();
        timer.set_ms(ms);
        timer
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Moves the clock to an absolute time, backwards included.
    pub fn set_ms(&self, ms: u64) {
        self.now_ns.store(ms * 1_000_000, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }
    fn frame_stats(&self) -> FrameTimingStats {
        self.frames.stats()
    }
    fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_time() {
        let timer = ManualTimer::new();
        let handle = timer.clone();
        timer.sleep(Duration::from_millis(16));
        handle.advance_ms(4);
        assert_eq!(timer.now_ms(), 20);
        assert_eq!(handle.now(), 20_000_000);
    }

    #[test]
    fn manual_timer_can_go_backwards() {
        let timer = ManualTimer::at_ms(5000);
        timer.set_ms(1000);
        assert_eq!(timer.now_ms(), 1000);
        assert_eq!(timer.elapsed(2_000_000_000), Duration::ZERO);
    }

    #[test]
    fn frame_window_is_bounded() {
        let mut frames = FrameTimes::new(3);
        for ms in [10, 20, 30, 40] {
            frames.push(Duration::from_millis(ms));
        }
        assert_eq!(frames.len(), 3);
        let stats = frames.stats();
        assert_eq!(stats.min_frame_time_ns, 20_000_000.0);
        assert_eq!(stats.max_frame_time_ns, 40_000_000.0);
        assert!((stats.average_frame_time_ns - 30_000_000.0).abs() < 1.0);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(FrameTimes::default().stats(), FrameTimingStats::default());
    }

    #[test]
    fn steady_frames_have_no_jitter() {
        let mut timer = ManualTimer::new();
        for _ in 0..60 {
            timer.record_frame(Duration::from_micros(16_667));
        }
        let stats = timer.frame_stats();
        assert_eq!(timer.frame_count(), 60);
        assert!(stats.jitter_ns < 1.0);
        assert!((stats.effective_fps - 60.0).abs() < 0.1);
    }

    #[test]
    fn high_precision_timer_is_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        timer.sleep(Duration::from_millis(1));
        assert!(timer.now() >= a + 1_000_000);
    }
}
