pub mod timer;

pub use timer::{FrameTimes, FrameTimingStats, HighPrecisionTimer, ManualTimer, Timer};
