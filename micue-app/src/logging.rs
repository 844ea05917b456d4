use anyhow::{Result, anyhow};
use micue_timing::FrameTimingStats;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global fmt subscriber. `--log-level` wins over `RUST_LOG`,
/// which wins over the `info` default.
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow!("invalid log filter {directives:?}: {e}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

pub fn log_frame_stats(label: &str, stats: &FrameTimingStats, frames: usize) {
    if frames == 0 {
        return;
    }
    let ms = |ns: f64| (ns / 1e3).round() / 1e3;
    info!(
        frames,
        avg_ms = ms(stats.average_frame_time_ns),
        jitter_ms = ms(stats.jitter_ns),
        min_ms = ms(stats.min_frame_time_ns),
        max_ms = ms(stats.max_frame_time_ns),
        fps = stats.effective_fps.round(),
        "{label} timing"
    );
}
