use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Motor-imagery cue presenter with acquisition markers.
#[derive(Debug, Parser)]
#[command(name = "micue", version, about)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `micue::marker=info,warn`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Present a session on screen (the default).
    Run(RunArgs),
    /// Run a session headless and print its markers.
    Simulate(SimulateArgs),
    /// Check that a recorded marker file forms a valid session.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// JSON session config; every field is optional.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for marker recordings. Without it markers are only logged.
    #[arg(long)]
    pub record_dir: Option<PathBuf>,

    /// Trial number used in the recording's stream name.
    #[arg(long, default_value_t = 1)]
    pub trial: u32,
}

impl Default for SessionArgs {
    fn default() -> Self {
        Self {
            config: None,
            record_dir: None,
            trial: 1,
        }
    }
}

#[derive(Debug, Args, Default)]
pub struct RunArgs {
    /// Prefills the subject ID field.
    #[arg(long)]
    pub subject: Option<String>,

    /// TTF/OTF font for on-screen text. Shapes render without one.
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Use a window instead of borderless fullscreen.
    #[arg(long)]
    pub windowed: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, default_value = "SIM")]
    pub subject: String,

    /// Overrides the config's seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pace ticks on the wall clock instead of a simulated one.
    #[arg(long)]
    pub realtime: bool,

    /// Tick interval in milliseconds.
    #[arg(long, default_value_t = 16)]
    pub frame_ms: u64,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Marker file written by a recording run.
    pub file: PathBuf,

    /// Fail unless the session completed exactly this many rounds.
    #[arg(long)]
    pub rounds: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["micue"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.log_level.is_none());
        assert_eq!(RunArgs::default().session.trial, 1);
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "micue",
            "run",
            "--subject",
            "S07",
            "--record-dir",
            "/tmp/rec",
            "--trial",
            "3",
            "--windowed",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.subject.as_deref(), Some("S07"));
        assert_eq!(args.session.trial, 3);
        assert!(args.windowed);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn parses_simulate_and_verify() {
        let cli = Cli::try_parse_from(["micue", "simulate", "--seed", "9", "--frame-ms", "5"]).unwrap();
        let Some(Command::Simulate(args)) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.frame_ms, 5);
        assert_eq!(args.subject, "SIM");
        assert_eq!(args.session.trial, 1);

        let cli = Cli::try_parse_from(["micue", "verify", "m.jsonl", "--rounds", "5"]).unwrap();
        let Some(Command::Verify(args)) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.file, PathBuf::from("m.jsonl"));
        assert_eq!(args.rounds, Some(5));
    }
}
