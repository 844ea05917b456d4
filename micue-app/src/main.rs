mod app;
mod cli;
mod commands;
mod logging;
mod presenter;

use anyhow::Result;
use clap::Parser;
use micue_render::load_font;

use crate::app::App;
use crate::cli::{Cli, Command, RunArgs};
use crate::presenter::Presenter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;

    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => run(args),
        Command::Simulate(args) => {
            let report = commands::simulate(&args)?;
            println!("{}", serde_json::to_string_pretty(&report.summary)?);
            Ok(())
        }
        Command::Verify(args) => {
            let summary = commands::verify(&args)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = commands::load_config(args.session.config.as_deref())?;
    let font = args.font.as_deref().map(load_font).transpose()?;
    let bridge = commands::detect_bridge(&args.session);
    let presenter = Presenter::new(config, bridge, args.subject);
    App::new(presenter, font, args.windowed).run()
}
