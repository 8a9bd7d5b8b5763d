//! tabsurveyor command-line entry point.
//!
//! Parses arguments, sets up logging and configuration, opens the operation
//! history and hands over to the session. Errors are reported once here and
//! turn into a non-zero exit status.

use std::io;

use anyhow::Context;
use clap::Parser;
use tabsurveyor::session::Session;
use tabsurveyor::{
    Cli, Command, open_history, resolve_config, run_fields, run_history, run_pipeline,
};
use tabsurveyor_core::logging::init_logging;
use tracing::{debug, warn};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_json)
        .context("Failed to initialize logging")?;

    let config = resolve_config(&cli)?;
    debug!("Using history at {}", config.history_path.display());

    let log = open_history(&config.history_path)?;
    let mut session = Session::new(config, log);
    let mut stdout = io::stdout().lock();

    let outcome = match &cli.command {
        Command::Run(args) => run_pipeline(&mut session, args, &mut stdout),
        Command::Fields(args) => run_fields(&mut session, args, &mut stdout),
        Command::History(args) => run_history(&mut session, args, &mut stdout),
    };

    if !session.log().is_trusted() {
        warn!(
            "The operation history at {} could not be saved; recent operations may be missing",
            session.config().history_path.display()
        );
    }
    outcome
}
