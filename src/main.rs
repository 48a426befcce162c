mod case_id;
mod cli;
mod config;
mod events;
mod logging;
mod model;
mod orchestrator;
mod testrail;
mod text_summary;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init_subscriber(logging::Verbosity::from_flags(args.verbose, args.quiet));

    // Configuration and input errors end the process; TestRail failures never do.
    cli::run(args).await
}
