mod cli;
mod logging;

use std::process::exit;

use clap::Parser;
use tracing::error;

use crate::cli::{Cli, GetVerbosity};

fn main() {
    let cli = Cli::parse();
    logging::setup_logger(cli.cmd.get_verbosity().tracing_level_filter(), cli.ansi());
    if let Err(e) = cli.cmd.run() {
        error!("{}", e);
        exit(1);
    }
}
