use std::process::ExitCode;

use clap::Parser;
use metric_nexus::cli::Cli;

fn main() -> ExitCode {
    Cli::parse().run().into()
}
