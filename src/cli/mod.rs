//! The `metric_nexus::cli` module is used to serve the mnexus application.
//! This module accepts options from the command line and either starts a server up or sends one
//! request to a running server.

use clap::{Parser, Subcommand};
use sysexits::ExitCode;

use crate::{cli::command::CommandExecutor, EXIT_CODE_INSUFFICIENT_PARAMS, VERSION};

pub mod command;
pub mod config;

#[derive(Parser)]
#[command(
    name = "mnexus",
    version = VERSION,
    disable_help_subcommand = true,
    about = "A lightweight, authenticated metrics registry with a Prometheus exposition endpoint."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    Server(command::server::Server),
    Create(command::create::Create),
    Read(command::read::Read),
    Update(command::update::Update),
    Inc(command::adjust::Inc),
    Dec(command::adjust::Dec),
    Add(command::adjust::Add),
    Sub(command::adjust::Sub),
    Delete(command::delete::Delete),
}

impl Commands {
    pub fn execute(&mut self) -> ExitCode {
        match self {
            Commands::Server(server) => server.execute(),
            Commands::Create(create) => create.execute(),
            Commands::Read(read) => read.execute(),
            Commands::Update(update) => update.execute(),
            Commands::Inc(inc) => inc.execute(),
            Commands::Dec(dec) => dec.execute(),
            Commands::Add(add) => add.execute(),
            Commands::Sub(sub) => sub.execute(),
            Commands::Delete(delete) => delete.execute(),
        }
    }
}

impl Cli {
    /// Do real jobs.
    #[inline]
    pub fn run(&mut self) -> ExitCode {
        if let Some(ref mut cmd) = &mut self.command {
            return cmd.execute();
        }

        EXIT_CODE_INSUFFICIENT_PARAMS
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["mnexus", "add", "--api-key", "Hello World", "load", "-0.5"]);
        assert!(cli.is_ok());
        match cli.unwrap().command {
            Some(Commands::Add(_)) => {}
            _ => panic!("expected the add command"),
        }

        assert!(Cli::try_parse_from(["mnexus", "update", "uptime", "many"]).is_err());
        assert!(Cli::try_parse_from(["mnexus", "server", "--config", "/etc/mnexus/config.hcl"]).is_ok());
    }
}
