//! The arithmetic commands: inc, dec, add and sub.

use clap::Parser;
use derive_more::Deref;

use crate::{
    api::Client,
    cli::command::{self, CommandExecutor},
    errors::NexusError,
};

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Adds one to a gauge.

  $ mnexus inc uptime"#
)]
pub struct Inc {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Subtracts one from a gauge.

  $ mnexus dec queue_depth"#
)]
pub struct Dec {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Adds a number to a gauge.

  $ mnexus add load 0.5"#
)]
pub struct Add {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[arg(next_line_help = false, value_name = "DELTA", allow_negative_numbers = true)]
    delta: f64,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Subtracts a number from a gauge.

  $ mnexus sub load 0.5"#
)]
pub struct Sub {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[arg(next_line_help = false, value_name = "DELTA", allow_negative_numbers = true)]
    delta: f64,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

fn report(key: &str, existed: bool) -> Result<(), NexusError> {
    if !existed {
        println!("No gauge found at {}", key);
        return Err(NexusError::ErrMetricNotFound);
    }
    println!("ok");
    Ok(())
}

fn run(
    options: &command::HttpOptions,
    key: &str,
    f: impl FnOnce(&Client) -> Result<bool, NexusError>,
) -> Result<(), NexusError> {
    let client = options.client()?;
    report(key, f(&client)?)
}

impl CommandExecutor for Inc {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        run(&self.http_options, &self.key, |client| client.increment(&self.key))
    }
}

impl CommandExecutor for Dec {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        run(&self.http_options, &self.key, |client| client.decrement(&self.key))
    }
}

impl CommandExecutor for Add {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        run(&self.http_options, &self.key, |client| client.add(&self.key, self.delta))
    }
}

impl CommandExecutor for Sub {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        run(&self.http_options, &self.key, |client| client.subtract(&self.key, self.delta))
    }
}
