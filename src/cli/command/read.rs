use clap::Parser;
use derive_more::Deref;

use crate::{
    cli::command::{self, CommandExecutor},
    errors::NexusError,
};

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Reads the current value of a gauge.

  $ mnexus read uptime"#
)]
pub struct Read {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

impl CommandExecutor for Read {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        let client = self.client()?;

        match client.read(&self.key)? {
            Some(value) => println!("{}", value),
            None => {
                println!("No gauge found at {}", self.key);
                return Err(NexusError::ErrMetricNotFound);
            }
        }
        Ok(())
    }
}
