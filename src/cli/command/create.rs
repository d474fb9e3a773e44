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
    about = r#"Creates a gauge starting at zero. Creating a gauge that already exists is a no-op.

  $ mnexus create uptime "metric server uptime""#
)]
pub struct Create {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[arg(next_line_help = false, value_name = "DESCRIPTION", default_value = "")]
    description: String,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

impl CommandExecutor for Create {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        let client = self.client()?;

        if client.create(&self.key, &self.description)? {
            println!("Success! Created gauge: {}", self.key);
        } else {
            println!("Gauge already exists: {}", self.key);
        }
        Ok(())
    }
}
