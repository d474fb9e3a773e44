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
    about = r#"Deletes a gauge. It disappears from the exposition endpoint and the state file.

  $ mnexus delete uptime"#
)]
pub struct Delete {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

impl CommandExecutor for Delete {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        let client = self.client()?;

        if !client.delete(&self.key)? {
            println!("No gauge found at {}", self.key);
            return Err(NexusError::ErrMetricNotFound);
        }

        println!("Success! Deleted gauge: {}", self.key);
        Ok(())
    }
}
