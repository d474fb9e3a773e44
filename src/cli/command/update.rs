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
    about = r#"Sets the value of a gauge. With --create, a missing gauge is created first.

  $ mnexus update queue_depth 12
  $ mnexus update --create --description="items waiting" queue_depth 12"#
)]
pub struct Update {
    #[arg(next_line_help = false, value_name = "KEY")]
    key: String,

    #[arg(next_line_help = false, value_name = "VALUE", allow_negative_numbers = true)]
    value: f64,

    #[arg(long, help = "Create the gauge when it does not exist")]
    create: bool,

    #[arg(long, value_name = "string", default_value = "", help = "Description used when the gauge is created")]
    description: String,

    #[deref]
    #[command(flatten, next_help_heading = "HTTP Options")]
    http_options: command::HttpOptions,
}

impl CommandExecutor for Update {
    #[inline]
    fn main(&self) -> Result<(), NexusError> {
        let client = self.client()?;

        if self.create {
            client.create_update(&self.key, &self.description, self.value)?;
        } else if !client.update(&self.key, self.value)? {
            println!("No gauge found at {}", self.key);
            return Err(NexusError::ErrMetricNotFound);
        }

        println!("Success! Set {} to {}", self.key, self.value);
        Ok(())
    }
}
