//! This module provides the commands of the mnexus application. The 'server' command runs the
//! metric nexus server, every other command is a client that sends one request to a running
//! server.

use std::path::PathBuf;

use clap::{Args, ValueHint};
use sysexits::ExitCode;

use crate::{
    api::{client::TLSConfigBuilder, Client},
    errors::NexusError,
    EXIT_CODE_OK, EXIT_CODE_REQUEST_FAILURE,
};

pub mod adjust;
pub mod create;
pub mod delete;
pub mod read;
pub mod server;
pub mod update;

pub trait CommandExecutor {
    fn main(&self) -> Result<(), NexusError>;

    #[inline]
    fn execute(&mut self) -> ExitCode {
        match self.main() {
            Ok(()) => EXIT_CODE_OK,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_CODE_REQUEST_FAILURE
            }
        }
    }
}

#[derive(Args, Default)]
#[group(required = false, multiple = true)]
pub struct HttpOptions {
    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        env = "MNEXUS_ADDR",
        default_value = "https://127.0.0.1:8443",
        long_help = r#"Address of the metric nexus server. This can also be specified via the
MNEXUS_ADDR environment variable."#
    )]
    pub address: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        env = "MNEXUS_API_KEY",
        hide_env_values = true,
        default_value = "",
        long_help = r#"API key sent in the x-api-key header. This can also be specified via the
MNEXUS_API_KEY environment variable."#
    )]
    pub api_key: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        value_hint = ValueHint::FilePath,
        env = "MNEXUS_CACERT",
        long_help = r#"Path on the local disk to a single PEM-encoded CA certificate to verify
the server's TLS certificate. For a self-provisioned server this is the
server's own certificate file."#
    )]
    pub ca_cert: Option<PathBuf>,

    #[arg(
        long,
        next_line_help = true,
        env = "MNEXUS_SKIP_VERIFY",
        long_help = r#"Disable verification of TLS certificates. Using this option is highly
discouraged as it decreases the security of data transmissions to and
from the server. The default is false."#
    )]
    pub tls_skip_verify: bool,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        long_help = r#"Idempotency key sent with the request. A retried request that carries the
same key is applied only once by the server."#
    )]
    pub idempotency_key: Option<String>,
}

impl HttpOptions {
    pub fn client(&self) -> Result<Client, NexusError> {
        let mut client = Client::new().with_addr(&self.address).with_api_key(&self.api_key);

        if self.address.starts_with("https") {
            let mut tls_config_builder = TLSConfigBuilder::new().with_insecure(self.tls_skip_verify);
            if let Some(ca_cert) = &self.ca_cert {
                tls_config_builder = tls_config_builder.with_server_ca_path(ca_cert)?;
            }
            client = client.with_tls_config(tls_config_builder.build()?);
        }

        if let Some(idempotency_key) = &self.idempotency_key {
            client = client.with_idempotency_key(idempotency_key);
        }

        Ok(client.build())
    }
}

#[derive(Args)]
#[group(required = false, multiple = true)]
pub struct CommandOptions {
    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        long_help = r#"Path to a configuration file or directory of configuration files.
If the path is a directory, all files which end in .hcl, .json, .yaml or .yml
are loaded in name order."#
    )]
    pub config: Option<PathBuf>,
}
