use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use actix_web::{
    middleware::{self, from_fn},
    web, App, HttpResponse, HttpServer,
};
use anyhow::format_err;
use clap::Parser;
use derive_more::Deref;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod, SslOptions, SslVersion};
use sysexits::ExitCode;

use crate::{
    cli::{command, config},
    errors::NexusError,
    http::{self, auth::api_key_middleware, idempotency::idempotency_middleware, HttpState},
    registry::MetricRegistry,
    snapshot::Snapshot,
    utils::cert::{provision_self_signed, CertStatus},
    EXIT_CODE_INSUFFICIENT_PARAMS, EXIT_CODE_LOAD_CONFIG_FAILURE, EXIT_CODE_OK, EXIT_CODE_SERVER_EXIT_UNEXPECTEDLY,
};

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"This command starts a metric nexus server that responds to API requests. The state
file named in the configuration is loaded first and every gauge in it is restored.
When no TLS key and certificate are configured, a self-signed pair is generated in
the system temp directory on first start and reused afterwards.

Start a server with a configuration file:

  $ mnexus server --config=/etc/mnexus/config.hcl"#
)]
pub struct Server {
    #[deref]
    #[command(flatten, next_help_heading = "Command Options")]
    command_options: command::CommandOptions,
}

impl Server {
    #[inline]
    pub fn execute(&mut self) -> ExitCode {
        if let Some(config_path) = &self.config {
            return match self.main(config_path) {
                Ok(_) => EXIT_CODE_OK,
                Err(e) => {
                    println!("server error: {}", e);
                    match e {
                        NexusError::ErrConfigPathInvalid
                        | NexusError::ErrConfigLoadFailed
                        | NexusError::ErrConfigListenerNotFound
                        | NexusError::Hcl { .. }
                        | NexusError::Serde { .. }
                        | NexusError::SerdeYaml { .. } => EXIT_CODE_LOAD_CONFIG_FAILURE,
                        _ => EXIT_CODE_SERVER_EXIT_UNEXPECTEDLY,
                    }
                }
            };
        }

        EXIT_CODE_INSUFFICIENT_PARAMS
    }

    pub fn main(&self, config_path: &PathBuf) -> Result<(), NexusError> {
        let config = config::load_config(&config_path.to_string_lossy())?;

        env::set_var("RUST_LOG", config.log_level());
        env_logger::init();

        let listener = config.listener()?.clone();

        log::debug!("config_path: {}, state_file: {}", config_path.to_string_lossy(), config.state_file);

        let snapshot = Arc::new(Snapshot::load(&config.state_file)?);
        let registry = Arc::new(MetricRegistry::from_snapshot(Arc::clone(&snapshot))?);
        log::info!("restored {} gauges from {}", registry.len()?, config.state_file);

        let api_keys = http::auth::ApiKeys::new(config.api_keys.iter().cloned());
        if api_keys.is_empty() {
            log::warn!("no api_keys configured, every request except {} will be rejected", http::METRICS_PATH);
        }

        let state = HttpState::new(registry, api_keys);

        let certs = provision_self_signed(
            &config.cert_common_name,
            &config.cert_organization,
            non_empty_path(&listener.tls_key_file),
            non_empty_path(&listener.tls_cert_file),
        )?;
        if certs.status == CertStatus::AlreadyProvisioned {
            log::info!("tls credentials already provisioned");
        }

        let cert_file: &Path = &certs.cert_file;
        let key_file: &Path = &certs.key_file;

        let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
        builder
            .set_private_key_file(key_file, SslFiletype::PEM)
            .map_err(|err| format_err!("unable to read tls key {} - {}", key_file.display(), err))?;
        builder
            .set_certificate_chain_file(cert_file)
            .map_err(|err| format_err!("unable to read tls cert {} - {}", cert_file.display(), err))?;
        builder.check_private_key()?;

        builder.set_min_proto_version(Some(listener.tls_min_version))?;
        builder.set_max_proto_version(Some(listener.tls_max_version))?;

        log::info!("tls_cipher_suites: {}", listener.tls_cipher_suites);
        builder.set_cipher_list(&listener.tls_cipher_suites)?;

        if listener.tls_max_version == SslVersion::TLS1_3 {
            builder.clear_options(SslOptions::NO_TLSV1_3);
            builder.set_ciphersuites("TLS_AES_128_GCM_SHA256:TLS_AES_256_GCM_SHA384:TLS_CHACHA20_POLY1305_SHA256")?;
        }

        let server = actix_rt::System::new();

        // the last middleware wrapped runs first: log, then authorize, then replay cached responses
        let http_server = HttpServer::new(move || {
            App::new()
                .wrap(from_fn(idempotency_middleware))
                .wrap(from_fn(api_key_middleware))
                .wrap(middleware::Logger::default())
                .configure(|cfg| state.configure(cfg))
                .default_service(web::to(HttpResponse::NotFound))
        })
        .bind_openssl(&listener.address, builder)?;

        log::info!("start listen, addr: {}, cert: {}", listener.address, cert_file.display());
        log::info!("metric nexus server starts, waiting for request...");

        let flush_snapshot = Arc::clone(&snapshot);
        let state_file = config.state_file.clone();
        let save_interval = Duration::from_secs(config.save_interval.max(1));

        server.block_on(async move {
            actix_rt::spawn(flush_periodically(flush_snapshot, state_file, save_interval));
            http_server.run().await
        })?;

        log::info!("server stopped, saving state to {}", config.state_file);
        snapshot.save(&config.state_file)?;

        Ok(())
    }
}

fn non_empty_path(path: &str) -> Option<&Path> {
    if path.is_empty() {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Writes the snapshot to `state_file` every `interval` until the runtime shuts down. Failures are
/// logged and retried on the next tick.
async fn flush_periodically(snapshot: Arc<Snapshot>, state_file: String, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let snapshot = Arc::clone(&snapshot);
        let path = state_file.clone();
        match web::block(move || snapshot.save(&path)).await {
            Ok(Ok(())) => log::debug!("saved state to {}", state_file),
            Ok(Err(e)) => log::error!("failed to save state to {}: {}", state_file, e),
            Err(e) => log::error!("failed to save state to {}: {}", state_file, e),
        }
    }
}
