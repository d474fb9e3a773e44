//! TLS credential helpers: the self-signed key/certificate provisioner used to bootstrap the server,
//! and the certificate verifier the client uses when asked to trust any server certificate.

use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Months, Utc};
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkey::PKey,
    rsa::Rsa,
    x509::{
        extension::{BasicConstraints, SubjectAlternativeName, SubjectKeyIdentifier},
        X509NameBuilder, X509,
    },
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::CertificateDer;

use crate::errors::NexusError;

pub const TLS_KEY_FILE_DEFAULT: &str = "mnexus-tls.key";
pub const TLS_CERT_FILE_DEFAULT: &str = "mnexus-tls.cert";
pub const TLS_KEY_BITS: u32 = 2048;
pub const TLS_CERT_VALIDITY_YEARS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Generated,
    AlreadyProvisioned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub key_file: PathBuf,
    pub cert_file: PathBuf,
    pub status: CertStatus,
}

/// Makes sure a key/certificate pair exists at the given paths, generating a self-signed pair
/// when neither file exists. Unset paths default to fixed files in the system temp directory.
///
/// Existing files are never overwritten: if both exist they are reused as is, if only one of them
/// exists the pair is inconsistent and an error is returned.
pub fn provision_self_signed(
    common_name: &str,
    organization: &str,
    key_file: Option<&Path>,
    cert_file: Option<&Path>,
) -> Result<CertPaths, NexusError> {
    let key_file = key_file.map(Path::to_path_buf).unwrap_or_else(|| env::temp_dir().join(TLS_KEY_FILE_DEFAULT));
    let cert_file = cert_file.map(Path::to_path_buf).unwrap_or_else(|| env::temp_dir().join(TLS_CERT_FILE_DEFAULT));

    match (key_file.exists(), cert_file.exists()) {
        (true, true) => {
            log::info!("tls key {} and cert {} already exist", key_file.display(), cert_file.display());
            return Ok(CertPaths { key_file, cert_file, status: CertStatus::AlreadyProvisioned });
        }
        (true, false) => return Err(NexusError::ErrCertPairInconsistent("key".into(), "cert".into())),
        (false, true) => return Err(NexusError::ErrCertPairInconsistent("cert".into(), "key".into())),
        (false, false) => {}
    }

    let (key_pem, cert_pem) = generate_self_signed(common_name, organization)?;

    write_private_file(&key_file, &key_pem)?;
    if let Err(e) = write_private_file(&cert_file, &cert_pem) {
        let _ = fs::remove_file(&key_file);
        return Err(e);
    }

    log::info!("generated self-signed tls key {} and cert {}", key_file.display(), cert_file.display());
    Ok(CertPaths { key_file, cert_file, status: CertStatus::Generated })
}

/// Generates an RSA key and a self-signed certificate for it, both PEM-encoded. The key is PKCS#1.
pub fn generate_self_signed(common_name: &str, organization: &str) -> Result<(Vec<u8>, Vec<u8>), NexusError> {
    let rsa = Rsa::generate(TLS_KEY_BITS)?;
    let key_pem = rsa.private_key_to_pem()?;
    let private_key = PKey::from_rsa(rsa)?;

    let now = Utc::now();
    let expires =
        now.checked_add_months(Months::new(TLS_CERT_VALIDITY_YEARS * 12)).ok_or(NexusError::ErrCertValidityInvalid)?;

    let mut subject_name = X509NameBuilder::new()?;
    subject_name.append_entry_by_text("CN", common_name)?;
    subject_name.append_entry_by_text("O", organization)?;
    let subject = subject_name.build();

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial_number = BigNum::from_dec_str(&now.timestamp().to_string())?.to_asn1_integer()?;
    builder.set_serial_number(&serial_number)?;
    builder.set_subject_name(&subject)?;
    builder.set_issuer_name(&subject)?;
    builder.set_pubkey(&private_key)?;
    let not_before: Asn1Time = Asn1Time::from_unix(now.timestamp())?;
    let not_after: Asn1Time = Asn1Time::from_unix(expires.timestamp())?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().build()?)?;
    let san = SubjectAlternativeName::new().dns(common_name).build(&builder.x509v3_context(None, None))?;
    builder.append_extension(san)?;
    let subject_key_id = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(subject_key_id)?;

    builder.sign(&private_key, MessageDigest::sha256())?;
    let cert_pem = builder.build().to_pem()?;

    Ok((key_pem, cert_pem))
}

fn write_private_file(path: &Path, data: &[u8]) -> Result<(), NexusError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(())
}

#[derive(Debug)]
pub struct DisabledVerifier;

impl ServerCertVerifier for DisabledVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        let provider = rustls::crypto::CryptoProvider::get_default()
            .cloned()
            .unwrap_or(Arc::new(rustls::crypto::ring::default_provider()));
        provider.signature_verification_algorithms.supported_schemes()
    }
}
