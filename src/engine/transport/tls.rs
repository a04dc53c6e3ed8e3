//! Client TLS configuration from a Docker-style certificate bundle.
//!
//! The bundle directory holds `ca.pem` (trusted roots) and optionally
//! `cert.pem` plus `key.pem` (client identity). Files are read through
//! `cap_std` so the loader only touches the configured directory.

use std::io;
use std::sync::Arc;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

use crate::error::TransportError;

const CA_FILE: &str = "ca.pem";
const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";

/// Build a rustls client configuration from the bundle at `cert_dir`.
pub(super) fn load_client_config(cert_dir: &Utf8Path) -> Result<Arc<ClientConfig>, TransportError> {
    let fail = |message: String| TransportError::TlsSetupFailed {
        path: cert_dir.as_std_path().to_path_buf(),
        message,
    };

    let dir = Dir::open_ambient_dir(cert_dir, ambient_authority())
        .map_err(|error| fail(format!("failed to open certificate directory: {error}")))?;

    let ca_pem = dir
        .read(CA_FILE)
        .map_err(|error| fail(format!("failed to read {CA_FILE}: {error}")))?;
    let mut roots = RootCertStore::empty();
    let ca_certs =
        parse_certs(&ca_pem).map_err(|error| fail(format!("invalid {CA_FILE}: {error}")))?;
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|error| fail(format!("rejected CA certificate: {error}")))?;
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|error| fail(error.to_string()))?
        .with_root_certificates(roots);

    let config = match read_optional(&dir, CERT_FILE).zip(read_optional(&dir, KEY_FILE)) {
        Some((cert_pem, key_pem)) => {
            let certs = cert_pem
                .and_then(|pem| parse_certs(&pem))
                .map_err(|error| fail(format!("invalid {CERT_FILE}: {error}")))?;
            let key = key_pem
                .and_then(|pem| parse_key(&pem))
                .map_err(|error| fail(format!("invalid {KEY_FILE}: {error}")))?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|error| fail(error.to_string()))?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

/// Read a bundle file, mapping "not found" to `None`.
fn read_optional(dir: &Dir, name: &str) -> Option<io::Result<Vec<u8>>> {
    match dir.read(name) {
        Ok(bytes) => Some(Ok(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => None,
        Err(error) => Some(Err(error)),
    }
}

fn parse_certs(pem: &[u8]) -> io::Result<Vec<CertificateDer<'static>>> {
    let mut reader = pem;
    rustls_pemfile::certs(&mut reader).collect()
}

fn parse_key(pem: &[u8]) -> io::Result<PrivateKeyDer<'static>> {
    let mut reader = pem;
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))
}
