//! File-based TLS material for service configuration.
//!
//! Services carry a `tls` section naming their certificate, key, and CA
//! bundle on disk; loading it yields credentials for either side of an
//! internal connection. The section is optional in service config, and its
//! absence flows through to
//! [`ServerCredentials::new`](crate::creds::ServerCredentials::new) as
//! `None`, keeping "no TLS config" a startup error instead of a silent
//! plaintext listener.
//!
//! All files are expected in PEM format.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use serde::Deserialize;

use crate::creds::{
    AllowedSans, ClientCredentials, ClientIdentity, CredsError, ServerCredentials,
};

/// Paths to PEM-encoded TLS material.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Certificate chain presented to peers, leaf first.
    pub cert_file: PathBuf,
    /// Private key for the leaf of `cert_file` (PKCS#8, SEC1, or PKCS#1).
    pub key_file: PathBuf,
    /// Trust anchors: client CAs on the server side, server roots on the
    /// client side.
    pub ca_cert_file: PathBuf,
}

/// Errors from loading TLS material off disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Pem {
        path: PathBuf,
        source: io::Error,
    },

    #[error("no PEM certificates found in {0:?}")]
    NoCerts(PathBuf),

    #[error("no PEM private key found in {0:?}")]
    NoKey(PathBuf),

    #[error("unusable trust anchor in {path:?}: {source}")]
    TrustAnchor {
        path: PathBuf,
        source: rustls::Error,
    },

    #[error("failed to build client verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),

    #[error("failed to build TLS config: {0}")]
    Tls(#[from] rustls::Error),

    #[error(transparent)]
    Creds(#[from] CredsError),
}

impl TlsConfig {
    /// Load server credentials: terminate TLS with `cert_file`/`key_file`,
    /// require client certificates chaining to `ca_cert_file`, and enforce
    /// `allowed_sans` on every peer.
    pub fn load_server(&self, allowed_sans: AllowedSans) -> Result<ServerCredentials, ConfigError> {
        let certs = load_certs(&self.cert_file)?;
        let key = load_private_key(&self.key_file)?;
        let client_roots = load_root_store(&self.ca_cert_file)?;

        let verifier = WebPkiClientVerifier::builder(Arc::new(client_roots)).build()?;
        let config = ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?;

        Ok(ServerCredentials::new(Some(Arc::new(config)), allowed_sans)?)
    }

    /// Load client credentials: trust `ca_cert_file` and present
    /// `cert_file`/`key_file` to servers that ask.
    pub fn load_client(&self) -> Result<ClientCredentials, ConfigError> {
        let roots = load_root_store(&self.ca_cert_file)?;
        let identity = ClientIdentity {
            cert_chain: load_certs(&self.cert_file)?,
            key: load_private_key(&self.key_file)?,
        };
        Ok(ClientCredentials::new(roots, Some(identity))?)
    }
}

/// Load every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let pem = read_file(path)?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigError::Pem {
            path: path.to_owned(),
            source,
        })?;
    if certs.is_empty() {
        return Err(ConfigError::NoCerts(path.to_owned()));
    }
    Ok(certs)
}

/// Load the first private key from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let pem = read_file(path)?;
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| ConfigError::Pem {
            path: path.to_owned(),
            source,
        })?
        .ok_or_else(|| ConfigError::NoKey(path.to_owned()))
}

/// Build a root store from every certificate in a PEM bundle.
pub fn load_root_store(path: &Path) -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert).map_err(|source| ConfigError::TrustAnchor {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(roots)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })
}
