//! Transport credentials for internal gRPC connections.
//!
//! Both halves of every internal connection authenticate with TLS
//! certificates. The server side additionally checks the client leaf
//! certificate's Subject Alternative Names against a per-listener allow
//! list, making this module the single enforcement point for which internal
//! service may talk to which.
//!
//! - [`ServerCredentials`] terminates TLS and enforces the allow list
//! - [`ClientCredentials`] initiates TLS and honors caller deadlines
//! - [`validate_peer`] is the pure allow-list check, testable in isolation
//!
//! Credentials are built once at service start, shared across every
//! connection, and carry no per-connection state.

mod client;
mod context;
mod error;
mod server;
mod verify;

pub use client::{ClientCredentials, ClientIdentity};
pub use context::HandshakeContext;
pub use error::CredsError;
pub use server::ServerCredentials;
pub use verify::{validate_peer, AllowedSans};

use rustls::pki_types::CertificateDer;
use rustls::{CipherSuite, CommonState, ProtocolVersion};

/// Authentication mechanism identifier reported to the RPC framework.
pub const AUTH_TYPE: &str = "tls";

/// Snapshot of a completed handshake, handed to the RPC framework alongside
/// the secured connection.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    peer_certificates: Vec<CertificateDer<'static>>,
    protocol_version: Option<ProtocolVersion>,
    cipher_suite: Option<CipherSuite>,
    server_name: Option<String>,
}

impl AuthInfo {
    pub(crate) fn from_tls(state: &CommonState, server_name: Option<String>) -> Self {
        Self {
            peer_certificates: state
                .peer_certificates()
                .map(|certs| certs.to_vec())
                .unwrap_or_default(),
            protocol_version: state.protocol_version(),
            cipher_suite: state.negotiated_cipher_suite().map(|suite| suite.suite()),
            server_name,
        }
    }

    /// Stable authentication-type tag. Always `"tls"`.
    pub fn auth_type(&self) -> &'static str {
        AUTH_TYPE
    }

    /// The peer's verified certificate chain, leaf first. Empty only when the
    /// peer was not asked for a certificate.
    pub fn peer_certificates(&self) -> &[CertificateDer<'static>] {
        &self.peer_certificates
    }

    /// Negotiated TLS protocol version.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.protocol_version
    }

    /// Negotiated cipher suite.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }

    /// The SNI the client sent (server side) or the name this connection was
    /// verified against (client side).
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }
}

/// Protocol summary the RPC framework asks credentials for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Always `"tls"`.
    pub security_protocol: &'static str,
    /// Minimum protocol version these credentials will negotiate.
    pub security_version: &'static str,
    /// Default server name, when one has been configured.
    pub server_name: String,
}
