//! Server-side transport credentials.

use std::sync::Arc;

use rustls::ServerConfig;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use super::error::CredsError;
use super::verify::{validate_peer, AllowedSans};
use super::{AuthInfo, ProtocolInfo};

/// Terminates TLS for a listener and enforces its peer SAN allow list.
///
/// Immutable once built; one value is shared across every connection the
/// listener accepts. The rustls config must require client certificates -
/// [`crate::config::TlsConfig::load_server`] builds one that does.
#[derive(Clone)]
pub struct ServerCredentials {
    acceptor: TlsAcceptor,
    allowed_sans: Arc<AllowedSans>,
}

impl std::fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("allowed_sans", &self.allowed_sans)
            .finish_non_exhaustive()
    }
}

impl ServerCredentials {
    /// Build server credentials from a rustls config and an allow list.
    ///
    /// The config is optional because the `tls` section of service
    /// configuration is; its absence fails here with
    /// [`CredsError::NilServerConfig`] rather than producing a plaintext
    /// listener.
    pub fn new(
        config: Option<Arc<ServerConfig>>,
        allowed_sans: AllowedSans,
    ) -> Result<Self, CredsError> {
        let config = config.ok_or(CredsError::NilServerConfig)?;
        Ok(Self {
            acceptor: TlsAcceptor::from(config),
            allowed_sans: Arc::new(allowed_sans),
        })
    }

    /// Terminate TLS on an accepted connection and check the peer's identity.
    ///
    /// On success, returns the secured stream and an [`AuthInfo`] snapshot.
    /// On failure the connection is dropped closed and the error surfaced:
    /// TLS engine errors verbatim, identity rejections as
    /// [`CredsError::EmptyPeerCerts`] / [`CredsError::SanNotAccepted`].
    pub async fn server_handshake(
        &self,
        raw: TcpStream,
    ) -> Result<(TlsStream<TcpStream>, AuthInfo), CredsError> {
        let tls = self.acceptor.accept(raw).await?;
        let (_, conn) = tls.get_ref();
        validate_peer(
            conn.peer_certificates().unwrap_or_default(),
            &self.allowed_sans,
        )?;
        let sni = conn.server_name().map(str::to_owned);
        let auth_info = AuthInfo::from_tls(conn, sni);
        Ok((tls, auth_info))
    }

    /// Protocol summary for the RPC framework.
    pub fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            security_protocol: super::AUTH_TYPE,
            security_version: "1.2",
            server_name: String::new(),
        }
    }

    /// Server names are chosen by clients; nothing to override here.
    pub fn override_server_name(&mut self, _name: &str) -> Result<(), CredsError> {
        Ok(())
    }
}
