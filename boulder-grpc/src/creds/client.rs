//! Client-side transport credentials.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use super::context::HandshakeContext;
use super::error::CredsError;
use super::{AuthInfo, ProtocolInfo};

/// A client certificate chain and its private key, presented to servers that
/// require mutual authentication.
pub struct ClientIdentity {
    /// Certificate chain, leaf first, in DER.
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// Private key for the leaf.
    pub key: PrivateKeyDer<'static>,
}

/// Initiates TLS toward other internal services.
///
/// The underlying rustls config (trusted roots, client certificate) is a
/// template fixed at construction; only the server name varies per handshake,
/// and it is supplied to the connector per call rather than by mutating the
/// template.
#[derive(Clone)]
pub struct ClientCredentials {
    connector: TlsConnector,
    server_name_override: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("server_name_override", &self.server_name_override)
            .finish_non_exhaustive()
    }
}

impl ClientCredentials {
    /// Build client credentials trusting `roots`, optionally presenting
    /// `identity` for mutual authentication.
    ///
    /// An empty root store is accepted and trusts nothing: every handshake
    /// will fail verification.
    pub fn new(
        roots: RootCertStore,
        identity: Option<ClientIdentity>,
    ) -> Result<Self, CredsError> {
        let builder = ClientConfig::builder().with_root_certificates(roots);
        let config = match identity {
            Some(identity) => builder
                .with_client_auth_cert(identity.cert_chain, identity.key)
                .map_err(|e| CredsError::InvalidClientCert(e.to_string()))?,
            None => builder.with_no_client_auth(),
        };
        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name_override: None,
        })
    }

    /// Initiate TLS on an outbound connection.
    ///
    /// The host portion of `authority` (`host`, `host:port`, or `[v6]:port`)
    /// becomes the SNI and the name the server certificate is verified
    /// against. An empty authority falls back to the name set with
    /// [`override_server_name`](Self::override_server_name).
    ///
    /// The caller's context bounds the handshake: whichever of the handshake
    /// and the context finishes first decides the outcome. When the context
    /// wins, the raw connection is dropped closed, the handshake's eventual
    /// result is discarded, and the matching stable error is returned.
    pub async fn client_handshake(
        &self,
        ctx: &HandshakeContext,
        authority: &str,
        raw: TcpStream,
    ) -> Result<(TlsStream<TcpStream>, AuthInfo), CredsError> {
        let host = match authority_host(authority) {
            "" => self.server_name_override.as_deref().unwrap_or_default(),
            host => host,
        };
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| CredsError::InvalidAuthority(authority.to_owned()))?;

        let handshake = self.connector.connect(server_name, raw);
        tokio::select! {
            biased;
            err = ctx.interrupted() => Err(err),
            res = handshake => {
                let tls = res?;
                let (_, conn) = tls.get_ref();
                let auth_info = AuthInfo::from_tls(conn, Some(host.to_owned()));
                Ok((tls, auth_info))
            }
        }
    }

    /// Protocol summary for the RPC framework.
    pub fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            security_protocol: super::AUTH_TYPE,
            security_version: "1.2",
            server_name: self.server_name_override.clone().unwrap_or_default(),
        }
    }

    /// Set the server name used when a handshake is invoked without an
    /// authority. Rarely needed; the RPC framework supplies authorities.
    pub fn override_server_name(&mut self, name: &str) -> Result<(), CredsError> {
        ServerName::try_from(name.to_owned())
            .map_err(|_| CredsError::InvalidAuthority(name.to_owned()))?;
        self.server_name_override = Some(name.to_owned());
        Ok(())
    }
}

/// Extract the host from an authority of the form `host`, `host:port`,
/// `[v6]:port`, or a bare IPv6 literal. Mirrors host:port splitting on the
/// dialing side: a trailing `:port` is dropped, everything else is taken
/// whole.
fn authority_host(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            host
        }
        _ => authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_host_splits_ports() {
        assert_eq!(authority_host("sa.boulder:9095"), "sa.boulder");
        assert_eq!(authority_host("sa.boulder"), "sa.boulder");
        assert_eq!(authority_host("127.0.0.1:9095"), "127.0.0.1");
        assert_eq!(authority_host("[::1]:9095"), "::1");
        assert_eq!(authority_host("::1"), "::1");
        assert_eq!(authority_host("sa.boulder:"), "sa.boulder");
    }

    #[test]
    fn empty_roots_are_allowed() {
        // Trusts nothing; handshakes will fail chain verification, but
        // construction itself is fine.
        assert!(ClientCredentials::new(RootCertStore::empty(), None).is_ok());
    }

    #[tokio::test]
    async fn bad_authority_is_rejected() {
        let creds = ClientCredentials::new(RootCertStore::empty(), None).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let raw = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();

        let err = creds
            .client_handshake(&HandshakeContext::new(), "not a hostname", raw)
            .await
            .unwrap_err();
        assert!(matches!(err, CredsError::InvalidAuthority(_)));
    }

    #[tokio::test]
    async fn empty_authority_without_override_is_rejected() {
        let creds = ClientCredentials::new(RootCertStore::empty(), None).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let raw = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();

        let err = creds
            .client_handshake(&HandshakeContext::new(), "", raw)
            .await
            .unwrap_err();
        assert!(matches!(err, CredsError::InvalidAuthority(_)));
    }

    #[test]
    fn override_server_name_feeds_info() {
        let mut creds = ClientCredentials::new(RootCertStore::empty(), None).unwrap();
        assert!(creds.info().server_name.is_empty());
        creds.override_server_name("sa.boulder").unwrap();
        assert_eq!(creds.info().server_name, "sa.boulder");

        let err = creds.override_server_name("not a hostname").unwrap_err();
        assert!(matches!(err, CredsError::InvalidAuthority(_)));
    }
}
