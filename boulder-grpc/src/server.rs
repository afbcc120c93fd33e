//! Server-side plumbing between credentials and the gRPC framework.
//!
//! tonic consumes an incoming stream of connections that already implement
//! I/O plus [`Connected`]; [`tls_incoming`] produces one by running every
//! accepted TCP connection through
//! [`ServerCredentials::server_handshake`](crate::creds::ServerCredentials::server_handshake).
//! Handlers can then read the authenticated peer out of request extensions:
//!
//! ```ignore
//! let peer = request.extensions().get::<TlsConnectInfo>();
//! ```

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_stream::Stream;
use tonic::transport::server::Connected;
use tracing::{debug, warn};

use crate::creds::{AuthInfo, ServerCredentials};

/// Bound on a single TLS handshake so a stalled peer cannot wedge the accept
/// loop.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity of an authenticated peer, exposed to gRPC handlers via request
/// extensions.
#[derive(Debug, Clone)]
pub struct TlsConnectInfo {
    /// Remote socket address of the peer.
    pub remote_addr: Option<SocketAddr>,
    /// Handshake snapshot, including the peer's verified chain.
    pub auth_info: AuthInfo,
}

/// A secured inbound connection, ready for `Server::serve_with_incoming`.
pub struct TlsConn {
    inner: TlsStream<TcpStream>,
    remote_addr: Option<SocketAddr>,
    auth_info: AuthInfo,
}

impl TlsConn {
    pub fn new(
        inner: TlsStream<TcpStream>,
        remote_addr: Option<SocketAddr>,
        auth_info: AuthInfo,
    ) -> Self {
        Self {
            inner,
            remote_addr,
            auth_info,
        }
    }

    /// The handshake snapshot for this connection.
    pub fn auth_info(&self) -> &AuthInfo {
        &self.auth_info
    }
}

impl Connected for TlsConn {
    type ConnectInfo = TlsConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        TlsConnectInfo {
            remote_addr: self.remote_addr,
            auth_info: self.auth_info.clone(),
        }
    }
}

impl AsyncRead for TlsConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Accept connections from `listener`, terminating TLS and enforcing the
/// credentials' allow list on each.
///
/// Peers that fail the handshake or the allow list see their connection
/// closed and are never yielded; a rejected peer gets no in-band error.
/// Allow-list rejections are logged at `warn` so operators can tell a
/// misconfigured peer from ordinary TLS noise.
pub fn tls_incoming(
    listener: TcpListener,
    creds: ServerCredentials,
) -> impl Stream<Item = io::Result<TlsConn>> {
    async_stream::stream! {
        loop {
            match listener.accept().await {
                Ok((tcp, peer_addr)) => {
                    match tokio::time::timeout(
                        TLS_HANDSHAKE_TIMEOUT,
                        creds.server_handshake(tcp),
                    )
                    .await
                    {
                        Ok(Ok((tls, auth_info))) => {
                            debug!(peer = %peer_addr, "TLS handshake successful");
                            yield Ok(TlsConn::new(tls, Some(peer_addr), auth_info));
                        }
                        Ok(Err(e)) if e.is_authorization() => {
                            warn!(peer = %peer_addr, error = %e, "peer rejected by SAN allow list");
                        }
                        Ok(Err(e)) => {
                            debug!(peer = %peer_addr, error = %e, "TLS handshake failed");
                        }
                        Err(_) => {
                            warn!(peer = %peer_addr, timeout = ?TLS_HANDSHAKE_TIMEOUT, "TLS handshake timed out");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "TCP accept failed");
                }
            }
        }
    }
}
