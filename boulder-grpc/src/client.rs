//! Client-side plumbing between credentials and the gRPC framework.
//!
//! The TLS handshake happens up front, under the caller's
//! [`HandshakeContext`], and the resulting channel rides the pre-established
//! stream. Connection lifecycle (reconnects, pooling, load balancing) stays
//! with the framework; once the secured stream has been handed over, further
//! dials through the same connector fail rather than silently re-handshaking
//! outside the caller's context.

use std::future::{ready, Ready};
use std::io;
use std::task::{Context, Poll};

use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tonic::transport::{Channel, Endpoint};
use tower::Service;

use crate::creds::{ClientCredentials, CredsError, HandshakeContext};

/// Errors from establishing a secured channel.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error(transparent)]
    Handshake(#[from] CredsError),

    #[error("failed to establish channel: {0}")]
    Channel(#[from] tonic::transport::Error),
}

/// Open a gRPC channel to `addr`, secured by `creds` and verified against the
/// host portion of `authority`.
pub async fn dial_channel(
    addr: &str,
    authority: &str,
    creds: &ClientCredentials,
    ctx: &HandshakeContext,
) -> Result<Channel, DialError> {
    let tcp = TcpStream::connect(addr)
        .await
        .map_err(|source| DialError::Connect {
            addr: addr.to_owned(),
            source,
        })?;
    let (tls, _auth_info) = creds.client_handshake(ctx, authority, tcp).await?;

    // The connector supplies the already-secured stream; the URI only names
    // the :authority the channel should advertise.
    let channel = Endpoint::from_shared(format!("http://{authority}"))?
        .connect_with_connector(TakeOnce(Some(tls)))
        .await?;
    Ok(channel)
}

/// Connector holding a stream that was secured before the channel existed.
///
/// `call` takes the stream out of the slot, so exactly one dial can succeed;
/// an emptied connector refuses with `ConnectionRefused` and the caller
/// decides whether to dial again from scratch.
struct TakeOnce<S>(Option<S>);

impl<S> Service<Uri> for TakeOnce<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    type Response = TokioIo<S>;
    type Error = io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        ready(self.0.take().map(TokioIo::new).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "secured connection already handed to the channel",
            )
        }))
    }
}
