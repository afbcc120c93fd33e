//! Credential-layer error types.

use std::io;

/// Errors produced by the transport credential layer.
///
/// Four categories matter to callers: construction failures (fatal at service
/// startup), TLS engine failures (surfaced verbatim), authorization failures
/// (security events, server side only), and cancellation (client side only).
/// The `context deadline exceeded` / `context canceled` texts are stable and
/// part of the interface; higher layers match on them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredsError {
    /// No TLS configuration was supplied at construction.
    #[error("boulder/grpc/creds: nil server TLS config provided")]
    NilServerConfig,

    /// The client certificate chain or key was rejected at construction.
    #[error("boulder/grpc/creds: invalid client certificate: {0}")]
    InvalidClientCert(String),

    /// The TLS handshake completed but the peer presented no certificate.
    /// Unreachable with mandatory client authentication; enforced anyway.
    #[error("boulder/grpc/creds: connection presented no peer certificates")]
    EmptyPeerCerts,

    /// The peer authenticated but none of its SANs are on the accepted list.
    /// Carries the peer's Common Name, or its first SAN, for the audit log.
    #[error("boulder/grpc/creds: peer identity {0:?} is not on the accepted SAN list")]
    SanNotAccepted(String),

    /// The peer leaf certificate could not be parsed.
    #[error("boulder/grpc/creds: malformed peer certificate: {0}")]
    MalformedPeerCert(String),

    /// The authority string could not be turned into a TLS server name.
    #[error("boulder/grpc/creds: invalid authority {0:?}")]
    InvalidAuthority(String),

    /// The handshake context's deadline expired.
    #[error("boulder/grpc/creds: context deadline exceeded")]
    DeadlineExceeded,

    /// The handshake context was canceled.
    #[error("boulder/grpc/creds: context canceled")]
    Canceled,

    /// The TLS engine reported a handshake failure.
    #[error("{0}")]
    Handshake(#[from] io::Error),
}

impl CredsError {
    /// True for rejections of an authenticated-but-unauthorized peer.
    /// Operators log these distinctly from plain TLS failures.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            CredsError::EmptyPeerCerts | CredsError::SanNotAccepted(_)
        )
    }

    /// True when the caller's handshake context ended the handshake.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CredsError::DeadlineExceeded | CredsError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_cancellation_texts() {
        assert_eq!(
            CredsError::DeadlineExceeded.to_string(),
            "boulder/grpc/creds: context deadline exceeded"
        );
        assert_eq!(
            CredsError::Canceled.to_string(),
            "boulder/grpc/creds: context canceled"
        );
    }

    #[test]
    fn category_helpers() {
        assert!(CredsError::EmptyPeerCerts.is_authorization());
        assert!(CredsError::SanNotAccepted("ra.boulder".into()).is_authorization());
        assert!(!CredsError::DeadlineExceeded.is_authorization());

        assert!(CredsError::Canceled.is_cancellation());
        assert!(CredsError::DeadlineExceeded.is_cancellation());
        assert!(!CredsError::NilServerConfig.is_cancellation());
    }

    #[test]
    fn tls_errors_surface_verbatim() {
        let err = CredsError::from(io::Error::new(
            io::ErrorKind::InvalidData,
            "received corrupt message",
        ));
        assert_eq!(err.to_string(), "received corrupt message");
    }
}
