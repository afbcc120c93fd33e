//! Mutually-authenticated transport for the CA's internal gRPC control plane.
//!
//! Every internal service (storage authority, registration authority, nonce
//! service, ...) talks to its peers over TLS with certificates on both sides.
//! This crate owns that layer:
//!
//! - [`creds`] - the transport credentials themselves: TLS termination and
//!   initiation, SAN allow-list enforcement, and deadline-aware client
//!   handshakes
//! - [`server`] / [`client`] - the thin glue that plugs credentials into
//!   tonic (`serve_with_incoming` on one side, `connect_with_connector` on
//!   the other)
//! - [`config`] - PEM file loading for the `tls` section of service
//!   configuration
//!
//! The SAN allow list is the authorization boundary for the whole control
//! plane: a listener's [`AllowedSans`] decides which internal services may
//! call it. Everything above this layer assumes the peer on the other end of
//! an open connection has already been authenticated and authorized.

pub mod client;
pub mod config;
pub mod creds;
pub mod server;

pub use client::{dial_channel, DialError};
pub use config::{ConfigError, TlsConfig};
pub use creds::{
    validate_peer, AllowedSans, AuthInfo, ClientCredentials, ClientIdentity, CredsError,
    HandshakeContext, ProtocolInfo, ServerCredentials,
};
pub use server::{tls_incoming, TlsConn, TlsConnectInfo};
