//! Peer identity checking against a SAN allow list.
//!
//! The check runs after rustls has verified the peer's chain, so it only
//! decides *authorization*: is this authenticated service one the listener is
//! willing to talk to. It consults the leaf certificate's Subject Alternative
//! Names exclusively; Common Name is deprecated for identity and appears only
//! in rejection diagnostics.

use std::collections::HashSet;
use std::net::IpAddr;

use rustls::pki_types::CertificateDer;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use super::error::CredsError;

/// The set of peer identities a listener accepts.
///
/// The distinction between "no list" and "empty list" is load bearing:
/// `AcceptAny` admits every authenticated peer, while an empty `Explicit`
/// set admits none.
#[derive(Debug, Clone)]
pub enum AllowedSans {
    /// Accept any peer with a verified certificate chain.
    AcceptAny,
    /// Accept only peers presenting one of these SANs. Matching is exact
    /// after normalization: DNS names compare case-insensitively, IP
    /// addresses on their canonical textual form. No wildcards.
    Explicit(HashSet<String>),
}

impl AllowedSans {
    /// Build an explicit allow list, normalizing each entry the same way
    /// peer SANs are normalized at check time.
    pub fn explicit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Explicit(names.into_iter().map(|n| normalize(n.as_ref())).collect())
    }

    fn permits(&self, candidate: &str) -> bool {
        match self {
            AllowedSans::AcceptAny => true,
            AllowedSans::Explicit(set) => set.contains(candidate),
        }
    }
}

/// Check a verified peer chain against an allow list.
///
/// Succeeds when `allowed` is [`AllowedSans::AcceptAny`], or when any
/// normalized SAN of the leaf certificate (index 0) is in the list.
///
/// # Errors
///
/// - [`CredsError::EmptyPeerCerts`] when the chain is empty
/// - [`CredsError::SanNotAccepted`] when no SAN matches
/// - [`CredsError::MalformedPeerCert`] when the leaf does not parse
pub fn validate_peer(
    peer_certs: &[CertificateDer<'_>],
    allowed: &AllowedSans,
) -> Result<(), CredsError> {
    if matches!(allowed, AllowedSans::AcceptAny) {
        return Ok(());
    }

    let leaf = peer_certs.first().ok_or(CredsError::EmptyPeerCerts)?;
    let (_, cert) = X509Certificate::from_der(leaf.as_ref())
        .map_err(|e| CredsError::MalformedPeerCert(e.to_string()))?;

    let sans = leaf_sans(&cert);
    if sans.iter().any(|san| allowed.permits(san)) {
        return Ok(());
    }
    Err(CredsError::SanNotAccepted(peer_description(&cert, &sans)))
}

/// Render the leaf's DNS and IP SANs in normalized textual form.
fn leaf_sans(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => out.push(normalize(dns)),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_octets(bytes) {
                        out.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }
    out
}

fn ip_from_octets(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

/// Lowercase DNS names; reduce IP literals to their canonical form so that
/// `0:0:0:0:0:0:0:1` and `::1` compare equal.
fn normalize(name: &str) -> String {
    match name.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => name.to_ascii_lowercase(),
    }
}

/// Common Name if present, otherwise the first SAN, for rejection diagnostics.
fn peer_description(cert: &X509Certificate<'_>, sans: &[String]) -> String {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_owned)
        .or_else(|| sans.first().cloned())
        .unwrap_or_else(|| "<unknown peer>".to_owned())
}
