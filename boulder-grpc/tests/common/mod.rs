//! Shared test PKI: a throwaway CA issuing leaves with chosen SANs.

use std::sync::Arc;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

use boulder_grpc::creds::{AllowedSans, ClientCredentials, ClientIdentity, ServerCredentials};

/// A certificate plus its key, in the DER forms rustls wants.
pub struct Identity {
    pub cert_der: CertificateDer<'static>,
    key_pkcs8: Vec<u8>,
}

impl Identity {
    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_pkcs8.clone()))
    }
}

pub struct TestPki {
    ca_cert: Certificate,
    ca_key: KeyPair,
}

impl TestPki {
    pub fn new() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "boulder test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = params.self_signed(&ca_key).unwrap();
        Self { ca_cert, ca_key }
    }

    /// Issue a leaf with the given CN and SANs (DNS names or IP literals),
    /// usable on either side of a handshake.
    pub fn issue(&self, common_name: &str, sans: &[&str]) -> Identity {
        let key = KeyPair::generate().unwrap();
        let mut params =
            CertificateParams::new(sans.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        let cert = params.signed_by(&key, &self.ca_cert, &self.ca_key).unwrap();
        Identity {
            cert_der: cert.der().clone(),
            key_pkcs8: key.serialize_der(),
        }
    }

    pub fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca_cert.der().clone()).unwrap();
        roots
    }

    /// Server credentials presenting `identity`, requiring client
    /// certificates from this CA, enforcing `allowed`.
    pub fn server_credentials(&self, identity: &Identity, allowed: AllowedSans) -> ServerCredentials {
        let verifier = WebPkiClientVerifier::builder(Arc::new(self.roots()))
            .build()
            .unwrap();
        let config = ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(vec![identity.cert_der.clone()], identity.key())
            .unwrap();
        ServerCredentials::new(Some(Arc::new(config)), allowed).unwrap()
    }

    /// Client credentials trusting this CA, optionally presenting `identity`.
    pub fn client_credentials(&self, identity: Option<&Identity>) -> ClientCredentials {
        let identity = identity.map(|id| ClientIdentity {
            cert_chain: vec![id.cert_der.clone()],
            key: id.key(),
        });
        ClientCredentials::new(self.roots(), identity).unwrap()
    }
}

/// A standalone self-signed server identity, its own trust anchor.
pub fn self_signed_server(name: &str) -> Identity {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, name);
    let cert = params.self_signed(&key).unwrap();
    Identity {
        cert_der: cert.der().clone(),
        key_pkcs8: key.serialize_der(),
    }
}
