//! Builds the mutually-authenticated client from persisted material.
//!
//! The client presents the issued chain and our key, and trusts the native
//! root store plus every certificate of that chain. The platform's own CA
//! therefore authenticates the platform back to us.
//!
//! 根据持久化的材料构建双向认证的客户端。

use crate::config::Config;
use crate::crypto::{ensure_key_matches_certificate, fingerprint, load_private_key};
use crate::error::{HandshakeError, Result};
use reqwest::{Certificate, Client, Identity};
use tracing::info;

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Checks that `chain_pem` holds at least one certificate and that the first
/// one certifies the public half of `private_key_pem`.
///
/// Returns the certificates of the chain in order.
///
/// 检查证书链至少包含一个证书，且第一个证书与私钥匹配。
pub fn verify_identity(private_key_pem: &str, chain_pem: &[u8]) -> Result<Vec<pem::Pem>> {
    let key = load_private_key(private_key_pem)
        .map_err(|e| HandshakeError::InvalidCertificate(format!("private key: {e}")))?;

    let certificates: Vec<pem::Pem> = pem::parse_many(chain_pem)
        .map_err(|e| HandshakeError::InvalidCertificate(e.to_string()))?
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE_TAG)
        .collect();
    let leaf = certificates
        .first()
        .ok_or_else(|| HandshakeError::InvalidCertificate("chain holds no certificate".into()))?;
    ensure_key_matches_certificate(&key, leaf.contents())?;

    Ok(certificates)
}

/// Fails without side effects if the key and the leaf certificate disagree.
///
/// 如果私钥与叶证书不匹配，则失败且不产生任何副作用。
pub fn build_tls_client(
    private_key_pem: &str,
    chain_pem: &[u8],
    config: &Config,
) -> Result<Client> {
    let certificates = verify_identity(private_key_pem, chain_pem)?;

    let mut identity_pem = chain_pem.to_vec();
    if !identity_pem.ends_with(b"\n") {
        identity_pem.push(b'\n');
    }
    identity_pem.extend_from_slice(private_key_pem.as_bytes());
    let identity = Identity::from_pem(&identity_pem).map_err(HandshakeError::Tls)?;

    let mut builder = Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .timeout(config.request_timeout())
        .danger_accept_invalid_hostnames(!config.verify_hostname);
    for certificate in &certificates {
        let root = Certificate::from_der(certificate.contents()).map_err(HandshakeError::Tls)?;
        builder = builder.add_root_certificate(root);
    }
    let client = builder.build().map_err(HandshakeError::Tls)?;

    info!(
        fingerprint = %fingerprint(certificates[0].contents()),
        chain_len = certificates.len(),
        verify_hostname = config.verify_hostname,
        "mTLS client ready"
    );
    Ok(client)
}
