//! Certificate signing request generation.
//!
//! The request carries the subject the platform asked for and a critical
//! `basicConstraints` extension with `CA=true, pathLen=0`. The platform's CSR
//! validator expects that marker even though the request is for a client
//! certificate, so it is reproduced byte for byte.
//!
//! 证书签名请求（CSR）的生成。请求中携带平台要求的主题，以及一个关键的
//! `basicConstraints` 扩展（`CA=true, pathLen=0`）。

use super::keys::RsaKeyMaterial;
use crate::error::Result;
use crate::subject::{
    self, COMMON_NAME, COUNTRY, LOCALITY, ORGANIZATION, ORGANIZATIONAL_UNIT, PROVINCE, Subject,
};
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

/// id-ce-basicConstraints
pub const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];

/// DER of `BasicConstraints ::= SEQUENCE { cA TRUE, pathLenConstraint 0 }`.
const BASIC_CONSTRAINTS_CA_PATHLEN_0: [u8; 8] = [0x30, 0x06, 0x01, 0x01, 0xFF, 0x02, 0x01, 0x00];

/// How far the placeholder certificate's validity reaches into the past and future.
const PLACEHOLDER_BACKDATE: Duration = Duration::minutes(10);
const PLACEHOLDER_LIFETIME: Duration = Duration::minutes(20);

/// PEM outputs of one generation run.
///
/// Never partially populated: a failure anywhere yields an error instead.
#[derive(Clone)]
pub struct CertificateMaterial {
    /// PKCS#1 `RSA PRIVATE KEY`; stays on this machine.
    pub private_key_pem: String,
    pub csr_pem: String,
    /// Short-lived self-signed certificate over the same key, only produced on request.
    pub placeholder_certificate_pem: Option<String>,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("csr_pem", &self.csr_pem)
            .field(
                "placeholder_certificate",
                &self.placeholder_certificate_pem.is_some(),
            )
            .finish_non_exhaustive()
    }
}

/// Builds a keypair and CSR for a platform-supplied subject.
///
/// 根据平台提供的主题生成密钥对和 CSR。
#[derive(Debug, Clone)]
pub struct CsrGenerator {
    subject: Subject,
    key_length: usize,
    placeholder_certificate: bool,
}

impl CsrGenerator {
    pub fn new(subject: Subject, key_length: usize) -> Self {
        Self {
            subject,
            key_length,
            placeholder_certificate: false,
        }
    }

    /// Parses `subject` first; see [`subject::parse_subject`].
    pub fn from_subject_str(subject: &str, key_length: usize) -> Result<Self> {
        Ok(Self::new(subject::parse_subject(subject)?, key_length))
    }

    /// Also emit the legacy self-signed placeholder certificate.
    pub fn with_placeholder_certificate(mut self, enabled: bool) -> Self {
        self.placeholder_certificate = enabled;
        self
    }

    pub fn generate(&self) -> Result<CertificateMaterial> {
        let rsa_key = RsaKeyMaterial::generate(self.key_length)?;
        let key_pair = KeyPair::from_pem(&rsa_key.to_pkcs8_pem()?)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(&self.subject);
        let mut basic_constraints = CustomExtension::from_oid_content(
            OID_BASIC_CONSTRAINTS,
            BASIC_CONSTRAINTS_CA_PATHLEN_0.to_vec(),
        );
        basic_constraints.set_criticality(true);
        params.custom_extensions = vec![basic_constraints];

        let csr_pem = params.serialize_request(&key_pair)?.pem()?;

        let placeholder_certificate_pem = if self.placeholder_certificate {
            Some(placeholder_certificate(&self.subject, &key_pair)?)
        } else {
            None
        };

        debug!(
            key_length = self.key_length,
            common_name = self.subject.get(COMMON_NAME),
            "generated certificate signing request"
        );

        Ok(CertificateMaterial {
            private_key_pem: rsa_key.to_pkcs1_pem()?,
            csr_pem,
            placeholder_certificate_pem,
        })
    }
}

/// Every attribute is written, absent ones as empty strings.
fn distinguished_name(subject: &Subject) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, subject.get(COUNTRY).to_string());
    dn.push(DnType::StateOrProvinceName, subject.get(PROVINCE).to_string());
    dn.push(DnType::LocalityName, subject.get(LOCALITY).to_string());
    dn.push(DnType::OrganizationName, subject.get(ORGANIZATION).to_string());
    dn.push(
        DnType::OrganizationalUnitName,
        subject.get(ORGANIZATIONAL_UNIT).to_string(),
    );
    dn.push(DnType::CommonName, subject.get(COMMON_NAME).to_string());
    dn
}

fn placeholder_certificate(subject: &Subject, key_pair: &KeyPair) -> Result<String> {
    let now = OffsetDateTime::now_utc();
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(subject);
    params.not_before = now - PLACEHOLDER_BACKDATE;
    params.not_after = now + PLACEHOLDER_LIFETIME;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    Ok(params.self_signed(key_pair)?.pem())
}
