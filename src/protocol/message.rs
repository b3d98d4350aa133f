//! Defines the documents exchanged with the platform.
//!
//! Every response the handshake reads has an explicit schema here. Fields the
//! platform may omit are `Option`s or defaulted; fields the handshake cannot
//! continue without are checked at the boundary by the accessor methods,
//! which turn absence into [`HandshakeError::Protocol`].
//!
//! 定义与平台交换的文档。握手读取的每个响应都在此有明确的模式定义；
//! 缺少必需字段时返回 [`HandshakeError::Protocol`]。

use crate::error::{HandshakeError, Result};
use serde::{Deserialize, Serialize};

/// Returns `value` if it is present and non-empty.
pub(crate) fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(HandshakeError::protocol(format!("response is missing {what}"))),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// --- REST ---

/// Body returned by the one-time token URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestConnectionInfo {
    pub csr_url: Option<String>,
    #[serde(default)]
    pub api: RestApiUrls,
    #[serde(default)]
    pub certificate: CertificateInfo,
    #[serde(default)]
    pub urls: RestManagementUrls,
}

impl RestConnectionInfo {
    pub fn csr_url(&self) -> Result<&str> {
        required(self.csr_url.as_deref(), "csrUrl")
    }

    pub fn info_url(&self) -> Result<&str> {
        required(self.api.info_url.as_deref(), "api.infoUrl")
    }

    /// Where specification documents are posted; `urls` wins over `api`.
    pub fn metadata_url(&self) -> Option<&str> {
        non_empty(&self.urls.metadata_url).or_else(|| non_empty(&self.api.metadata_url))
    }

    pub fn events_url(&self) -> Option<&str> {
        non_empty(&self.api.events_url).or_else(|| non_empty(&self.urls.events_url))
    }

    pub fn subject(&self) -> Option<&str> {
        non_empty(&self.certificate.subject)
    }

    /// Folds the management info fetched over mTLS into the cached state.
    pub fn merge_management_info(&mut self, info: RestManagementInfo) {
        if let Some(urls) = info.urls {
            if urls.metadata_url.is_some() {
                self.urls.metadata_url = urls.metadata_url;
            }
            if urls.events_url.is_some() {
                self.urls.events_url = urls.events_url;
            }
            if urls.renew_cert_url.is_some() {
                self.urls.renew_cert_url = urls.renew_cert_url;
            }
            if urls.revoke_cert_url.is_some() {
                self.urls.revoke_cert_url = urls.revoke_cert_url;
            }
        }
        if let Some(certificate) = info.certificate {
            if certificate.subject.is_some() {
                self.certificate = certificate;
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiUrls {
    pub events_info_url: Option<String>,
    pub events_url: Option<String>,
    pub metadata_url: Option<String>,
    pub info_url: Option<String>,
    pub certificates_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestManagementUrls {
    pub metadata_url: Option<String>,
    pub events_url: Option<String>,
    pub renew_cert_url: Option<String>,
    pub revoke_cert_url: Option<String>,
}

/// Subject and key requirements the platform places on our CSR.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject: Option<String>,
    pub extensions: Option<String>,
    #[serde(rename = "key-algorithm")]
    pub key_algorithm: Option<String>,
}

/// Body of the management info URL, fetched over mTLS.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestManagementInfo {
    pub client_identity: Option<ClientIdentity>,
    pub urls: Option<RestManagementUrls>,
    pub certificate: Option<CertificateInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientIdentity {
    pub application: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CsrRequest<'a> {
    pub csr: &'a str,
}

/// Certificates returned for a CSR, each base64 of PEM.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrResponse {
    pub crt: Option<String>,
    pub client_crt: Option<String>,
    pub ca_crt: Option<String>,
}

impl CsrResponse {
    /// The full chain if the platform sent one, else the bare client certificate.
    pub fn certificate_chain(&self) -> Result<&str> {
        non_empty(&self.crt)
            .or_else(|| non_empty(&self.client_crt))
            .ok_or_else(|| HandshakeError::protocol("CSR response carries no certificate"))
    }
}

// --- GraphQL ---

/// Decoded form of a GraphQL connector token.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlToken {
    #[serde(rename = "connectorURL")]
    pub connector_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationResult {
    pub result: Configuration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub token: Option<TokenHolder>,
    pub certificate_signing_request_info: Option<CsrInfo>,
    pub management_plane_info: Option<ManagementPlaneInfo>,
}

impl Configuration {
    pub fn rotated_token(&self) -> Result<&str> {
        required(
            self.token.as_ref().and_then(|t| t.token.as_deref()),
            "configuration.token.token",
        )
    }

    pub fn subject(&self) -> Option<&str> {
        self.certificate_signing_request_info
            .as_ref()
            .and_then(|info| info.subject.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn director_url(&self) -> Result<&str> {
        required(
            self.management_plane_info
                .as_ref()
                .and_then(|info| info.director_url.as_deref()),
            "managementPlaneInfo.directorURL",
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenHolder {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrInfo {
    pub subject: Option<String>,
    pub key_algorithm: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagementPlaneInfo {
    #[serde(rename = "directorURL")]
    pub director_url: Option<String>,
    #[serde(rename = "certificateSecuredConnectorURL")]
    pub certificate_secured_connector_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignCsrResult {
    pub result: SignedCertificates,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedCertificates {
    pub certificate_chain: Option<String>,
    pub ca_certificate: Option<String>,
    pub client_certificate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerResult {
    pub viewer: Viewer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Viewer {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub viewer_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationResult {
    pub application: Option<Application>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub eventing_configuration: Option<EventingConfiguration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventingConfiguration {
    #[serde(rename = "defaultURL")]
    pub default_url: Option<String>,
}

/// `{ result: { id } }`, the shape of every create mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedResult {
    pub result: Created,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Created {
    pub id: Option<String>,
}

impl CreatedResult {
    pub fn id(&self) -> Result<&str> {
        required(self.result.id.as_deref(), "result.id")
    }
}
