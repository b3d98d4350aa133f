//! The REST flavour of the connector protocol.
//!
//! The token is a bare one-time URL. Everything the later steps need is in
//! the JSON document behind it; the management info fetched over mTLS may
//! refresh some of those URLs.
//!
//! REST 形式的连接器协议。令牌是一个一次性 URL。

use crate::error::{HandshakeError, Result};
use crate::protocol::http::{decode, read_json, read_text};
use crate::protocol::message::{CsrRequest, CsrResponse, RestConnectionInfo, RestManagementInfo};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct RestConnector {
    info: Option<RestConnectionInfo>,
}

impl RestConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection data captured at redemption, if any.
    pub fn connection_info(&self) -> Option<&RestConnectionInfo> {
        self.info.as_ref()
    }

    fn info(&self) -> Result<&RestConnectionInfo> {
        self.info.as_ref().ok_or(HandshakeError::NoConnection)
    }

    /// GETs the one-time URL and keeps the connection data it returns.
    ///
    /// 请求一次性 URL 并保存其返回的连接数据。
    pub async fn redeem_token(&mut self, http: &Client, token_url: &str) -> Result<String> {
        let token_url = token_url.trim();
        if token_url.is_empty() {
            return Err(HandshakeError::MalformedToken("empty token URL".into()));
        }
        debug!(url = token_url, "redeeming one-time token");

        let body = read_text(http.get(token_url).send().await?).await?;
        let info: RestConnectionInfo = decode(&body, token_url)?;
        info.csr_url()?;

        self.info = Some(info);
        Ok(body)
    }

    /// Posts the base64 CSR and returns the certificate chain, still base64.
    pub async fn exchange_csr(&self, http: &Client, csr_pem: &str) -> Result<String> {
        let csr_url = self.info()?.csr_url()?;
        let csr = STANDARD.encode(csr_pem);

        let response = http
            .post(csr_url)
            .json(&CsrRequest { csr: &csr })
            .send()
            .await?;
        let certificates: CsrResponse = read_json(response).await?;
        Ok(certificates.certificate_chain()?.to_string())
    }

    /// GETs the management info over mTLS and returns it verbatim.
    pub async fn fetch_app_info(&mut self, tls: &Client) -> Result<String> {
        let info = self.info.as_mut().ok_or(HandshakeError::NoConnection)?;
        let info_url = info.info_url()?.to_string();

        let body = read_text(tls.get(&info_url).send().await?).await?;
        let management: RestManagementInfo = decode(&body, &info_url)?;
        if let Some(application) = management
            .client_identity
            .as_ref()
            .and_then(|identity| identity.application.as_deref())
        {
            info!(application, "application identity resolved");
        }
        info.merge_management_info(management);

        Ok(body)
    }

    pub async fn register_api_spec(
        &self,
        tls: &Client,
        spec: &[u8],
        host_url: &str,
    ) -> Result<String> {
        let metadata_url = self.metadata_url()?;
        let document = with_target_url(spec, host_url)?;
        self.post_document(tls, metadata_url, document).await
    }

    pub async fn register_event_spec(&self, tls: &Client, spec: &[u8]) -> Result<String> {
        let metadata_url = self.metadata_url()?;
        self.post_document(tls, metadata_url, spec.to_vec()).await
    }

    pub fn certificate_subject(&self) -> Option<&str> {
        self.info.as_ref().and_then(RestConnectionInfo::subject)
    }

    pub fn event_url(&self) -> Option<&str> {
        self.info.as_ref().and_then(RestConnectionInfo::events_url)
    }

    fn metadata_url(&self) -> Result<&str> {
        self.info()?
            .metadata_url()
            .ok_or(HandshakeError::MissingConfiguration("metadataUrl"))
    }

    async fn post_document(&self, tls: &Client, url: &str, document: Vec<u8>) -> Result<String> {
        debug!(url, bytes = document.len(), "registering specification");
        let response = tls
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(document)
            .send()
            .await?;
        read_text(response).await
    }
}

/// Sets `api.targetUrl` in a JSON spec document, creating `api` if needed.
fn with_target_url(spec: &[u8], host_url: &str) -> Result<Vec<u8>> {
    let mut document: Value = serde_json::from_slice(spec)?;
    let root = document.as_object_mut().ok_or_else(|| {
        HandshakeError::InvalidSpecDocument("API spec must be a JSON object".into())
    })?;

    let api = root
        .entry("api")
        .or_insert_with(|| Value::Object(Map::new()));
    if !api.is_object() {
        *api = Value::Object(Map::new());
    }
    api["targetUrl"] = Value::String(host_url.to_string());

    Ok(serde_json::to_vec(&document)?)
}
