//! The GraphQL flavour of the connector protocol.
//!
//! The token payload is base64 JSON naming the connector endpoint and a
//! one-time token. Redemption rotates that token; the rotated token then
//! authorises the CSR signing mutation. After that every call goes to the
//! director over mTLS, scoped to the application and the package created for
//! this connector.
//!
//! GraphQL 形式的连接器协议。令牌负载是 base64 编码的 JSON，包含连接器地址和
//! 一次性令牌。证书签发之后，所有调用都通过 mTLS 发送到 director。

use crate::error::{HandshakeError, Result};
use crate::protocol::graphql::{GraphQlRequest, execute};
use crate::protocol::message::{
    ApplicationResult, Configuration, ConfigurationResult, CreatedResult, GraphQlToken,
    SignCsrResult, ViewerResult, required,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

const CONFIGURATION_QUERY: &str = r#"
query {
    result: configuration {
        token { token }
        certificateSigningRequestInfo { subject keyAlgorithm }
        managementPlaneInfo { directorURL certificateSecuredConnectorURL }
    }
}"#;

const SIGN_CSR_MUTATION: &str = r#"
mutation ($csrBase64: String!) {
    result: signCertificateSigningRequest(csr: $csrBase64) {
        certificateChain
        caCertificate
        clientCertificate
    }
}"#;

const VIEWER_QUERY: &str = r#"
query {
    viewer { id type }
}"#;

const EVENTING_QUERY: &str = r#"
query ($appId: ID!) {
    application(id: $appId) {
        eventingConfiguration { defaultURL }
    }
}"#;

const ADD_PACKAGE_MUTATION: &str = r#"
mutation ($appID: ID!, $name: String!) {
    result: addPackage(applicationID: $appID, in: { name: $name }) { id }
}"#;

const ADD_API_DEFINITION_MUTATION: &str = r#"
mutation ($packageID: ID!, $apiSpec: CLOB!, $hostURL: String!) {
    result: addAPIDefinitionToPackage(
        packageID: $packageID
        in: {
            name: "Sample Order API"
            targetURL: $hostURL
            spec: { type: OPEN_API, format: YAML, data: $apiSpec }
            defaultAuth: {
                credential: { basic: { username: "user", password: "password" } }
            }
        }
    ) { id }
}"#;

const ADD_EVENT_DEFINITION_MUTATION: &str = r#"
mutation ($packageID: ID!, $eventSpec: CLOB!) {
    result: addEventDefinitionToPackage(
        packageID: $packageID
        in: {
            name: "Sample Order Event"
            spec: { type: ASYNC_API, format: YAML, data: $eventSpec }
        }
    ) { id }
}"#;

/// Name of the package API and event definitions are registered under.
pub const PACKAGE_NAME: &str = "Sample Order Package";

#[derive(Debug, Default)]
pub struct GraphQlConnector {
    connector_url: Option<String>,
    configuration: Option<Configuration>,
    application_id: Option<String>,
    events_url: Option<String>,
    package_id: Option<String>,
}

impl GraphQlConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    pub fn package_id(&self) -> Option<&str> {
        self.package_id.as_deref()
    }

    fn configuration(&self) -> Result<&Configuration> {
        self.configuration.as_ref().ok_or(HandshakeError::NoConnection)
    }

    /// Decodes the token payload and runs the configuration query with it.
    ///
    /// 解码令牌负载，并用其执行 configuration 查询。
    pub async fn redeem_token(&mut self, http: &Client, payload: &str) -> Result<String> {
        let token = decode_token(payload)?;
        let connector_url = required(token.connector_url.as_deref(), "connectorURL")
            .map_err(|_| HandshakeError::MalformedToken("connectorURL is missing".into()))?;
        let one_time_token = required(token.token.as_deref(), "token")
            .map_err(|_| HandshakeError::MalformedToken("token is missing".into()))?;
        debug!(url = connector_url, "redeeming connector token");

        let request = GraphQlRequest::new(CONFIGURATION_QUERY);
        let result: ConfigurationResult =
            execute(http, connector_url, Some(one_time_token), &request).await?;
        let configuration = result.result;
        configuration.rotated_token()?;

        let rendered = serde_json::to_string(&configuration)?;
        self.connector_url = Some(connector_url.to_string());
        self.configuration = Some(configuration);
        Ok(rendered)
    }

    /// Runs the signing mutation with the rotated token; returns the chain, still base64.
    pub async fn exchange_csr(&self, http: &Client, csr_pem: &str) -> Result<String> {
        let configuration = self.configuration()?;
        let connector_url = self
            .connector_url
            .as_deref()
            .ok_or(HandshakeError::NoConnection)?;

        let request =
            GraphQlRequest::new(SIGN_CSR_MUTATION).var("csrBase64", STANDARD.encode(csr_pem));
        let signed: SignCsrResult = execute(
            http,
            connector_url,
            Some(configuration.rotated_token()?),
            &request,
        )
        .await?;

        Ok(required(signed.result.certificate_chain.as_deref(), "certificateChain")?.to_string())
    }

    /// Resolves application id, eventing URL and package id, in that order.
    ///
    /// Each identifier is kept as soon as it arrives, so a later failure
    /// still leaves the earlier ones visible.
    ///
    /// 依次获取应用 ID、事件 URL 和包 ID。每个标识一到达就会被保存。
    pub async fn fetch_app_info(&mut self, tls: &Client) -> Result<String> {
        let director_url = self.configuration()?.director_url()?.to_string();

        let viewer: ViewerResult =
            execute(tls, &director_url, None, &GraphQlRequest::new(VIEWER_QUERY)).await?;
        let application_id = required(viewer.viewer.id.as_deref(), "viewer.id")?.to_string();
        info!(application_id = %application_id, "application resolved");
        self.application_id = Some(application_id.clone());

        let request = GraphQlRequest::new(EVENTING_QUERY).var("appId", application_id.as_str());
        let application: ApplicationResult = execute(tls, &director_url, None, &request).await?;
        let events_url = required(
            application
                .application
                .as_ref()
                .and_then(|app| app.eventing_configuration.as_ref())
                .and_then(|eventing| eventing.default_url.as_deref()),
            "application.eventingConfiguration.defaultURL",
        )?
        .to_string();
        self.events_url = Some(events_url.clone());

        let request = GraphQlRequest::new(ADD_PACKAGE_MUTATION)
            .var("appID", application_id.as_str())
            .var("name", PACKAGE_NAME);
        let package: CreatedResult = execute(tls, &director_url, None, &request).await?;
        let package_id = package.id()?.to_string();
        info!(package_id = %package_id, "package created");
        self.package_id = Some(package_id.clone());

        Ok(json!({
            "appId": application_id,
            "eventsUrl": events_url,
            "packageId": package_id,
        })
        .to_string())
    }

    pub async fn register_api_spec(
        &self,
        tls: &Client,
        spec: &[u8],
        host_url: &str,
    ) -> Result<String> {
        let (director_url, package_id) = self.application_context()?;
        let request = GraphQlRequest::new(ADD_API_DEFINITION_MUTATION)
            .var("packageID", package_id)
            .var("apiSpec", String::from_utf8_lossy(spec).into_owned())
            .var("hostURL", host_url);

        let created: CreatedResult = execute(tls, director_url, None, &request).await?;
        Ok(json!({ "id": created.id()? }).to_string())
    }

    pub async fn register_event_spec(&self, tls: &Client, spec: &[u8]) -> Result<String> {
        let (director_url, package_id) = self.application_context()?;
        let request = GraphQlRequest::new(ADD_EVENT_DEFINITION_MUTATION)
            .var("packageID", package_id)
            .var("eventSpec", String::from_utf8_lossy(spec).into_owned());

        let created: CreatedResult = execute(tls, director_url, None, &request).await?;
        Ok(json!({ "id": created.id()? }).to_string())
    }

    pub fn certificate_subject(&self) -> Option<&str> {
        self.configuration.as_ref().and_then(Configuration::subject)
    }

    /// The application's default eventing URL, known after `fetch_app_info`.
    pub fn event_url(&self) -> Option<&str> {
        self.events_url.as_deref()
    }

    fn application_context(&self) -> Result<(&str, &str)> {
        match (&self.application_id, &self.package_id) {
            (Some(_), Some(package_id)) => {
                Ok((self.configuration()?.director_url()?, package_id.as_str()))
            }
            _ => Err(HandshakeError::NoApplicationContext),
        }
    }
}

fn decode_token(payload: &str) -> Result<GraphQlToken> {
    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|e| HandshakeError::MalformedToken(e.to_string()))?;
    serde_json::from_slice(&decoded).map_err(|e| HandshakeError::MalformedToken(e.to_string()))
}
