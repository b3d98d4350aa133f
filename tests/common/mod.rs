//! A mock platform speaking both connector protocols, backed by a test CA.
//! 同时支持两种连接器协议的模拟平台，由测试 CA 签发证书。

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, PublicKeyData, SignatureAlgorithm,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use x509_parser::prelude::{FromDer, X509CertificationRequest};
use x509_parser::public_key::PublicKey;

pub const SUBJECT: &str = "OU=OrgUnit,O=Organization,L=Waldorf,ST=Waldorf,C=DE,CN=orders-app,";
pub const ONE_TIME_TOKEN: &str = "one-time";
pub const ROTATED_TOKEN: &str = "rotated";
pub const APPLICATION_ID: &str = "app-1";
pub const PACKAGE_ID: &str = "pkg-1";

/// Public key lifted out of a CSR so the CA can sign it without the private half.
struct CsrPublicKey {
    der: Vec<u8>,
}

impl PublicKeyData for CsrPublicKey {
    fn der_bytes(&self) -> &[u8] {
        &self.der
    }

    fn algorithm(&self) -> &'static SignatureAlgorithm {
        &rcgen::PKCS_RSA_SHA256
    }
}

pub struct TestCa {
    key: KeyPair,
    params: CertificateParams,
    pem: String,
    der: Vec<u8>,
}

impl TestCa {
    pub fn new() -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "Mock Platform CA");
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let certificate = params.self_signed(&key).unwrap();
        let pem = certificate.pem();
        let der = certificate.der().to_vec();
        Self {
            key,
            params,
            pem,
            der,
        }
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Issues a server certificate for `dns_name`; returns its DER and the PKCS#8 key.
    pub fn issue_server(&self, dns_name: &str) -> (Vec<u8>, Vec<u8>) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![dns_name.to_string()]).unwrap();
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let issuer = Issuer::from_params(&self.params, &self.key);
        let certificate = params.signed_by(&key, &issuer).unwrap();
        (certificate.der().to_vec(), key.serialize_der())
    }

    /// Issues a client certificate for the CSR; returns the leaf and CA PEMs.
    pub fn issue(&self, csr_pem: &str) -> (String, String) {
        let block = pem::parse(csr_pem).unwrap();
        let (_, csr) = X509CertificationRequest::from_der(block.contents()).unwrap();
        let info = &csr.certification_request_info;

        let public_key = CsrPublicKey {
            der: info.subject_pki.subject_public_key.data.to_vec(),
        };

        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        let mut dn = DistinguishedName::new();
        for cn in info.subject.iter_common_name() {
            if let Ok(cn) = cn.as_str() {
                dn.push(DnType::CommonName, cn.to_string());
            }
        }
        params.distinguished_name = dn;
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        let issuer = Issuer::from_params(&self.params, &self.key);
        let leaf = params.signed_by(&public_key, &issuer).unwrap();
        (leaf.pem(), self.pem.clone())
    }
}

/// What the platform answers to a CSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issuance {
    /// A valid chain for the submitted key.
    Valid,
    /// Valid base64 that does not hold a certificate.
    Garbage,
    /// A certificate for some other key.
    ForeignKey,
    /// Bytes that are not base64 at all.
    Undecodable,
}

struct PlatformState {
    base: String,
    ca: TestCa,
    issuance: Mutex<Issuance>,
    subject: Mutex<Option<String>>,
    hits: AtomicUsize,
    registrations: Mutex<Vec<Value>>,
    events: Mutex<Vec<Value>>,
    connector_tokens: Mutex<Vec<String>>,
    csr_key_bits: Mutex<Vec<usize>>,
}

#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<PlatformState>,
}

impl MockPlatform {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(PlatformState {
            base,
            ca: TestCa::new(),
            issuance: Mutex::new(Issuance::Valid),
            subject: Mutex::new(Some(SUBJECT.to_string())),
            hits: AtomicUsize::new(0),
            registrations: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            connector_tokens: Mutex::new(Vec::new()),
            csr_key_bits: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/v1/applications/signingRequests/info", get(rest_token))
            .route("/v1/applications/certificates", post(rest_csr))
            .route("/v1/applications/management/info", get(rest_info))
            .route("/app/v1/metadata/services", post(rest_metadata))
            .route("/app/v1/events", post(publish_event))
            .route("/connector/graphql", post(graphql_connector))
            .route("/director/graphql", post(graphql_director))
            .route("/events", post(publish_event))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { state }
    }

    pub fn base(&self) -> &str {
        &self.state.base
    }

    /// The one-time URL handed to a REST application.
    pub fn rest_token_url(&self) -> String {
        format!(
            "{}/v1/applications/signingRequests/info?token={ONE_TIME_TOKEN}",
            self.state.base
        )
    }

    /// The base64 JSON payload handed to a GraphQL application.
    pub fn graphql_token(&self) -> String {
        STANDARD.encode(
            json!({
                "connectorURL": format!("{}/connector/graphql", self.state.base),
                "token": ONE_TIME_TOKEN,
            })
            .to_string(),
        )
    }

    pub fn set_issuance(&self, issuance: Issuance) {
        *self.state.issuance.lock().unwrap() = issuance;
    }

    pub fn set_subject(&self, subject: Option<&str>) {
        *self.state.subject.lock().unwrap() = subject.map(str::to_string);
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> Vec<Value> {
        self.state.registrations.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Value> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn connector_tokens(&self) -> Vec<String> {
        self.state.connector_tokens.lock().unwrap().clone()
    }

    /// Modulus sizes of the RSA keys in every CSR received so far.
    pub fn csr_key_bits(&self) -> Vec<usize> {
        self.state.csr_key_bits.lock().unwrap().clone()
    }

    pub fn ca(&self) -> &TestCa {
        &self.state.ca
    }
}

impl PlatformState {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    /// Base64 of whatever the current issuance mode hands out for `csr_pem`.
    fn issue(&self, csr_pem: &str) -> String {
        self.csr_key_bits.lock().unwrap().push(rsa_key_bits(csr_pem));
        match *self.issuance.lock().unwrap() {
            Issuance::Valid => {
                let (leaf, ca) = self.ca.issue(csr_pem);
                STANDARD.encode(format!("{leaf}{ca}"))
            }
            Issuance::Garbage => STANDARD.encode("this is not a certificate"),
            Issuance::ForeignKey => {
                let other = kyma_handshake::crypto::CsrGenerator::from_subject_str(SUBJECT, 2048)
                    .unwrap()
                    .generate()
                    .unwrap();
                let (leaf, ca) = self.ca.issue(&other.csr_pem);
                STANDARD.encode(format!("{leaf}{ca}"))
            }
            Issuance::Undecodable => "%%% not base64 %%%".to_string(),
        }
    }
}

fn rsa_key_bits(csr_pem: &str) -> usize {
    let block = pem::parse(csr_pem).unwrap();
    let (_, csr) = X509CertificationRequest::from_der(block.contents()).unwrap();
    match csr.certification_request_info.subject_pki.parsed().unwrap() {
        PublicKey::RSA(key) => rsa::BigUint::from_bytes_be(key.modulus).bits(),
        other => panic!("CSR carries a non-RSA key: {other:?}"),
    }
}

type Shared = State<Arc<PlatformState>>;

// --- REST ---

async fn rest_token(
    State(state): Shared,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.hit();
    if query.get("token").map(String::as_str) != Some(ONE_TIME_TOKEN) {
        return (StatusCode::FORBIDDEN, "invalid token").into_response();
    }
    let base = &state.base;
    let mut body = json!({
        "csrUrl": format!("{base}/v1/applications/certificates?token={ONE_TIME_TOKEN}"),
        "api": {
            "infoUrl": format!("{base}/v1/applications/management/info"),
            "eventsUrl": format!("{base}/app/v1/events"),
            "certificatesUrl": format!("{base}/v1/applications/certificates"),
        },
        "urls": {
            "metadataUrl": format!("{base}/app/v1/metadata/services"),
        },
    });
    if let Some(subject) = state.subject.lock().unwrap().clone() {
        body["certificate"] = json!({
            "subject": subject,
            "extensions": "",
            "key-algorithm": "rsa2048",
        });
    }
    Json(body).into_response()
}

async fn rest_csr(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit();
    let Some(csr) = body["csr"].as_str() else {
        return (StatusCode::BAD_REQUEST, "missing csr").into_response();
    };
    let csr_pem = String::from_utf8(STANDARD.decode(csr).unwrap()).unwrap();
    let chain = state.issue(&csr_pem);
    Json(json!({
        "crt": chain,
        "clientCrt": chain,
        "caCrt": STANDARD.encode(state.ca.pem()),
    }))
    .into_response()
}

async fn rest_info(State(state): Shared) -> Json<Value> {
    state.hit();
    let base = &state.base;
    Json(json!({
        "clientIdentity": { "application": "orders-app" },
        "urls": {
            "metadataUrl": format!("{base}/app/v1/metadata/services"),
            "eventsUrl": format!("{base}/app/v1/events"),
            "renewCertUrl": format!("{base}/v1/applications/certificates/renewals"),
            "revokeCertUrl": format!("{base}/v1/applications/certificates/revocations"),
        },
        "certificate": {
            "subject": SUBJECT,
            "extensions": "",
            "key-algorithm": "rsa2048",
        },
    }))
}

async fn rest_metadata(State(state): Shared, Json(body): Json<Value>) -> Json<Value> {
    state.hit();
    let mut registrations = state.registrations.lock().unwrap();
    registrations.push(body);
    Json(json!({ "id": format!("service-{}", registrations.len()) }))
}

async fn publish_event(State(state): Shared, Json(body): Json<Value>) -> Json<Value> {
    state.hit();
    let id = body["event-id"].clone();
    state.events.lock().unwrap().push(body);
    Json(json!({ "id": id }))
}

// --- GraphQL ---

fn graphql_errors(message: &str) -> Response {
    Json(json!({ "errors": [{ "message": message }] })).into_response()
}

async fn graphql_connector(
    State(state): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit();
    let query = body["query"].as_str().unwrap_or_default();
    let token = headers
        .get("connector-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.connector_tokens.lock().unwrap().push(token.clone());

    if query.contains("signCertificateSigningRequest") {
        if token != ROTATED_TOKEN {
            return graphql_errors("invalid connector token");
        }
        let csr = body["variables"]["csrBase64"].as_str().unwrap_or_default();
        let csr_pem = String::from_utf8(STANDARD.decode(csr).unwrap()).unwrap();
        let chain = state.issue(&csr_pem);
        return Json(json!({ "data": { "result": {
            "certificateChain": chain,
            "caCertificate": STANDARD.encode(state.ca.pem()),
            "clientCertificate": chain,
        }}}))
        .into_response();
    }

    if query.contains("configuration") {
        if token != ONE_TIME_TOKEN {
            return graphql_errors("invalid connector token");
        }
        let base = &state.base;
        let subject = state.subject.lock().unwrap().clone();
        return Json(json!({ "data": { "result": {
            "token": { "token": ROTATED_TOKEN },
            "certificateSigningRequestInfo": { "subject": subject, "keyAlgorithm": "rsa4096" },
            "managementPlaneInfo": {
                "directorURL": format!("{base}/director/graphql"),
                "certificateSecuredConnectorURL": format!("{base}/connector/graphql"),
            },
        }}}))
        .into_response();
    }

    graphql_errors("unknown operation")
}

async fn graphql_director(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit();
    let query = body["query"].as_str().unwrap_or_default();
    let variables = &body["variables"];

    let data = if query.contains("viewer") {
        json!({ "viewer": { "id": APPLICATION_ID, "type": "Application" } })
    } else if query.contains("eventingConfiguration") {
        if variables["appId"] != APPLICATION_ID {
            return graphql_errors("application not found");
        }
        json!({ "application": { "eventingConfiguration": {
            "defaultURL": format!("{}/events", state.base),
        }}})
    } else if query.contains("addPackage") {
        json!({ "result": { "id": PACKAGE_ID } })
    } else if query.contains("addAPIDefinitionToPackage")
        || query.contains("addEventDefinitionToPackage")
    {
        if variables["packageID"] != PACKAGE_ID {
            return graphql_errors("package not found");
        }
        let mut registrations = state.registrations.lock().unwrap();
        registrations.push(body.clone());
        json!({ "result": { "id": format!("definition-{}", registrations.len()) } })
    } else {
        return graphql_errors("unknown operation");
    };

    Json(json!({ "data": data })).into_response()
}

/// An assets directory holding the repository's canned spec documents.
pub fn assets_dir() -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/spec-docs");
    let target = temp.path().join("spec-docs");
    std::fs::create_dir_all(&target).unwrap();
    for entry in std::fs::read_dir(source).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), target.join(entry.file_name())).unwrap();
    }
    temp
}

pub fn certs_dir(assets: &Path) -> PathBuf {
    assets.join("kymacerts")
}
