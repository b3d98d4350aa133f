//! The onboarding handshake with the platform.
//!
//! A [`Handshake`] is one session. It walks, strictly forward, through
//! token redemption, the secure channel (CSR, certificate, mTLS client),
//! application info and spec registration. Each step is an `async` method;
//! a failed step leaves the session where it was and the caller re-invokes it.
//!
//! 与平台之间的接入握手。一个 [`Handshake`] 就是一个会话，严格按顺序推进：
//! 兑换令牌、建立安全通道（CSR、证书、mTLS 客户端）、获取应用信息、注册规范。

use crate::config::Config;
use crate::connector::Connector;
use crate::error::Result;
use crate::protocol::{ConnectionStatus, ConnectionType, HandshakeStep};
use reqwest::Client;
use std::path::PathBuf;

mod redeem;
mod registration;
mod secure_channel;
pub mod store;
pub mod tls;

pub use store::{CertStore, SpecKind};

/// One onboarding session.
///
/// 一个接入会话。
#[derive(Debug)]
pub struct Handshake {
    config: Config,
    /// Plain client for the token and CSR calls.
    ///
    /// 用于令牌和 CSR 调用的普通客户端。
    http: Client,
    store: CertStore,
    /// Holds the REST management info document.
    details_dir: PathBuf,
    /// Protocol strategy chosen at redemption; owns all platform response state.
    ///
    /// 在兑换令牌时选定的协议策略，持有所有平台响应状态。
    connector: Option<Connector>,
    /// The mTLS client, present only while the secure channel is up.
    ///
    /// mTLS 客户端，仅在安全通道建立后存在。
    tls_client: Option<Client>,
    status: ConnectionStatus,
    step: HandshakeStep,
}

impl Handshake {
    /// A fresh session writing certificate material to `config.certs_dir()`
    /// and the REST info document to the assets directory.
    pub fn new(config: Config) -> Result<Self> {
        let store = CertStore::new(config.certs_dir());
        let details_dir = config.assets_dir.clone();
        Self::with_store(config, store, details_dir)
    }

    /// A fresh session keeping everything it writes under `cert_dir`.
    ///
    /// 一个新会话，所有写入的文件都位于 `cert_dir` 下。
    pub fn with_cert_dir(config: Config, cert_dir: impl Into<PathBuf>) -> Result<Self> {
        let cert_dir = cert_dir.into();
        Self::with_store(config, CertStore::new(cert_dir.clone()), cert_dir)
    }

    fn with_store(config: Config, store: CertStore, details_dir: PathBuf) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            config,
            http,
            store,
            details_dir,
            connector: None,
            tls_client: None,
            status: ConnectionStatus::NotConnected,
            step: HandshakeStep::Idle,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cert_store(&self) -> &CertStore {
        &self.store
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn step(&self) -> HandshakeStep {
        self.step
    }

    /// `None` until a token has been redeemed.
    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.connector.as_ref().map(Connector::connection_type)
    }

    pub fn connector(&self) -> Option<&Connector> {
        self.connector.as_ref()
    }

    /// Where domain events are published, once the platform has told us.
    pub fn event_url(&self) -> Option<&str> {
        self.connector.as_ref().and_then(Connector::event_url)
    }

    pub fn tls_client(&self) -> Option<&Client> {
        self.tls_client.as_ref()
    }

    /// Moves `step` forward, never back.
    fn advance(&mut self, step: HandshakeStep) {
        self.step = self.step.max(step);
    }

    /// Drops the mTLS client and marks the session disconnected.
    fn disconnect(&mut self) {
        self.tls_client = None;
        self.status = ConnectionStatus::NotConnected;
    }
}
