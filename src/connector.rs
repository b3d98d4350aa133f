//! Protocol strategies for talking to the platform.
//!
//! Both flavours expose the same capability set through [`Connector`], so the
//! handshake never branches on which one is active.
//!
//! 与平台通信的协议策略。两种形式通过 [`Connector`] 暴露相同的能力集合，
//! 握手流程无需关心当前使用的是哪一种。

use crate::error::Result;
use crate::protocol::ConnectionType;
use reqwest::Client;

pub mod graphql;
pub mod rest;

pub use graphql::GraphQlConnector;
pub use rest::RestConnector;

#[derive(Debug)]
pub enum Connector {
    Rest(RestConnector),
    GraphQl(GraphQlConnector),
}

impl Connector {
    /// An empty strategy for `connection_type`; nothing is known until
    /// [`Connector::redeem_token`] succeeds.
    pub fn new(connection_type: ConnectionType) -> Self {
        match connection_type {
            ConnectionType::Rest => Connector::Rest(RestConnector::new()),
            ConnectionType::GraphQl => Connector::GraphQl(GraphQlConnector::new()),
        }
    }

    /// Picks the strategy from the shape of the token payload.
    pub fn for_payload(payload: &str) -> Self {
        Self::new(ConnectionType::detect(payload))
    }

    pub fn connection_type(&self) -> ConnectionType {
        match self {
            Connector::Rest(_) => ConnectionType::Rest,
            Connector::GraphQl(_) => ConnectionType::GraphQl,
        }
    }

    pub fn key_length(&self) -> usize {
        self.connection_type().key_length()
    }

    pub async fn redeem_token(&mut self, http: &Client, payload: &str) -> Result<String> {
        match self {
            Connector::Rest(c) => c.redeem_token(http, payload).await,
            Connector::GraphQl(c) => c.redeem_token(http, payload).await,
        }
    }

    pub async fn exchange_csr(&self, http: &Client, csr_pem: &str) -> Result<String> {
        match self {
            Connector::Rest(c) => c.exchange_csr(http, csr_pem).await,
            Connector::GraphQl(c) => c.exchange_csr(http, csr_pem).await,
        }
    }

    pub async fn fetch_app_info(&mut self, tls: &Client) -> Result<String> {
        match self {
            Connector::Rest(c) => c.fetch_app_info(tls).await,
            Connector::GraphQl(c) => c.fetch_app_info(tls).await,
        }
    }

    pub async fn register_api_spec(
        &self,
        tls: &Client,
        spec: &[u8],
        host_url: &str,
    ) -> Result<String> {
        match self {
            Connector::Rest(c) => c.register_api_spec(tls, spec, host_url).await,
            Connector::GraphQl(c) => c.register_api_spec(tls, spec, host_url).await,
        }
    }

    pub async fn register_event_spec(&self, tls: &Client, spec: &[u8]) -> Result<String> {
        match self {
            Connector::Rest(c) => c.register_event_spec(tls, spec).await,
            Connector::GraphQl(c) => c.register_event_spec(tls, spec).await,
        }
    }

    pub fn certificate_subject(&self) -> Option<&str> {
        match self {
            Connector::Rest(c) => c.certificate_subject(),
            Connector::GraphQl(c) => c.certificate_subject(),
        }
    }

    pub fn event_url(&self) -> Option<&str> {
        match self {
            Connector::Rest(c) => c.event_url(),
            Connector::GraphQl(c) => c.event_url(),
        }
    }
}
