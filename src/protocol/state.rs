//! Defines the states and observable flags of the onboarding handshake.
//!
//! The handshake moves strictly forward through [`HandshakeStep`]; a failed
//! step leaves the session where it was and the caller re-invokes it.
//!
//! 定义接入握手的各个状态和可观察标志。握手只会向前推进；失败的步骤
//! 会让会话停留在原处，由调用方重新调用。

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::fmt;

/// Which wire protocol the platform speaks for this handshake.
///
/// Chosen once, from the shape of the token payload, and fixed afterwards.
///
/// 平台在本次握手中使用的协议。根据令牌负载的形状确定一次，之后不再改变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionType {
    Rest,
    GraphQl,
}

impl ConnectionType {
    /// Sniffs the token payload.
    ///
    /// A payload that is standard base64 wrapping a JSON object is a GraphQL
    /// connector token; anything else (normally a bare one-time URL) is REST.
    ///
    /// 探测令牌负载：若为包裹 JSON 对象的标准 base64，则为 GraphQL；否则为 REST。
    pub fn detect(payload: &str) -> Self {
        let decoded = match STANDARD.decode(payload.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return ConnectionType::Rest,
        };
        match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&decoded) {
            Ok(_) => ConnectionType::GraphQl,
            Err(_) => ConnectionType::Rest,
        }
    }

    /// RSA modulus size used for this protocol's client key.
    pub fn key_length(self) -> usize {
        match self {
            ConnectionType::Rest => 2048,
            ConnectionType::GraphQl => 4096,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Rest => f.write_str("REST"),
            ConnectionType::GraphQl => f.write_str("GraphQL"),
        }
    }
}

/// Whether a usable mTLS client exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionStatus {
    #[default]
    NotConnected,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::NotConnected => f.write_str("Not Connected"),
            ConnectionStatus::Connected => f.write_str("Connected"),
        }
    }
}

/// How far a session has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum HandshakeStep {
    /// No token redeemed.
    #[default]
    Idle,
    /// A protocol strategy is selected and holds the platform's connection data.
    TokenRedeemed,
    /// The platform signed our CSR; key and chain are on disk.
    CertificateIssued,
    /// The mTLS client was built from the persisted material.
    SecureChannelEstablished,
    /// Application and eventing identifiers are known.
    AppInfoFetched,
    /// At least one specification document was registered.
    SpecsRegistered,
}
