//! Application Connector onboarding handshake.
//!
//! Turns a one-time token into a mutually-authenticated HTTP client and uses
//! it to register an application's API and event specifications with the
//! platform. The platform speaks one of two protocols (REST or GraphQL),
//! chosen from the shape of the token.
//!
//! 应用连接器接入握手：把一次性令牌变成双向认证的 HTTP 客户端，
//! 并用它向平台注册应用的 API 和事件规范。

pub mod config;
pub mod connector;
pub mod crypto;
pub mod error;
pub mod event;
pub mod handshake;
pub mod protocol;
pub mod session;
pub mod subject;

pub use config::Config;
pub use error::{ErrorKind, HandshakeError, Result};
pub use handshake::Handshake;
pub use session::{SessionId, SessionRegistry};
