//! Wire-level pieces: the state enums, response schemas and transports.

pub mod graphql;
pub(crate) mod http;
pub mod message;
pub mod state;

pub use state::{ConnectionStatus, ConnectionType, HandshakeStep};
