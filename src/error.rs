use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`HandshakeError`].
///
/// Callers that only need to know *what kind* of thing went wrong (for example to
/// choose a status code) match on this instead of on the individual variants.
///
/// [`HandshakeError`] 的粗粒度分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unparseable subject, token payload, or document.
    MalformedInput,
    /// Key or CSR generation failed.
    Generation,
    /// Transport failure on an HTTP or GraphQL call.
    Network,
    /// The platform answered, but not with what the handshake needs.
    Protocol,
    /// An authenticated step was attempted before the mTLS client exists.
    NoSecureChannel,
    /// Certificate material could not be read, written, or loaded.
    Persistence,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("invalid certificate subject format: {0}")]
    InvalidSubjectFormat(String),

    #[error("malformed token payload: {0}")]
    MalformedToken(String),

    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid specification document: {0}")]
    InvalidSpecDocument(String),

    #[error("RSA key generation failed: {0}")]
    KeyGeneration(#[from] rsa::Error),

    #[error("private key encoding failed: {0}")]
    KeyEncoding(#[from] rsa::pkcs8::Error),

    #[error("PKCS#1 key encoding failed: {0}")]
    Pkcs1(#[from] rsa::pkcs1::Error),

    #[error("certificate request generation failed: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("key generation task did not complete: {0}")]
    GenerationTask(#[from] tokio::task::JoinError),

    #[error("request to the platform failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("could not build the mTLS client: {0}")]
    Tls(#[source] reqwest::Error),

    #[error("unexpected platform response: {0}")]
    Protocol(String),

    #[error("GraphQL request returned errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("required configuration is missing: {0}")]
    MissingConfiguration(&'static str),

    #[error("no application context has been resolved, fetch the app info first")]
    NoApplicationContext,

    #[error("the platform did not supply a certificate subject")]
    MissingCertificateSubject,

    #[error("no connection has been established, redeem a token first")]
    NoConnection,

    #[error("no TLS connection established")]
    NoSecureChannel,

    #[error("could not access {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the issued certificate does not match the private key")]
    KeyMismatch,

    #[error("invalid certificate material: {0}")]
    InvalidCertificate(String),

    /// The platform returned certificate bytes that are not valid base64.
    ///
    /// Persisting them would leave garbage trust material on disk, so this
    /// is one of the two conditions the process treats as fatal.
    ///
    /// 平台返回的证书字节不是合法的 base64。这是进程视为致命的两种情况之一。
    #[error("platform returned an undecodable certificate: {0}")]
    UndecodableCertificate(#[source] base64::DecodeError),
}

impl HandshakeError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HandshakeError::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        HandshakeError::Protocol(message.into())
    }

    /// Maps the error onto the handshake's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandshakeError::InvalidSubjectFormat(_)
            | HandshakeError::MalformedToken(_)
            | HandshakeError::Json(_)
            | HandshakeError::InvalidSpecDocument(_) => ErrorKind::MalformedInput,
            HandshakeError::KeyGeneration(_)
            | HandshakeError::KeyEncoding(_)
            | HandshakeError::Pkcs1(_)
            | HandshakeError::Generation(_)
            | HandshakeError::GenerationTask(_) => ErrorKind::Generation,
            HandshakeError::Network(_) | HandshakeError::Tls(_) => ErrorKind::Network,
            HandshakeError::Protocol(_)
            | HandshakeError::GraphQl(_)
            | HandshakeError::MissingConfiguration(_)
            | HandshakeError::NoApplicationContext
            | HandshakeError::MissingCertificateSubject
            | HandshakeError::NoConnection => ErrorKind::Protocol,
            HandshakeError::NoSecureChannel => ErrorKind::NoSecureChannel,
            HandshakeError::Persistence { .. }
            | HandshakeError::KeyMismatch
            | HandshakeError::InvalidCertificate(_)
            | HandshakeError::UndecodableCertificate(_) => ErrorKind::Persistence,
        }
    }

    /// Whether the process should stop instead of reporting this error.
    ///
    /// 进程是否应当终止，而不是仅仅报告此错误。
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandshakeError::UndecodableCertificate(_))
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(
            HandshakeError::InvalidSubjectFormat("x".into()).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(HandshakeError::NoSecureChannel.kind(), ErrorKind::NoSecureChannel);
        assert_eq!(HandshakeError::NoApplicationContext.kind(), ErrorKind::Protocol);
        assert_eq!(
            HandshakeError::MissingConfiguration("metadataUrl").kind(),
            ErrorKind::Protocol
        );
        assert_eq!(HandshakeError::KeyMismatch.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_only_undecodable_certificate_is_fatal() {
        let decode_err = base64::engine::general_purpose::STANDARD
            .decode("not base64!")
            .unwrap_err();
        assert!(HandshakeError::UndecodableCertificate(decode_err).is_fatal());
        assert!(!HandshakeError::KeyMismatch.is_fatal());
        assert!(!HandshakeError::NoSecureChannel.is_fatal());
    }

    #[test]
    fn test_graphql_errors_are_joined() {
        let err = HandshakeError::GraphQl(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "GraphQL request returned errors: first; second");
    }
}
