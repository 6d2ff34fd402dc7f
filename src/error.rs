use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way handling a notification can fail. All variants are terminal for
/// the current call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("unknown payload type: {0:?}")]
    UnrecognizedType(String),

    #[error("unknown notification type: {0:?}")]
    UnrecognizedNotificationKind(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed base64 signature: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("the decoded PEM file was empty")]
    EmptyPem,

    #[error("failed to parse certificate: {0}")]
    Certificate(String),

    #[error("certificate does not carry an RSA public key: {0}")]
    PublicKey(String),

    #[error("expected a <{expected}> acknowledgment, got {found:?}")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },

    #[error("malformed XML acknowledgment: {0}")]
    Xml(#[from] quick_xml::DeError),
}

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("payload does not have a {0}")]
    MissingUrl(&'static str),

    #[error("invalid {0}: {1}")]
    InvalidUrl(&'static str, url::ParseError),

    #[error("url should be using https, got {0:?}")]
    InsecureScheme(String),

    #[error("certificate is located on an invalid domain: {0:?}")]
    UntrustedDomain(String),

    #[error("signature does not match the signing certificate")]
    SignatureMismatch,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("bucket and key or mime content are required")]
    MissingLocation,

    #[error("object s3://{bucket}/{key} not found")]
    ObjectNotFound { bucket: String, key: String },

    #[error("object key s3://{bucket}/{key} escapes the object store")]
    InvalidObjectKey { bucket: String, key: String },

    #[error("failed to parse MIME content: {0}")]
    Mime(String),
}

/// Coarse classification of an [`Error`], for callers translating failures
/// into protocol responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Trust,
    Transport,
    Content,
    UnrecognizedType,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Decode(_) => ErrorKind::Decode,
            Error::Trust(_) => ErrorKind::Trust,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Content(_) => ErrorKind::Content,
            Error::UnrecognizedType(_) | Error::UnrecognizedNotificationKind(_) => {
                ErrorKind::UnrecognizedType
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(DecodeError::Json(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_unknown_types() {
        let outer = Error::UnrecognizedType("Foo".to_string());
        let inner = Error::UnrecognizedNotificationKind("Bar".to_string());
        assert_eq!(outer.kind(), ErrorKind::UnrecognizedType);
        assert_eq!(inner.kind(), ErrorKind::UnrecognizedType);
        assert_ne!(outer.to_string(), inner.to_string());
    }

    #[test]
    fn test_messages_name_the_cause() {
        let err: Error = TrustError::UntrustedDomain("evil.example.com".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Trust);
        assert!(err.to_string().contains("invalid domain"));

        let err: Error = ContentError::MissingLocation.into();
        assert_eq!(err.kind(), ErrorKind::Content);
        assert!(err.to_string().contains("bucket and key"));
    }
}
