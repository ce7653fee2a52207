//! Error types for Portex

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown transform: {0}")]
    UnknownTransform(String),

    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid configuration for '{key}': {reason}")]
    InvalidConfiguration { key: String, reason: String },

    #[error("name collision: {0}")]
    NameCollision(String),

    #[error("unresolvable reference: {0}")]
    UnresolvableReference(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("registration error: {0}")]
    Registration(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_param(key: impl Into<String>) -> Self {
        Self::invalid_config(key, "required parameter is missing")
    }

    /// Stable classification used in response-level errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTransform(_) => ErrorKind::UnknownTransform,
            Self::UnknownCodec(_) => ErrorKind::UnknownCodec,
            Self::MalformedPayload(_) => ErrorKind::MalformedPayload,
            Self::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
            Self::NameCollision(_) => ErrorKind::NameCollision,
            Self::UnresolvableReference(_) => ErrorKind::UnresolvableReference,
            // An unparseable request envelope is a payload problem from the caller's side.
            Self::InvalidRequest(_) | Self::JsonError(_) => ErrorKind::InvalidRequest,
            Self::Registration(_) | Self::IoError(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Error classification carried across the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownTransform,
    UnknownCodec,
    MalformedPayload,
    InvalidConfiguration,
    NameCollision,
    UnresolvableReference,
    InvalidRequest,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownTransform => "UnknownTransform",
            Self::UnknownCodec => "UnknownCodec",
            Self::MalformedPayload => "MalformedPayload",
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::NameCollision => "NameCollision",
            Self::UnresolvableReference => "UnresolvableReference",
            Self::InvalidRequest => "InvalidRequest",
            Self::Internal => "Internal",
        };
        write!(f, "{}", s)
    }
}
