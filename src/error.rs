//! Error type shared by every DingTalk and mail operation.

use thiserror::Error;

/// The single error kind surfaced by this crate.
///
/// `Display` always yields a human-readable message; platform messages are
/// carried verbatim. The variants only let callers tell failure classes apart.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid AppKey or AppSecret")]
    InvalidCredential,

    /// The token endpoint rejected the credential.
    #[error("{0}")]
    Auth(String),

    /// An authenticated endpoint answered with a non-zero errcode.
    #[error("{0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to decode DingTalk response: {0}")]
    Decode(String),

    /// A recipient that is not a valid mailbox; caller input, not a relay failure.
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("mail error: {0}")]
    Mail(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for MessageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for MessageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<lettre::message::header::ContentTypeErr> for MessageError {
    fn from(err: lettre::message::header::ContentTypeErr) -> Self {
        Self::Mail(err.to_string())
    }
}

impl From<lettre::error::Error> for MessageError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Mail(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for MessageError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Mail(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MessageError>;
