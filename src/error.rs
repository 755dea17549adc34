use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Version;

/// JSON-RPC error codes as defined in the specification
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Reserved for implementation-defined server-errors.
    pub const SERVER_ERROR_START: i32 = -32000;
    pub const SERVER_ERROR_END: i32 = -32099;

    pub fn is_reserved(code: i32) -> bool {
        matches!(
            code,
            PARSE_ERROR | INVALID_REQUEST | METHOD_NOT_FOUND | INVALID_PARAMS | INTERNAL_ERROR
        ) || (SERVER_ERROR_END..=SERVER_ERROR_START).contains(&code)
    }
}

/// Errors produced anywhere along the engine: decoding, validation, dispatch,
/// transport, or configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Method {0} not found")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// An error carried verbatim from a JSON-RPC error object, either raised
    /// by a handler or decoded from a peer's response.
    #[error("{message}")]
    Protocol {
        message: String,
        code: i32,
        version: Version,
    },

    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn code(&self) -> i32 {
        match self {
            Error::Parse(_) => error_codes::PARSE_ERROR,
            Error::InvalidRequest(_) | Error::InvalidResponse(_) => error_codes::INVALID_REQUEST,
            Error::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            Error::InvalidParams(_) => error_codes::INVALID_PARAMS,
            Error::Internal(_) => error_codes::INTERNAL_ERROR,
            Error::Protocol { code, .. } => *code,
            Error::Transport(_) => error_codes::INTERNAL_ERROR,
            Error::Config(_) => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::Parse(msg) => msg.clone(),
            Error::InvalidRequest(msg) => msg.clone(),
            Error::InvalidResponse(msg) => msg.clone(),
            Error::MethodNotFound(name) => format!("Method {name} not found"),
            Error::InvalidParams(msg) => msg.clone(),
            Error::Internal(msg) => msg.clone(),
            Error::Protocol { message, .. } => message.clone(),
            Error::Transport(inner) => inner.to_string(),
            Error::Config(msg) => msg.clone(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub fn transport<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Error::Transport(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The wire shape of a JSON-RPC error object (`{"code": ..., "message": ..., "data": ...}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<&Error> for ErrorObject {
    fn from(err: &Error) -> Self {
        ErrorObject {
            code: err.code(),
            message: err.message(),
            data: None,
        }
    }
}
