//! `verifyMethodCall`-equivalent structural validation: checks that a raw
//! envelope has a well-typed method, params, id, and jsonrpc member, without
//! yet knowing whether the method exists or its arguments bind correctly.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{Params, RawEnvelope, ValidatedCall};

/// Validates the structural shape of a request. Does not check that the
/// method exists or that params match the handler's signature -- that is
/// the dispatcher's job, so that argument-binding errors can carry their own
/// distinct messages (see `dispatch.rs`).
pub fn verify_method_call(raw: &RawEnvelope) -> Result<ValidatedCall> {
    let method = match &raw.method {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(Error::InvalidRequest("method must not be empty".into()))
        }
        _ => return Err(Error::InvalidRequest("Invalid method type".into())),
    };

    let params = match &raw.params {
        None => None,
        Some(Value::Array(a)) => Some(Params::Positional(a.clone())),
        Some(Value::Object(m)) => Some(Params::Named(m.clone())),
        Some(_) => return Err(Error::InvalidRequest("invalid params type".into())),
    };

    if raw.jsonrpc.is_some() {
        crate::protocol::validate_version(raw.jsonrpc.as_ref())?;
    }

    if let Some(id) = &raw.id {
        match id {
            Value::Number(_) | Value::String(_) | Value::Null => {}
            _ => return Err(Error::InvalidRequest("invalid id type".into())),
        }
    }

    Ok(ValidatedCall { method, params })
}
