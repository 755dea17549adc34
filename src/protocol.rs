//! Wire-level codec: request/response envelopes, id and version handling,
//! and the encode/decode functions used by both the server and the client.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorObject, Result};

/// Which dialect a request or response is rendered in.
///
/// V1 omits the `jsonrpc` member entirely and always serializes both
/// `result` and `error` keys (one of them `null`). V2 includes
/// `"jsonrpc": "2.0"` and omits whichever of `result`/`error` is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

/// A JSON-RPC id: a string, an integer, or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Null,
    Number(i64),
    String(String),
}

impl Id {
    pub fn to_display_string(&self) -> String {
        match self {
            Id::Null => "null".to_string(),
            Id::Number(n) => n.to_string(),
            Id::String(s) => s.clone(),
        }
    }
}

/// Call parameters: either a positional array or a named object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

/// The raw, unvalidated shape of whatever JSON object arrived on the wire.
/// Every field is individually optional so presence/absence and type can be
/// inspected by the validator before any semantic meaning is assigned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnvelope {
    pub method: Option<Value>,
    pub params: Option<Value>,
    pub id: Option<Value>,
    pub jsonrpc: Option<Value>,
}

/// A method call that has passed validation: a method name and normalized
/// params, stripped of id/version concerns (those are handled separately so
/// that even invalid requests can still be answered with the right shape).
#[derive(Debug, Clone)]
pub struct ValidatedCall {
    pub method: String,
    pub params: Option<Params>,
}

/// A rendered JSON-RPC response, in either dialect.
#[derive(Debug, Clone)]
pub enum Response {
    V1 {
        id: Id,
        result: Option<Value>,
        error: Option<ErrorObject>,
    },
    V2 {
        id: Id,
        result: Option<Value>,
        error: Option<ErrorObject>,
    },
}

impl Response {
    pub fn success(id: Id, version: Version, value: Value) -> Self {
        match version {
            Version::V1 => Response::V1 {
                id,
                result: Some(value),
                error: None,
            },
            Version::V2 => Response::V2 {
                id,
                result: Some(value),
                error: None,
            },
        }
    }

    pub fn error(id: Id, version: Version, error: ErrorObject) -> Self {
        match version {
            Version::V1 => Response::V1 {
                id,
                result: None,
                error: Some(error),
            },
            Version::V2 => Response::V2 {
                id,
                result: None,
                error: Some(error),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            Response::V1 { error, .. } | Response::V2 { error, .. } => error.is_some(),
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match self {
            Response::V1 { id, result, error } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("result", result)?;
                map.serialize_entry("error", error)?;
                map.serialize_entry("id", id)?;
                map.end()
            }
            Response::V2 { id, result, error } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("jsonrpc", "2.0")?;
                match (result, error) {
                    (Some(r), None) => map.serialize_entry("result", r)?,
                    (None, Some(e)) => map.serialize_entry("error", e)?,
                    (None, None) => {}
                    (Some(_), Some(_)) => unreachable!("response carries only one of result/error"),
                }
                map.serialize_entry("id", id)?;
                map.end()
            }
        }
    }
}

/// Builds the final response object for a call outcome, or `None` if this
/// was a notification (no id) and therefore must never produce a response.
pub fn prepare_method_response(
    outcome: Result<Value>,
    id: Option<Id>,
    version: Version,
) -> Option<Response> {
    let id = id?;
    Some(match outcome {
        Ok(value) => Response::success(id, version, value),
        Err(err) => Response::error(id, version, ErrorObject::from(&err)),
    })
}

/// Monotonic fallback id source for ad hoc [`encode_request`] calls that
/// don't supply one. The HTTP client proxy keeps its own per-instance
/// counter rather than sharing this one (see `client.rs`).
static NEXT_ID: AtomicI64 = AtomicI64::new(1);

/// Encodes a JSON-RPC request. `version` selects the dialect: `Some(v)` with
/// `v >= 2.0` renders `"jsonrpc": "2.0"`; anything else (including `None`)
/// omits the member, producing a 1.0-style request.
pub fn encode_request(
    method: &str,
    params: Option<Params>,
    id: Option<Id>,
    version: Option<f64>,
) -> Result<Vec<u8>> {
    if method.is_empty() {
        return Err(Error::InvalidRequest("method must not be empty".into()));
    }
    let id = id.unwrap_or_else(|| Id::Number(NEXT_ID.fetch_add(1, Ordering::Relaxed)));

    let mut map = Map::new();
    map.insert("method".to_string(), Value::String(method.to_string()));
    if let Some(params) = params {
        map.insert(
            "params".to_string(),
            serde_json::to_value(params).map_err(|e| Error::Internal(e.to_string()))?,
        );
    }
    map.insert(
        "id".to_string(),
        serde_json::to_value(&id).map_err(|e| Error::Internal(e.to_string()))?,
    );
    if matches!(version, Some(v) if v == 2.0) {
        map.insert("jsonrpc".to_string(), Value::String("2.0".to_string()));
    }

    serde_json::to_vec(&Value::Object(map)).map_err(|e| Error::Internal(e.to_string()))
}

/// Decodes a request body into its raw, unvalidated shape. This never
/// performs semantic validation -- see [`crate::validator::verify_method_call`].
pub fn decode_request(bytes: &[u8]) -> Result<RawEnvelope> {
    if bytes.is_empty() {
        return Err(Error::Parse("empty request body".into()));
    }
    serde_json::from_slice(bytes).map_err(|e| Error::Parse(e.to_string()))
}

/// Parses a raw response body and extracts its result, following the rules:
/// neither `result` nor `error` present is invalid; both present with
/// non-null values is invalid (ambiguous); a non-null `error` wins over a
/// null `result`; otherwise the (possibly null) result is returned.
pub fn decode_response(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Err(Error::Parse("empty response body".into()));
    }
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| Error::Parse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidResponse("response is not a JSON object".into()))?;

    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");
    if !has_result && !has_error {
        return Err(Error::InvalidResponse(
            "response contains neither result nor error".into(),
        ));
    }

    let result_value = obj.get("result").cloned().unwrap_or(Value::Null);
    let error_value = obj.get("error").cloned().unwrap_or(Value::Null);
    let result_active = has_result && !result_value.is_null();
    let error_active = has_error && !error_value.is_null();

    if result_active && error_active {
        return Err(Error::InvalidResponse(
            "response contains both a result and a non-null error".into(),
        ));
    }

    if error_active {
        let message = error_value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let code = error_value
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or(crate::error::error_codes::INTERNAL_ERROR as i64) as i32;
        let version = if obj.get("jsonrpc").and_then(Value::as_str) == Some("2.0") {
            Version::V2
        } else {
            Version::V1
        };
        return Err(Error::Protocol {
            message,
            code,
            version,
        });
    }

    Ok(result_value)
}

/// Parses a string id the way a caller building a request by hand would:
/// `"null"` becomes `Id::Null`, anything integer-shaped becomes a number,
/// otherwise it stays a string.
pub fn parse_id(id_str: &str) -> Id {
    if id_str == "null" {
        return Id::Null;
    }
    if let Ok(n) = id_str.parse::<i64>() {
        return Id::Number(n);
    }
    Id::String(id_str.to_string())
}

/// Best-effort interpretation of a `jsonrpc` field value for the purposes of
/// deciding which dialect a response should be rendered in, even when the
/// request turns out to be invalid for other reasons. Unparseable values
/// fall back to V1, matching how a bare request (no `jsonrpc` member at all)
/// is treated.
pub(crate) fn response_version(raw_jsonrpc: Option<&Value>) -> Version {
    match raw_jsonrpc {
        None => Version::V1,
        Some(v) => validate_version(Some(v)).unwrap_or(Version::V1),
    }
}

/// Validates a `jsonrpc` field value. A bare integer `2` is rejected (only a
/// float `2.0` or the strings `"2"`/`"2.0"` count as V2); `1`/`1.0` are
/// accepted as V1; anything else is an invalid request.
pub(crate) fn validate_version(value: Option<&Value>) -> Result<Version> {
    match value {
        None => Ok(Version::V1),
        Some(Value::Number(n)) => {
            if n.is_f64() {
                let f = n.as_f64().expect("f64 variant always converts");
                if f >= 2.0 {
                    Ok(Version::V2)
                } else if f == 1.0 {
                    Ok(Version::V1)
                } else {
                    Err(Error::InvalidRequest("Invalid jsonrpc version".into()))
                }
            } else {
                match n.as_i64() {
                    Some(1) => Ok(Version::V1),
                    _ => Err(Error::InvalidRequest("Invalid jsonrpc version".into())),
                }
            }
        }
        Some(Value::String(s)) if s == "2" || s == "2.0" => Ok(Version::V2),
        Some(Value::String(s)) if s == "1" || s == "1.0" => Ok(Version::V1),
        _ => Err(Error::InvalidRequest("Invalid jsonrpc version".into())),
    }
}

/// Extracts a request id for response-shaping purposes. Absence and
/// explicit `null` both mean "this is a notification"; anything that isn't
/// a string, number, or null becomes `Id::Null` (the caller never gets to
/// see an id of the wrong type).
pub(crate) fn extract_id(raw_id: Option<&Value>) -> Option<Id> {
    match raw_id {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Some(Id::Number(i)),
            None => Some(Id::Null),
        },
        Some(Value::String(s)) => Some(Id::String(s.clone())),
        Some(_) => Some(Id::Null),
    }
}
