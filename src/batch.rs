//! Top-level request processing: decides single vs. batch, fans batch
//! elements out concurrently while preserving order, and filters
//! notifications (which never contribute to the response).

use serde_json::Value;

use crate::dispatch::{dispatch_call, MethodRegistry};
use crate::error::{error_codes, ErrorObject};
use crate::protocol::{
    extract_id, prepare_method_response, response_version, Id, RawEnvelope, Response, Version,
};
use crate::validator::verify_method_call;

/// Processes one HTTP body worth of JSON-RPC traffic and returns the bytes
/// to write back, or `None` if nothing should be written (a lone
/// notification, or a notification-only batch).
pub async fn process_body(registry: &MethodRegistry, body: &[u8]) -> Option<Vec<u8>> {
    if body.is_empty() {
        return Some(encode_single(parse_error_response("empty request body")));
    }
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return Some(encode_single(parse_error_response(&e.to_string()))),
    };

    match value {
        Value::Array(items) => process_batch(registry, items).await,
        other => build_response(registry, other)
            .await
            .map(|resp| encode_single(resp)),
    }
}

async fn process_batch(registry: &MethodRegistry, items: Vec<Value>) -> Option<Vec<u8>> {
    if items.is_empty() {
        return Some(encode_single(Response::error(
            Id::Null,
            Version::V2,
            ErrorObject {
                code: error_codes::INVALID_REQUEST,
                message: "Invalid Request".to_string(),
                data: None,
            },
        )));
    }

    let batch_size = items.len();
    let pending = items.into_iter().map(|item| build_response(registry, item));
    let results = futures::future::join_all(pending).await;
    let collected: Vec<Response> = results.into_iter().flatten().collect();

    let error_count = collected.iter().filter(|r| r.is_error()).count();
    let notification_count = batch_size - collected.len();
    tracing::info!(
        batch_size,
        notification_count,
        error_count,
        "processed batch"
    );

    if collected.is_empty() {
        None
    } else {
        Some(serde_json::to_vec(&collected).expect("responses always serialize"))
    }
}

/// Validates, dispatches, and shapes a response for a single element
/// (whether it arrived alone or as part of a batch). Returns `None` for
/// notifications, whose outcome -- success or failure -- never surfaces.
async fn build_response(registry: &MethodRegistry, value: Value) -> Option<Response> {
    if !value.is_object() {
        return Some(Response::error(
            Id::Null,
            Version::V2,
            ErrorObject {
                code: error_codes::INVALID_REQUEST,
                message: "Invalid Request".to_string(),
                data: None,
            },
        ));
    }

    let raw: RawEnvelope =
        serde_json::from_value(value).expect("a JSON object always fits RawEnvelope");
    let id = extract_id(raw.id.as_ref());
    let version = response_version(raw.jsonrpc.as_ref());
    let method = raw.method.as_ref().and_then(|m| m.as_str()).unwrap_or("").to_string();

    let started = std::time::Instant::now();
    let outcome = match verify_method_call(&raw) {
        Ok(call) => dispatch_call(registry, &call.method, call.params).await,
        Err(e) => Err(e),
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let id_display = id.as_ref().map(Id::to_display_string);

    match &outcome {
        Ok(_) => tracing::debug!(
            %method,
            ?id_display,
            ?version,
            elapsed_ms,
            "dispatch succeeded"
        ),
        Err(e) if e.code() == error_codes::INTERNAL_ERROR => tracing::error!(
            %method,
            ?id_display,
            ?version,
            code = e.code(),
            elapsed_ms,
            "dispatch failed"
        ),
        Err(e) => tracing::warn!(
            %method,
            ?id_display,
            ?version,
            code = e.code(),
            elapsed_ms,
            "dispatch rejected"
        ),
    }

    id.as_ref()?;
    prepare_method_response(outcome, id, version)
}

fn parse_error_response(detail: &str) -> Response {
    tracing::debug!(detail, "rejecting malformed request body");
    Response::error(
        Id::Null,
        Version::V2,
        ErrorObject {
            code: error_codes::PARSE_ERROR,
            message: "Parse error".to_string(),
            data: None,
        },
    )
}

fn encode_single(response: Response) -> Vec<u8> {
    serde_json::to_vec(&response).expect("response always serializes")
}
