//! HTTP server surface: a `POST`-only JSON-RPC endpoint, an optional gzip
//! wrapper around it (`EncodingJsonRpcServer`), and a reference HTTP Basic
//! Auth gate that rejects at the protocol level rather than the HTTP level.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response as HttpResponse, StatusCode};
use hyper_util::rt::TokioIo;
use std::io::Write;
use tokio::net::TcpListener;

use crate::dispatch::MethodRegistry;
use crate::error::{error_codes, Error, ErrorObject};
use crate::protocol::{Id, Response, Version};

/// Credentials a [`BasicAuthGate`] checks incoming requests against.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// HTTP Basic Auth gate. A failed or missing credential does not produce an
/// HTTP 401; it produces a normal `200 OK` JSON-RPC error response with
/// message `"Unauthorized"` and code `INVALID_REQUEST`, matching how an
/// authentication failure is rendered as a protocol-level error rather than
/// a transport-level one.
#[derive(Debug, Clone)]
pub struct BasicAuthGate {
    credentials: BasicCredentials,
}

impl BasicAuthGate {
    pub fn new(credentials: BasicCredentials) -> Self {
        BasicAuthGate { credentials }
    }

    fn check(&self, header: Option<&HeaderValue>) -> bool {
        let Some(header) = header else { return false };
        let Ok(header) = header.to_str() else { return false };
        let Some(encoded) = header.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        match decoded.split_once(':') {
            Some((user, pass)) => {
                user == self.credentials.username && pass == self.credentials.password
            }
            None => false,
        }
    }

    fn unauthorized_response() -> Response {
        Response::error(
            Id::Null,
            Version::V2,
            ErrorObject {
                code: error_codes::INVALID_REQUEST,
                message: "Unauthorized".to_string(),
                data: None,
            },
        )
    }
}

/// The JSON-RPC HTTP endpoint itself: decodes the body through
/// [`crate::batch::process_body`] and writes back whatever it returns (or an
/// empty `200` for a pure notification).
#[derive(Clone)]
pub struct JsonRpcServer {
    registry: MethodRegistry,
    auth: Option<Arc<BasicAuthGate>>,
    gzip: bool,
}

impl JsonRpcServer {
    pub fn new(registry: MethodRegistry) -> Self {
        JsonRpcServer {
            registry,
            auth: None,
            gzip: false,
        }
    }

    /// Wraps the server with an HTTP Basic Auth gate, matching
    /// `twisted.web.guard.HTTPAuthSessionWrapper` in spirit: auth failures
    /// surface through the protocol, not the transport.
    pub fn with_basic_auth(mut self, credentials: BasicCredentials) -> Self {
        self.auth = Some(Arc::new(BasicAuthGate::new(credentials)));
        self
    }

    /// Enables gzip response compression when the client's
    /// `Accept-Encoding` header allows it and request-body gzip decoding
    /// when `Content-Encoding: gzip` is present, mirroring
    /// `EncodingJSONRPCServer`.
    pub fn with_gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    async fn handle(&self, req: Request<Incoming>) -> HttpResponse<Full<Bytes>> {
        if req.method() != Method::POST {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "only POST is supported");
        }

        if let Some(auth) = &self.auth {
            if !auth.check(req.headers().get(hyper::header::AUTHORIZATION)) {
                let resp = BasicAuthGate::unauthorized_response();
                return json_response(serde_json::to_vec(&resp).expect("response serializes"), false);
            }
        }

        let request_gzip = req
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);
        let accepts_gzip = self.gzip
            && req
                .headers()
                .get(ACCEPT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("gzip"))
                .unwrap_or(false);

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => return text_response(StatusCode::BAD_REQUEST, "failed to read body"),
        };

        let body = if request_gzip {
            match gunzip(&body) {
                Ok(decoded) => decoded,
                Err(_) => {
                    return text_response(StatusCode::BAD_REQUEST, "invalid gzip body");
                }
            }
        } else {
            body.to_vec()
        };

        match crate::batch::process_body(&self.registry, &body).await {
            Some(bytes) => json_response(bytes, accepts_gzip),
            None => HttpResponse::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .expect("building an empty response never fails"),
        }
    }
}

fn json_response(bytes: Vec<u8>, gzip: bool) -> HttpResponse<Full<Bytes>> {
    let body = if gzip {
        match gzip_encode(&bytes) {
            Ok(compressed) => compressed,
            Err(_) => bytes,
        }
    } else {
        bytes
    };
    let mut builder = HttpResponse::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len());
    if gzip {
        builder = builder.header(CONTENT_ENCODING, "gzip");
    }
    builder
        .body(Full::new(Bytes::from(body)))
        .expect("building a JSON response never fails")
}

fn text_response(status: StatusCode, message: &str) -> HttpResponse<Full<Bytes>> {
    HttpResponse::builder()
        .status(status)
        .body(Full::new(Bytes::from(message.to_string())))
        .expect("building a text response never fails")
}

fn gzip_encode(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(Vec::new());
    decoder.write_all(data)?;
    decoder.finish()
}

/// Binds `addr` and serves JSON-RPC requests until the process is killed.
/// One task per connection, one `service_fn` invocation per request --
/// the HTTP analogue of how the raw-socket transports in the teacher repo
/// read one line per call.
pub async fn serve(server: JsonRpcServer, addr: SocketAddr) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await.map_err(Error::transport)?;
    tracing::info!(%addr, "JSON-RPC HTTP server listening");
    serve_listener(server, listener).await
}

/// Like [`serve`], but against an already-bound listener -- lets callers
/// (tests, mainly) bind to an ephemeral port and learn the real address
/// before handing the listener off.
pub async fn serve_listener(server: JsonRpcServer, listener: TcpListener) -> Result<(), Error> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let server = server.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let server = server.clone();
                async move { Ok::<_, Infallible>(server.handle(req).await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}
