//! End-to-end loop: a real `JsonRpcServer` bound to an ephemeral loopback
//! port, exercised both through the `Proxy` client and a raw `reqwest`
//! client, covering the literal scenarios the wire format has to satisfy.

use fastrpc::dispatch::{Args, MethodRegistry, ParamSchema};
use fastrpc::protocol::{Params, Version};
use fastrpc::server::{serve_listener, JsonRpcServer};
use fastrpc::{Credentials, Proxy};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let registry = MethodRegistry::builder()
        .method_fn("echo", ParamSchema::new(&["data"]), |args: Args| {
            Box::pin(async move { Ok(args.get(0).cloned().unwrap_or(Value::Null)) })
        })
        .method_fn("sql", ParamSchema::none(), |_args: Args| {
            Box::pin(async move { Ok(json!("ok")) })
        })
        .build();

    let server = JsonRpcServer::new(registry);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = serve_listener(server, listener).await;
    });

    format!("http://{addr}/")
}

#[tokio::test]
async fn echo_round_trips_over_v2_via_proxy() {
    let url = spawn_server().await;
    let proxy = Proxy::new(url, Version::V2).unwrap();
    let result = proxy
        .call_remote("echo", Params::Positional(vec![json!("hello")]))
        .await
        .unwrap();
    assert_eq!(result, json!("hello"));
}

#[tokio::test]
async fn echo_round_trips_over_v1_via_proxy() {
    let url = spawn_server().await;
    let proxy = Proxy::new(url, Version::V1).unwrap();
    let result = proxy
        .call_remote("echo", Params::Positional(vec![json!("hi v1")]))
        .await
        .unwrap();
    assert_eq!(result, json!("hi v1"));
}

#[tokio::test]
async fn unknown_method_surfaces_as_protocol_error() {
    let url = spawn_server().await;
    let proxy = Proxy::new(url, Version::V2).unwrap();
    let err = proxy
        .call_remote("missing", Params::Positional(vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), -32601);
}

#[tokio::test]
async fn bad_arity_surfaces_legacy_style_message() {
    let url = spawn_server().await;
    let proxy = Proxy::new(url, Version::V2).unwrap();
    let err = proxy
        .call_remote("sql", Params::Positional(vec![json!("aa"), json!("bb")]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), -32602);
    assert_eq!(
        err.message(),
        "jsonrpc_sql() takes 1 positional argument but 3 were given"
    );
}

#[tokio::test]
async fn raw_http_client_sees_parse_error_on_malformed_body() {
    let url = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client.post(&url).body("not json").send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn raw_http_client_sees_empty_body_for_notification() {
    let url = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc": "2.0", "method": "echo", "params": ["x"]}"#)
        .send()
        .await
        .unwrap();
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn batch_request_preserves_order_over_http() {
    let url = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body(
            r#"[
                {"jsonrpc": "2.0", "method": "echo", "params": ["a"], "id": 1},
                {"jsonrpc": "2.0", "method": "echo", "params": ["b"], "id": 2}
            ]"#,
        )
        .send()
        .await
        .unwrap();
    let body: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(body[0]["result"], "a");
    assert_eq!(body[1]["result"], "b");
}

#[tokio::test]
async fn basic_auth_gate_rejects_anonymous_as_protocol_error() {
    use fastrpc::server::BasicCredentials;

    let registry = MethodRegistry::builder()
        .method_fn("echo", ParamSchema::new(&["data"]), |args: Args| {
            Box::pin(async move { Ok(args.get(0).cloned().unwrap_or(Value::Null)) })
        })
        .build();
    let server = JsonRpcServer::new(registry).with_basic_auth(BasicCredentials {
        username: "alice".into(),
        password: "secret".into(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve_listener(server, listener).await;
    });
    let url = format!("http://{addr}/");

    let proxy = Proxy::new(url, Version::V2)
        .unwrap()
        .with_credentials(Credentials::Anonymous);
    let err = proxy
        .call_remote("echo", Params::Positional(vec![json!("x")]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), -32600);
    assert_eq!(err.message(), "Unauthorized");
}

#[tokio::test]
async fn gzip_enabled_server_still_answers_a_plain_client() {
    let registry = MethodRegistry::builder()
        .method_fn("echo", ParamSchema::new(&["data"]), |args: Args| {
            Box::pin(async move { Ok(args.get(0).cloned().unwrap_or(Value::Null)) })
        })
        .build();
    let server = JsonRpcServer::new(registry).with_gzip(true);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve_listener(server, listener).await;
    });
    let url = format!("http://{addr}/");

    // reqwest negotiates gzip transparently when built with the "gzip"
    // feature, so the proxy sees a decoded result either way.
    let proxy = Proxy::new(url, Version::V2).unwrap();
    let result = proxy
        .call_remote("echo", Params::Positional(vec![json!("zipped")]))
        .await
        .unwrap();
    assert_eq!(result, json!("zipped"));
}

#[tokio::test]
async fn basic_auth_gate_accepts_correct_credentials() {
    use fastrpc::server::BasicCredentials;

    let registry = MethodRegistry::builder()
        .method_fn("echo", ParamSchema::new(&["data"]), |args: Args| {
            Box::pin(async move { Ok(args.get(0).cloned().unwrap_or(Value::Null)) })
        })
        .build();
    let server = JsonRpcServer::new(registry).with_basic_auth(BasicCredentials {
        username: "alice".into(),
        password: "secret".into(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve_listener(server, listener).await;
    });
    let url = format!("http://{addr}/");

    let proxy = Proxy::new(url, Version::V2).unwrap().with_credentials(Credentials::Basic {
        username: "alice".into(),
        password: "secret".into(),
    });
    let result = proxy
        .call_remote("echo", Params::Positional(vec![json!("x")]))
        .await
        .unwrap();
    assert_eq!(result, json!("x"));
}
