//! fastrpc
//!
//! A dual-version (1.0/2.0) JSON-RPC protocol engine with an HTTP server and
//! client surface. Its primary responsibility is the wire protocol itself:
//! decoding, validating, dispatching, and re-encoding JSON-RPC calls,
//! independent of what the registered methods actually do.
//!
//! # Responsibilities
//!
//! - Define and validate the dual-version JSON-RPC 1.0/2.0 envelope
//! - Bind call arguments against a declared parameter schema and dispatch
//!   them to registered handlers
//! - Coordinate batch requests, preserving order and dropping notifications
//!   from the response
//! - Provide an HTTP server and HTTP client proxy for this protocol
//!
//! # Non-responsibilities
//!
//! - Any transport other than HTTP (see `SPEC_FULL.md` Non-goals)
//! - The business logic behind any individual registered method
//!
//! # Example
//!
//! ```rust,no_run
//! use fastrpc::dispatch::{Args, MethodRegistry, ParamSchema};
//! use fastrpc::server::JsonRpcServer;
//! use serde_json::Value;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MethodRegistry::builder()
//!     .method_fn("echo", ParamSchema::new(&["data"]), |args: Args| {
//!         Box::pin(async move { Ok(args.get(0).cloned().unwrap_or(Value::Null)) })
//!     })
//!     .build();
//!
//! let server = JsonRpcServer::new(registry);
//! fastrpc::server::serve(server, "127.0.0.1:8080".parse()?).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod validator;

pub use client::{Credentials, Proxy, ProxyFactory};
pub use dispatch::{Args, Handler, MethodRegistry, ParamSchema};
pub use error::{Error, ErrorObject, Result};
pub use protocol::{Id, Params, Response, Version};
pub use server::{BasicAuthGate, BasicCredentials, JsonRpcServer};
