//! HTTP client surface: `Proxy`/`ProxyFactory`, modeled on
//! `twisted.web.xmlrpc`-style JSON-RPC proxies but built on `reqwest`, which
//! already owns TLS, gzip negotiation, and connection pooling for us.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{decode_response, encode_request, Id, Params, Version};

/// Credentials a [`Proxy`] authenticates its requests with. `Anonymous`
/// sends no `Authorization` header at all.
#[derive(Debug, Clone)]
pub enum Credentials {
    Anonymous,
    Basic { username: String, password: String },
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::Anonymous
    }
}

/// A single JSON-RPC endpoint binding: a URL, a dialect, and the reqwest
/// client (and therefore connection pool) that carries its traffic.
#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
    url: String,
    version: Version,
    credentials: Credentials,
    retry_automatically: bool,
    id_counter: std::sync::Arc<AtomicI64>,
}

impl Proxy {
    /// A standalone proxy with its own private connection pool. Prefer
    /// [`ProxyFactory::get_proxy`] when creating many proxies that should
    /// share one.
    pub fn new(url: impl Into<String>, version: Version) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(Error::transport)?;
        Ok(Proxy {
            client,
            url: url.into(),
            version,
            credentials: Credentials::Anonymous,
            retry_automatically: false,
            id_counter: std::sync::Arc::new(AtomicI64::new(1)),
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Invokes `method` with the given params and decodes the result,
    /// surfacing either a transport failure (connect/timeout/DNS -- anything
    /// that never produced a JSON-RPC response) or a [`Error::Protocol`]
    /// carrying the peer's error object.
    pub async fn call_remote(&self, method: &str, params: Params) -> Result<Value> {
        let id = Id::Number(self.id_counter.fetch_add(1, Ordering::Relaxed));
        let version_f = match self.version {
            Version::V2 => Some(2.0),
            Version::V1 => None,
        };
        let body = encode_request(method, Some(params), Some(id), version_f)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Credentials::Basic { username, password } = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = match request.try_clone() {
            Some(retryable) if self.retry_automatically => {
                match request.send().await {
                    Ok(resp) => resp,
                    Err(_) => retryable.send().await.map_err(Error::transport)?,
                }
            }
            _ => request.send().await.map_err(Error::transport)?,
        };
        let bytes = response.bytes().await.map_err(Error::transport)?;
        decode_response(&bytes)
    }
}

/// Builds [`Proxy`] instances that share configuration (timeouts,
/// credentials, TLS, pooling behavior) and, optionally, a single underlying
/// connection pool -- the `sharedPool=True` case in the original client.
pub struct ProxyFactory {
    version: Version,
    connect_timeout: Option<Duration>,
    credentials: Credentials,
    persistent: bool,
    max_persistent_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    retry_automatically: bool,
    compressed_http: bool,
    tls_root_cert: Option<reqwest::Certificate>,
    shared_client: Option<reqwest::Client>,
}

impl ProxyFactory {
    pub fn new(version: Version) -> Self {
        ProxyFactory {
            version,
            connect_timeout: None,
            credentials: Credentials::Anonymous,
            persistent: true,
            max_persistent_per_host: 2,
            pool_idle_timeout: None,
            retry_automatically: false,
            compressed_http: true,
            tls_root_cert: None,
            shared_client: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// When `false`, disables HTTP keep-alive: every call opens a fresh
    /// connection (`persistent=False` in the original client).
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn max_persistent_per_host(mut self, max: usize) -> Self {
        self.max_persistent_per_host = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Retries a call once on a transport failure (`retryAutomatically` in
    /// the original client). Only ever applied to idempotent calls.
    pub fn retry_automatically(mut self, retry: bool) -> Self {
        self.retry_automatically = retry;
        self
    }

    /// When `false`, suppresses `Accept-Encoding: gzip` negotiation
    /// (`compressedHTTP=False` in the original client).
    pub fn compressed_http(mut self, compressed: bool) -> Self {
        self.compressed_http = compressed;
        self
    }

    /// Trusts an additional root certificate for HTTPS endpoints
    /// (`contextFactory` in the original client).
    pub fn tls_root_cert(mut self, cert: reqwest::Certificate) -> Self {
        self.tls_root_cert = Some(cert);
        self
    }

    /// All proxies produced by this factory share one connection pool
    /// instead of getting a private one each.
    pub fn shared_pool(mut self, shared: bool) -> Result<Self> {
        self.shared_client = if shared {
            Some(self.build_client()?)
        } else {
            None
        };
        Ok(self)
    }

    /// Uses an externally supplied connection pool (`pool` in the original
    /// client) instead of building one from the other knobs on this factory.
    pub fn external_pool(mut self, client: reqwest::Client) -> Self {
        self.shared_client = Some(client);
        self
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().gzip(self.compressed_http);
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.pool_idle_timeout {
            builder = builder.pool_idle_timeout(timeout);
        }
        if let Some(cert) = &self.tls_root_cert {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder = if self.persistent {
            builder.pool_max_idle_per_host(self.max_persistent_per_host)
        } else {
            builder.pool_max_idle_per_host(0)
        };
        builder.build().map_err(Error::transport)
    }

    /// Returns a [`Proxy`] bound to `url`, reusing the shared pool if
    /// configured or building a fresh one otherwise.
    pub fn get_proxy(&self, url: impl Into<String>) -> Result<Proxy> {
        let client = match &self.shared_client {
            Some(client) => client.clone(),
            None => self.build_client()?,
        };
        Ok(Proxy {
            client,
            url: url.into(),
            version: self.version,
            credentials: self.credentials.clone(),
            retry_automatically: self.retry_automatically,
            id_counter: std::sync::Arc::new(AtomicI64::new(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_new_defaults_to_anonymous_credentials() {
        let proxy = Proxy::new("http://localhost:1234/", Version::V2).unwrap();
        assert!(matches!(proxy.credentials, Credentials::Anonymous));
    }

    #[test]
    fn factory_without_shared_pool_builds_a_fresh_client_per_proxy() {
        let factory = ProxyFactory::new(Version::V2);
        assert!(factory.shared_client.is_none());
        let a = factory.get_proxy("http://localhost:1/").unwrap();
        let b = factory.get_proxy("http://localhost:1/").unwrap();
        assert_eq!(a.url, b.url);
    }

    #[test]
    fn factory_with_shared_pool_reuses_one_client() {
        let factory = ProxyFactory::new(Version::V2).shared_pool(true).unwrap();
        assert!(factory.shared_client.is_some());
    }
}
