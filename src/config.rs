//! Layered configuration: explicit builder values override environment
//! variables (`FASTRPC_*`), which override built-in defaults. Validation is
//! eager -- [`ServerConfig::load`]/[`ClientConfig::load`] fail fast rather
//! than deferring a bad value to first use.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::client::{Credentials, ProxyFactory};
use crate::error::Error;
use crate::protocol::Version;

#[derive(Debug, Clone, Deserialize)]
struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
    #[serde(default)]
    gzip: bool,
    #[serde(default)]
    basic_auth_username: Option<String>,
    #[serde(default)]
    basic_auth_password: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// Resolved, validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub gzip: bool,
    pub basic_auth: Option<(String, String)>,
}

impl ServerConfig {
    /// Loads configuration from defaults, then `FASTRPC_SERVER_*`
    /// environment variables, then the values supplied here.
    pub fn load(overrides: config::Config) -> Result<Self, Error> {
        let builder = config::Config::builder()
            .set_default("bind_addr", default_bind_addr())
            .map_err(config_err)?
            .set_default("gzip", false)
            .map_err(config_err)?
            .add_source(
                config::Environment::with_prefix("FASTRPC_SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(overrides);

        let settings: ServerSettings = builder.build().map_err(config_err)?.try_deserialize().map_err(config_err)?;

        let bind_addr = settings
            .bind_addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind_addr: {e}")))?;

        let basic_auth = match (settings.basic_auth_username, settings.basic_auth_password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "basic_auth_username and basic_auth_password must be set together".into(),
                ))
            }
        };

        Ok(ServerConfig {
            bind_addr,
            gzip: settings.gzip,
            basic_auth,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSettings {
    url: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    connect_timeout_ms: Option<u64>,
    #[serde(default)]
    basic_auth_username: Option<String>,
    #[serde(default)]
    basic_auth_password: Option<String>,
    #[serde(default)]
    tls_ca_cert_path: Option<String>,
    #[serde(default = "default_true")]
    persistent: bool,
    #[serde(default)]
    shared_pool: bool,
    #[serde(default = "default_max_persistent_per_host")]
    max_persistent_per_host: usize,
    #[serde(default)]
    cached_connection_timeout_ms: Option<u64>,
    #[serde(default)]
    retry_automatically: bool,
    #[serde(default = "default_true")]
    compressed_http: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "2".to_string()
}

fn default_max_persistent_per_host() -> usize {
    2
}

/// Resolved, validated client configuration. `pool` (an externally supplied
/// connection pool) has no config-layer representation -- it is only
/// reachable through [`ProxyFactory::external_pool`], since a live
/// `reqwest::Client` cannot be expressed as a config value.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub version: Version,
    pub connect_timeout: Option<Duration>,
    pub credentials: Credentials,
    pub tls_ca_cert_path: Option<String>,
    pub persistent: bool,
    pub shared_pool: bool,
    pub max_persistent_per_host: usize,
    pub cached_connection_timeout: Option<Duration>,
    pub retry_automatically: bool,
    pub compressed_http: bool,
}

impl ClientConfig {
    pub fn load(overrides: config::Config) -> Result<Self, Error> {
        let builder = config::Config::builder()
            .set_default("version", default_version())
            .map_err(config_err)?
            .set_default("persistent", true)
            .map_err(config_err)?
            .set_default("shared_pool", false)
            .map_err(config_err)?
            .set_default("max_persistent_per_host", default_max_persistent_per_host() as i64)
            .map_err(config_err)?
            .set_default("retry_automatically", false)
            .map_err(config_err)?
            .set_default("compressed_http", true)
            .map_err(config_err)?
            .add_source(
                config::Environment::with_prefix("FASTRPC_CLIENT")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(overrides);

        let settings: ClientSettings = builder.build().map_err(config_err)?.try_deserialize().map_err(config_err)?;

        if settings.url.is_empty() {
            return Err(Error::Config("url must not be empty".into()));
        }

        let version = match settings.version.as_str() {
            "1" | "1.0" => Version::V1,
            "2" | "2.0" => Version::V2,
            other => return Err(Error::Config(format!("unsupported jsonrpc version: {other}"))),
        };

        let credentials = match (settings.basic_auth_username, settings.basic_auth_password) {
            (Some(user), Some(pass)) => Credentials::Basic {
                username: user,
                password: pass,
            },
            (None, None) => Credentials::Anonymous,
            _ => {
                return Err(Error::Config(
                    "basic_auth_username and basic_auth_password must be set together".into(),
                ))
            }
        };

        Ok(ClientConfig {
            url: settings.url,
            version,
            connect_timeout: settings.connect_timeout_ms.map(Duration::from_millis),
            credentials,
            tls_ca_cert_path: settings.tls_ca_cert_path,
            persistent: settings.persistent,
            shared_pool: settings.shared_pool,
            max_persistent_per_host: settings.max_persistent_per_host,
            cached_connection_timeout: settings.cached_connection_timeout_ms.map(Duration::from_millis),
            retry_automatically: settings.retry_automatically,
            compressed_http: settings.compressed_http,
        })
    }

    /// Materializes this configuration into a [`ProxyFactory`], wiring every
    /// field through to the corresponding builder method so the layered
    /// config path (defaults < env < overrides) actually reaches the HTTP
    /// client, not just the builder API.
    pub fn into_proxy_factory(self) -> Result<ProxyFactory, Error> {
        let mut factory = ProxyFactory::new(self.version)
            .credentials(self.credentials)
            .persistent(self.persistent)
            .max_persistent_per_host(self.max_persistent_per_host)
            .retry_automatically(self.retry_automatically)
            .compressed_http(self.compressed_http);

        if let Some(timeout) = self.connect_timeout {
            factory = factory.connect_timeout(timeout);
        }
        if let Some(timeout) = self.cached_connection_timeout {
            factory = factory.pool_idle_timeout(timeout);
        }
        if let Some(path) = &self.tls_ca_cert_path {
            let pem = std::fs::read(path)
                .map_err(|e| Error::Config(format!("reading tls_ca_cert_path {path}: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::Config(format!("parsing tls_ca_cert_path {path}: {e}")))?;
            factory = factory.tls_root_cert(cert);
        }

        factory.shared_pool(self.shared_pool).map_err(|e| {
            Error::Config(format!("building shared connection pool: {}", e.message()))
        })
    }
}

fn config_err(e: config::ConfigError) -> Error {
    Error::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_bind_to_loopback() {
        let overrides = config::Config::builder().build().unwrap();
        let config = ServerConfig::load(overrides).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(!config.gzip);
        assert!(config.basic_auth.is_none());
    }

    #[test]
    fn server_config_rejects_partial_basic_auth() {
        let overrides = config::Config::builder()
            .set_override("basic_auth_username", "alice")
            .unwrap()
            .build()
            .unwrap();
        assert!(ServerConfig::load(overrides).is_err());
    }

    #[test]
    fn client_config_requires_url() {
        let overrides = config::Config::builder().build().unwrap();
        assert!(ClientConfig::load(overrides).is_err());
    }

    #[test]
    fn client_config_accepts_explicit_url() {
        let overrides = config::Config::builder()
            .set_override("url", "http://localhost:8080/")
            .unwrap()
            .build()
            .unwrap();
        let config = ClientConfig::load(overrides).unwrap();
        assert_eq!(config.url, "http://localhost:8080/");
        assert!(config.persistent);
        assert!(matches!(config.version, Version::V2));
        assert!(matches!(config.credentials, Credentials::Anonymous));
    }

    #[test]
    fn client_config_rejects_partial_basic_auth() {
        let overrides = config::Config::builder()
            .set_override("url", "http://localhost:8080/")
            .unwrap()
            .set_override("basic_auth_username", "alice")
            .unwrap()
            .build()
            .unwrap();
        assert!(ClientConfig::load(overrides).is_err());
    }

    #[test]
    fn client_config_rejects_unsupported_version() {
        let overrides = config::Config::builder()
            .set_override("url", "http://localhost:8080/")
            .unwrap()
            .set_override("version", "3")
            .unwrap()
            .build()
            .unwrap();
        assert!(ClientConfig::load(overrides).is_err());
    }

    #[test]
    fn client_config_converts_into_a_working_proxy_factory() {
        let overrides = config::Config::builder()
            .set_override("url", "http://localhost:8080/")
            .unwrap()
            .set_override("version", "1")
            .unwrap()
            .build()
            .unwrap();
        let config = ClientConfig::load(overrides).unwrap();
        let factory = config.into_proxy_factory().unwrap();
        assert!(factory.get_proxy("http://localhost:8080/").is_ok());
    }
}
