//! Registrar service configuration.
//!
//! # Purpose
//! Sources configuration from environment variables with an optional YAML
//! override file (`REGISTRAR_CONFIG`). Module-level initialization is limited
//! to this parsing; everything downstream receives the parsed value.
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9100";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKvBackend {
    /// Null object: no revocation set, no session tracking.
    None,
    Memory,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub session_kv: SessionKvBackend,
    /// PEM-encoded Ed25519 public key used to verify bearer tokens.
    pub jwt_public_key_pem: String,
    /// Optional signing key; only provisioning tooling mints tokens.
    pub jwt_private_key_pem: Option<String>,
    pub lock_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RegistrarConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    postgres_url: Option<String>,
    session_kv: Option<String>,
    lock_timeout_ms: Option<u64>,
}

fn parse_storage(raw: &str) -> Result<StorageBackend> {
    match raw {
        "memory" => Ok(StorageBackend::Memory),
        "postgres" => Ok(StorageBackend::Postgres),
        other => bail!("unknown storage backend: {other}"),
    }
}

fn parse_session_kv(raw: &str) -> Result<SessionKvBackend> {
    match raw {
        "none" => Ok(SessionKvBackend::None),
        "memory" => Ok(SessionKvBackend::Memory),
        other => bail!("unknown session kv backend: {other}"),
    }
}

impl RegistrarConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("REGISTRAR_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .with_context(|| "parse REGISTRAR_BIND")?;
        let metrics_bind = std::env::var("REGISTRAR_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse REGISTRAR_METRICS_BIND")?;
        let storage = parse_storage(
            &std::env::var("REGISTRAR_STORAGE").unwrap_or_else(|_| "memory".to_string()),
        )?;
        let postgres = std::env::var("REGISTRAR_PG_URL").ok().map(|url| {
            let max_connections = std::env::var("REGISTRAR_PG_MAX_CONNECTIONS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(10);
            let connect_timeout_ms = std::env::var("REGISTRAR_PG_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(5_000);
            let acquire_timeout_ms = std::env::var("REGISTRAR_PG_ACQUIRE_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(5_000);
            PostgresConfig {
                url,
                max_connections,
                connect_timeout_ms,
                acquire_timeout_ms,
            }
        });
        let session_kv = parse_session_kv(
            &std::env::var("REGISTRAR_SESSION_KV").unwrap_or_else(|_| "none".to_string()),
        )?;
        let jwt_public_key_pem = std::env::var("REGISTRAR_JWT_PUBLIC_KEY_PEM")
            .with_context(|| "REGISTRAR_JWT_PUBLIC_KEY_PEM is required")?;
        let jwt_private_key_pem = std::env::var("REGISTRAR_JWT_PRIVATE_KEY_PEM").ok();
        let lock_timeout = Duration::from_millis(
            std::env::var("REGISTRAR_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS),
        );
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            session_kv,
            jwt_public_key_pem,
            jwt_private_key_pem,
            lock_timeout,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("REGISTRAR_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read REGISTRAR_CONFIG: {path}"))?;
            let override_cfg: RegistrarConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse registrar config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.storage {
                config.storage = parse_storage(&value)?;
            }
            if let Some(url) = override_cfg.postgres_url {
                let mut postgres = config.postgres.take().unwrap_or(PostgresConfig {
                    url: String::new(),
                    max_connections: 10,
                    connect_timeout_ms: 5_000,
                    acquire_timeout_ms: 5_000,
                });
                postgres.url = url;
                config.postgres = Some(postgres);
            }
            if let Some(value) = override_cfg.session_kv {
                config.session_kv = parse_session_kv(&value)?;
            }
            if let Some(value) = override_cfg.lock_timeout_ms {
                config.lock_timeout = Duration::from_millis(value);
            }
        }
        Ok(config)
    }
}
