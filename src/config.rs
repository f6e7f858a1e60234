//! Runtime configuration.
//!
//! Defaults match the in-cluster deployment: certificates mounted from the
//! webhook secret at `/etc/webhook/certs/`, HTTPS on 8443 and probes on 8080.
//! Certificate paths and the drain grace period may be overridden through
//! environment variables; ports are fixed.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Webhook server port
pub const WEBHOOK_PORT: u16 = 8443;
/// Health and metrics server port
pub const HEALTH_PORT: u16 = 8080;
/// Grace period for in-flight admission requests during shutdown
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS: u64 = 10;

/// Environment variable overriding the certificate path
pub const CERT_PATH_ENV: &str = "WEBHOOK_CERT_PATH";
/// Environment variable overriding the private key path
pub const KEY_PATH_ENV: &str = "WEBHOOK_KEY_PATH";
/// Environment variable overriding the shutdown grace period (seconds)
pub const SHUTDOWN_GRACE_ENV: &str = "SHUTDOWN_GRACE_PERIOD_SECS";

/// Webhook process configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    /// PEM certificate chain served on the webhook port
    pub cert_path: PathBuf,
    /// PEM private key for `cert_path`
    pub key_path: PathBuf,
    /// HTTPS port for admission requests
    pub port: u16,
    /// Plain HTTP port for probes and metrics
    pub health_port: u16,
    /// Upper bound on how long draining waits for in-flight requests
    pub shutdown_grace_period: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            shutdown_grace_period: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS),
        }
    }
}

impl WebhookConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(CERT_PATH_ENV).filter(|p| !p.is_empty()) {
            config.cert_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(KEY_PATH_ENV).filter(|p| !p.is_empty()) {
            config.key_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(SHUTDOWN_GRACE_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.shutdown_grace_period = Duration::from_secs(secs),
                Err(e) => warn!(
                    value = %raw,
                    error = %e,
                    default_secs = DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS,
                    "Invalid shutdown grace period, using default"
                ),
            }
        }

        config
    }

    /// Address the webhook HTTPS server binds to
    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Address the health server binds to
    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.health_port))
    }
}
