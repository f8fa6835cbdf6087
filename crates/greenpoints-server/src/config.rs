//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so a node starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use greenpoints_shared::constants::{DEFAULT_HTTP_PORT, DEVICE_DEBOUNCE_MS};

/// Longest accepted session lifetime (ten years).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory).
    pub database_path: Option<PathBuf>,

    /// Human-readable name for this node.
    /// Env: `INSTANCE_NAME`
    /// Default: `"GreenPoints Node"`
    pub instance_name: String,

    /// Whether USER and EMPLOYEE accounts may sign up.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Whether ADMIN accounts may sign up through the API.
    /// Env: `ADMIN_REGISTRATION_OPEN` (true/false)
    /// Default: `false`
    pub admin_registration_open: bool,

    /// Seed admin created at startup when absent.
    /// Env: `BOOTSTRAP_ADMIN_ID` and `BOOTSTRAP_ADMIN_SECRET` (both required)
    pub bootstrap_admin: Option<BootstrapAdmin>,

    /// Session lifetime.
    /// Env: `SESSION_TTL_HOURS`
    /// Default: 168 (one week)
    pub session_ttl: chrono::Duration,

    /// Minimum gap between two credited signals from the same device.
    /// Env: `DEVICE_DEBOUNCE_MS`
    /// Default: 2000
    pub device_debounce: Duration,

    /// Sustained requests per second per client IP.
    /// Env: `RATE_LIMIT_RPS`
    /// Default: 10
    pub rate_limit_rps: f64,

    /// Burst capacity per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: 30
    pub rate_limit_burst: f64,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            instance_name: "GreenPoints Node".to_string(),
            registration_open: true,
            admin_registration_open: false,
            bootstrap_admin: None,
            session_ttl: chrono::Duration::hours(168),
            device_debounce: Duration::from_millis(DEVICE_DEBOUNCE_MS),
            rate_limit_rps: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = lookup("REGISTRATION_OPEN") {
            config.registration_open = parse_flag(&val);
        }

        if let Some(val) = lookup("ADMIN_REGISTRATION_OPEN") {
            config.admin_registration_open = parse_flag(&val);
        }

        match (lookup("BOOTSTRAP_ADMIN_ID"), lookup("BOOTSTRAP_ADMIN_SECRET")) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                config.bootstrap_admin = Some(BootstrapAdmin { id, secret });
            }
            (None, None) => {}
            _ => tracing::warn!(
                "BOOTSTRAP_ADMIN_ID and BOOTSTRAP_ADMIN_SECRET must both be set, ignoring"
            ),
        }

        if let Some(hours) = parse_number::<i64>(&lookup, "SESSION_TTL_HOURS") {
            match chrono::Duration::try_hours(hours) {
                Some(ttl) if hours > 0 && hours <= MAX_SESSION_TTL_HOURS => {
                    config.session_ttl = ttl;
                }
                _ => tracing::warn!(
                    hours,
                    max = MAX_SESSION_TTL_HOURS,
                    "SESSION_TTL_HOURS out of range, using default"
                ),
            }
        }

        if let Some(ms) = parse_number::<u64>(&lookup, "DEVICE_DEBOUNCE_MS") {
            config.device_debounce = Duration::from_millis(ms);
        }

        if let Some(rps) = parse_number::<f64>(&lookup, "RATE_LIMIT_RPS") {
            if rps > 0.0 {
                config.rate_limit_rps = rps;
            }
        }

        if let Some(burst) = parse_number::<f64>(&lookup, "RATE_LIMIT_BURST") {
            if burst >= 1.0 {
                config.rate_limit_burst = burst;
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val != "false" && val != "0"
}

fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid number, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.registration_open);
        assert!(!config.admin_registration_open);
        assert_eq!(config.session_ttl, chrono::Duration::hours(168));
        assert_eq!(config.device_debounce, Duration::from_millis(2000));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/gp.db"),
            ("REGISTRATION_OPEN", "0"),
            ("ADMIN_REGISTRATION_OPEN", "true"),
            ("SESSION_TTL_HOURS", "2"),
            ("DEVICE_DEBOUNCE_MS", "50"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/gp.db")));
        assert!(!config.registration_open);
        assert!(config.admin_registration_open);
        assert_eq!(config.session_ttl, chrono::Duration::hours(2));
        assert_eq!(config.device_debounce, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("SESSION_TTL_HOURS", "-5"),
            ("RATE_LIMIT_RPS", "fast"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.session_ttl, chrono::Duration::hours(168));
        assert_eq!(config.rate_limit_rps, 10.0);
    }

    #[test]
    fn test_oversized_session_ttl_keeps_default() {
        for hours in ["10000000000000", "100000000", "87601"] {
            let config = from_pairs(&[("SESSION_TTL_HOURS", hours)]);
            assert_eq!(config.session_ttl, chrono::Duration::hours(168), "{hours}");
        }

        let config = from_pairs(&[("SESSION_TTL_HOURS", "87600")]);
        assert_eq!(
            config.session_ttl,
            chrono::Duration::hours(MAX_SESSION_TTL_HOURS)
        );
    }

    #[test]
    fn test_bootstrap_admin_needs_both_halves() {
        assert!(from_pairs(&[("BOOTSTRAP_ADMIN_ID", "root")])
            .bootstrap_admin
            .is_none());

        let config = from_pairs(&[
            ("BOOTSTRAP_ADMIN_ID", "root"),
            ("BOOTSTRAP_ADMIN_SECRET", "hunter2"),
        ]);
        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.id, "root");
        assert!(!format!("{admin:?}").contains("hunter2"));
    }
}
