//! Environment configuration
//!
//! | variable                  | required | default                     |
//! |---------------------------|----------|-----------------------------|
//! | `DOMAIN`                  | yes      |                             |
//! | `CONFIG_PATH`             | yes      |                             |
//! | `CLOUDFLARE_API_TOKEN`    | yes      |                             |
//! | `CLOUDFLARE_ZONE_ID`      | yes      |                             |
//! | `CLOUDFLARE_ACCOUNT_ID`   | for protected access and groups |      |
//! | `USER_EMAIL`              | for protected access |                 |
//! | `ORB_LOCK_PATH`           | no       | `<tmpdir>/orb-tunnel.lock`  |
//! | `ORB_LOCK_TIMEOUT_SECS`   | no       | `10`                        |
//! | `ORB_SERVICE_UNIT`        | no       | `cloudflared`               |
//! | `ORB_SERVICE_SUDO`        | no       | `true`                      |
//! | `ORB_PROBE_TIMEOUT_MS`    | no       | `5000`                      |
//! | `ORB_MODE`                | no       | `live` (or `dry-run`)       |
//! | `ORB_LOG_LEVEL`           | no       | `warn`                      |

use anyhow::{Context, Result};
use orb_core::{LockConfig, ProviderConfig, ServiceConfig, TunnelConfig};
use std::path::PathBuf;
use tracing::Level;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub tunnel: TunnelConfig,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str, example: &str| {
            var(key).with_context(|| format!("{} is required. Set it via: export {}={}", key, key, example))
        };

        let mut lock = LockConfig::default();
        if let Some(path) = var("ORB_LOCK_PATH") {
            lock.path = PathBuf::from(path);
        }
        if let Some(secs) = var("ORB_LOCK_TIMEOUT_SECS") {
            lock.timeout_secs = secs
                .parse()
                .with_context(|| format!("ORB_LOCK_TIMEOUT_SECS must be a number of seconds. Got: {}", secs))?;
        }

        let mut service = ServiceConfig::default();
        if let Some(unit) = var("ORB_SERVICE_UNIT") {
            service.unit = unit;
        }
        if let Some(sudo) = var("ORB_SERVICE_SUDO") {
            service.use_sudo = parse_bool("ORB_SERVICE_SUDO", &sudo)?;
        }

        let mut tunnel = TunnelConfig {
            domain: required("DOMAIN", "example.com")?,
            routes_path: PathBuf::from(required("CONFIG_PATH", "/etc/cloudflared/config.yml")?),
            owner_email: var("USER_EMAIL"),
            provider: ProviderConfig::Cloudflare {
                api_token: required("CLOUDFLARE_API_TOKEN", "your_token")?,
                zone_id: required("CLOUDFLARE_ZONE_ID", "your_zone_id")?,
                account_id: var("CLOUDFLARE_ACCOUNT_ID"),
            },
            lock,
            service,
            probe_timeout_ms: 5000,
            dry_run: false,
        };

        if let Some(ms) = var("ORB_PROBE_TIMEOUT_MS") {
            tunnel.probe_timeout_ms = ms
                .parse()
                .with_context(|| format!("ORB_PROBE_TIMEOUT_MS must be a number of milliseconds. Got: {}", ms))?;
        }

        tunnel.dry_run = match var("ORB_MODE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!("ORB_MODE '{}' is not valid. Valid modes: live, dry-run", other),
        };

        Ok(Self {
            tunnel,
            log_level: var("ORB_LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tunnel.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ORB_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Maximum tracing level
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, value),
    }
}
