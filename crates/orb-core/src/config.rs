//! Configuration types for the tunnel coordinator
//!
//! This module defines the configuration structures shared by the core and the
//! binary. Loading them (from the environment) is the binary's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for the host lock timeout
pub const MAX_LOCK_TIMEOUT_SECS: u64 = 600;

/// Main tunnel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Base domain; hostnames are `<subdomain>.<domain>`
    pub domain: String,

    /// Path to the tunnel daemon's routing file
    pub routes_path: PathBuf,

    /// Operator identity used for the owner rule of non-public hostnames
    #[serde(default)]
    pub owner_email: Option<String>,

    /// Remote provider configuration
    pub provider: ProviderConfig,

    /// Host lock settings
    #[serde(default)]
    pub lock: LockConfig,

    /// Tunnel daemon settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Reachability probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Log remote writes and restarts instead of performing them
    #[serde(default)]
    pub dry_run: bool,
}

impl TunnelConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("DOMAIN cannot be empty"));
        }
        if self.domain.starts_with('.') || self.domain.ends_with('.') {
            return Err(crate::Error::config(format!(
                "DOMAIN {:?} must not start or end with a dot",
                self.domain
            )));
        }
        if self.routes_path.as_os_str().is_empty() {
            return Err(crate::Error::config("CONFIG_PATH cannot be empty"));
        }
        if let Some(email) = &self.owner_email
            && !email.contains('@')
        {
            return Err(crate::Error::config(format!(
                "USER_EMAIL {:?} is not an email address",
                email
            )));
        }
        if self.probe_timeout_ms == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }

        self.provider.validate()?;
        self.lock.validate()?;
        self.service.validate()?;

        Ok(())
    }

    /// Probe timeout as a `Duration`
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Remote provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare DNS + Zero Trust Access
    Cloudflare {
        /// API token (needs DNS edit and Access edit permissions)
        api_token: String,
        /// Zone holding `domain`
        zone_id: String,
        /// Account ID; only needed for non-public access levels and groups
        #[serde(default)]
        account_id: Option<String>,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                account_id,
            } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("CLOUDFLARE_API_TOKEN cannot be empty"));
                }
                if zone_id.is_empty() {
                    return Err(crate::Error::config("CLOUDFLARE_ZONE_ID cannot be empty"));
                }
                if account_id.as_deref() == Some("") {
                    return Err(crate::Error::config(
                        "CLOUDFLARE_ACCOUNT_ID is set but empty",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Cloudflare {
                zone_id,
                account_id,
                ..
            } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("zone_id", zone_id)
                .field("account_id", account_id)
                .finish(),
        }
    }
}

/// Host lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock file path
    #[serde(default = "default_lock_path")]
    pub path: PathBuf,

    /// Maximum wait for a lock held elsewhere, in seconds
    #[serde(default = "default_lock_timeout_secs")]
    pub timeout_secs: u64,
}

impl LockConfig {
    /// Validate the lock configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.path.as_os_str().is_empty() {
            return Err(crate::Error::config("Lock path cannot be empty"));
        }
        if !(1..=MAX_LOCK_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(crate::Error::config(format!(
                "Lock timeout must be between 1 and {} seconds, got {}",
                MAX_LOCK_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        Ok(())
    }

    /// Lock timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: default_lock_path(),
            timeout_secs: default_lock_timeout_secs(),
        }
    }
}

/// Tunnel daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unit name known to the service manager
    #[serde(default = "default_service_unit")]
    pub unit: String,

    /// Run service control commands through `sudo`
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
}

impl ServiceConfig {
    /// Validate the service configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.unit.is_empty() {
            return Err(crate::Error::config("Service unit cannot be empty"));
        }
        if self.unit.starts_with('-') || self.unit.chars().any(char::is_whitespace) {
            return Err(crate::Error::config(format!(
                "Service unit {:?} is not a valid unit name",
                self.unit
            )));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit: default_service_unit(),
            use_sudo: default_use_sudo(),
        }
    }
}

fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("orb-tunnel.lock")
}

fn default_lock_timeout_secs() -> u64 {
    10
}

fn default_service_unit() -> String {
    "cloudflared".to_string()
}

fn default_use_sudo() -> bool {
    true
}

fn default_probe_timeout_ms() -> u64 {
    5000
}
