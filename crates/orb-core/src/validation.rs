//! Pure input validation
//!
//! Everything here runs before the host lock is taken and has no side effects.
//! Failures are always [`Error::Validation`].

use crate::access::AccessLevel;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a single DNS label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// Upper bound on temporary access grants
const MAX_EXPIRY_DAYS: i64 = 365;

/// Protocol the tunnel daemon uses to reach the local service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    #[default]
    Http,
    Https,
    Tcp,
    Udp,
    Ssh,
    Rdp,
    Smb,
    Unix,
}

impl ServiceType {
    /// All supported service types, in display order
    pub const ALL: [ServiceType; 8] = [
        ServiceType::Http,
        ServiceType::Https,
        ServiceType::Tcp,
        ServiceType::Udp,
        ServiceType::Ssh,
        ServiceType::Rdp,
        ServiceType::Smb,
        ServiceType::Unix,
    ];

    /// URI scheme used in the ingress target
    pub fn scheme(&self) -> &'static str {
        match self {
            ServiceType::Http => "http",
            ServiceType::Https => "https",
            ServiceType::Tcp => "tcp",
            ServiceType::Udp => "udp",
            ServiceType::Ssh => "ssh",
            ServiceType::Rdp => "rdp",
            ServiceType::Smb => "smb",
            ServiceType::Unix => "unix",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServiceType::ALL
            .into_iter()
            .find(|t| t.scheme() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = ServiceType::ALL.iter().map(|t| t.scheme()).collect();
                Error::validation(format!(
                    "invalid service type {:?}: must be one of {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Validate a subdomain label.
///
/// Lowercase letters, digits and hyphens; must start and end with an
/// alphanumeric character; at most 63 characters.
pub fn validate_subdomain(subdomain: &str) -> Result<()> {
    if is_valid_label(subdomain) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid subdomain {:?}: use lowercase letters, digits, and hyphens (must start/end with alphanumeric)",
            subdomain
        )))
    }
}

/// Validate and parse a port number in `1..=65535`
pub fn validate_port(port: &str) -> Result<u16> {
    let invalid = || {
        Error::validation(format!(
            "invalid port {:?}: must be a number between 1-65535",
            port
        ))
    };

    if port.is_empty() || port.len() > 5 || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(p) => Ok(p),
    }
}

/// Parse an access level: `public`, `private`, or a group name
pub fn parse_access_level(level: &str) -> Result<AccessLevel> {
    match level {
        "" | "public" => Ok(AccessLevel::Public),
        "private" => Ok(AccessLevel::Private),
        group if is_valid_group_name(group) => Ok(AccessLevel::Group(group.to_string())),
        other => Err(Error::validation(format!(
            "invalid access level {:?}: use public, private, or a group name (letters, digits, '-', '_')",
            other
        ))),
    }
}

/// Parse a grant duration such as `30m`, `24h` or `7d`.
///
/// An empty string means "no expiry".
pub fn parse_expiry(expiry: &str) -> Result<Option<chrono::Duration>> {
    if expiry.is_empty() {
        return Ok(None);
    }

    let invalid = || {
        Error::validation(format!(
            "invalid expiry {:?}: use a number followed by m, h, or d (e.g. 30m, 24h, 7d)",
            expiry
        ))
    };

    let Some((unit_at, _)) = expiry.char_indices().last() else {
        return Err(invalid());
    };
    let (amount, unit) = expiry.split_at(unit_at);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let duration = match unit {
        "m" => chrono::Duration::try_minutes(amount),
        "h" => chrono::Duration::try_hours(amount),
        "d" => chrono::Duration::try_days(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if duration > chrono::Duration::days(MAX_EXPIRY_DAYS) {
        return Err(Error::validation(format!(
            "expiry {:?} is too long (max {} days)",
            expiry, MAX_EXPIRY_DAYS
        )));
    }

    Ok(Some(duration))
}

/// Full hostname for a subdomain under the configured domain
pub fn hostname_for(subdomain: &str, domain: &str) -> String {
    format!("{}.{}", subdomain, domain)
}

/// Ingress target for a local port
pub fn service_url(port: u16, service_type: ServiceType) -> String {
    format!("{}://localhost:{}", service_type.scheme(), port)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_LABEL_LEN {
        return false;
    }
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1])
        && bytes.iter().all(|&b| edge_ok(b) || b == b'-')
}

fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
