//! Access levels and grants
//!
//! An access level is mapped onto a provider-side authorization object holding
//! at most two ordered rules:
//!
//! | precedence | rule  | lifetime                                  |
//! |-----------:|-------|-------------------------------------------|
//! | 1          | owner | removed only by full teardown (`unexpose`)|
//! | 2          | group | revocable via `revoke_group`              |
//!
//! `Public` means no authorization object exists at all.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Precedence of the operator's own rule
pub const OWNER_PRECEDENCE: u32 = 1;

/// Precedence of the revocable group rule
pub const GROUP_PRECEDENCE: u32 = 2;

/// Who may reach a hostname
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "level", content = "group")]
pub enum AccessLevel {
    /// Anyone on the internet
    #[default]
    Public,
    /// Only the operator's identity
    Private,
    /// The operator plus members of the named provider-side group
    Group(String),
}

impl AccessLevel {
    /// Whether this level needs a provider-side authorization object
    pub fn requires_policy(&self) -> bool {
        !matches!(self, AccessLevel::Public)
    }

    /// Group name, if this is a group level
    pub fn group(&self) -> Option<&str> {
        match self {
            AccessLevel::Group(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::Public => f.write_str("public"),
            AccessLevel::Private => f.write_str("private"),
            AccessLevel::Group(name) => write!(f, "group:{}", name),
        }
    }
}

/// A requested access configuration for one hostname
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Full hostname the grant applies to
    pub hostname: String,
    /// Requested level
    pub level: AccessLevel,
    /// When the group rule should be narrowed away; scheduling is external
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AccessGrant {
    /// Create a grant without expiry
    pub fn new(hostname: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            hostname: hostname.into(),
            level,
            expires_at: None,
        }
    }

    /// Set the expiry instant
    pub fn with_expiry(mut self, expires_at: Option<chrono::DateTime<chrono::Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

/// One "include" selector of a provider-side rule
///
/// Serializes in the provider's wire shape, e.g. `{"email":{"email":"a@b.c"}}`
/// or `{"group":{"id":"..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeRule {
    /// Matches a single identity
    Email {
        /// Email address of the identity
        email: String,
    },
    /// Matches members of a provider-side group
    Group {
        /// Provider group identifier
        id: String,
    },
}

/// Result of applying a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrantReceipt {
    /// The authorization object did not exist before this grant
    pub created_container: bool,
    /// A group rule was issued by this grant
    pub issued_group_rule: bool,
}

/// Access policy for setups without an authorization provider
///
/// Every hostname is public: `describe` reports `Public`, teardown is a no-op,
/// and any non-public grant is refused.
#[derive(Debug, Clone, Default)]
pub struct PublicOnlyPolicy;

#[async_trait::async_trait]
impl crate::traits::AccessPolicy for PublicOnlyPolicy {
    async fn grant(
        &self,
        _hostname: &str,
        level: &AccessLevel,
        _identity: &str,
    ) -> Result<GrantReceipt, crate::Error> {
        if level.requires_policy() {
            return Err(crate::Error::config(format!(
                "{} access needs an access provider account (set CLOUDFLARE_ACCOUNT_ID)",
                level
            )));
        }
        Ok(GrantReceipt::default())
    }

    async fn revoke_group(&self, _hostname: &str) -> Result<bool, crate::Error> {
        Ok(false)
    }

    async fn remove(&self, _hostname: &str) -> Result<bool, crate::Error> {
        Ok(false)
    }

    async fn describe(&self, _hostname: &str) -> AccessLevel {
        AccessLevel::Public
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AccessPolicy;

    #[test]
    fn include_rules_use_provider_wire_shape() {
        let email = IncludeRule::Email {
            email: "owner@example.com".to_string(),
        };
        let group = IncludeRule::Group {
            id: "grp-123".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&email).unwrap(),
            serde_json::json!({"email": {"email": "owner@example.com"}})
        );
        assert_eq!(
            serde_json::to_value(&group).unwrap(),
            serde_json::json!({"group": {"id": "grp-123"}})
        );
    }

    #[test]
    fn public_needs_no_policy() {
        assert!(!AccessLevel::Public.requires_policy());
        assert!(AccessLevel::Private.requires_policy());
        assert!(AccessLevel::Group("friends".to_string()).requires_policy());
        assert_eq!(AccessLevel::Group("friends".to_string()).group(), Some("friends"));
    }

    #[tokio::test]
    async fn public_only_policy_refuses_protection() {
        let policy = PublicOnlyPolicy;
        assert!(policy.grant("a.example.com", &AccessLevel::Public, "").await.is_ok());
        assert!(matches!(
            policy.grant("a.example.com", &AccessLevel::Private, "o@example.com").await,
            Err(crate::Error::Config(_))
        ));
        assert!(!policy.remove("a.example.com").await.unwrap());
        assert_eq!(policy.describe("a.example.com").await, AccessLevel::Public);
    }
}
