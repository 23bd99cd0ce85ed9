// # Access Policy Traits
//
// `AccessPolicy` maps an abstract access level onto provider-side
// authorization rules. `GroupDirectory` administers the named groups those
// rules refer to.
//
// ## Rule Layout
//
// A non-public hostname has exactly one authorization container holding:
// - precedence 1: owner rule (operator identity), never removed except by
//   `remove`
// - precedence 2: group rule (only for `AccessLevel::Group`), removed by
//   `revoke_group`

use async_trait::async_trait;

use crate::access::{AccessLevel, GrantReceipt};

/// Trait for access policy implementations
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Apply `level` to `hostname`
    ///
    /// For a non-public level:
    /// 1. Resolve the group (for `Group`) and fail fast if it does not exist
    /// 2. Create the per-hostname container if none exists
    /// 3. (Re)issue the owner rule at precedence 1
    /// 4. Issue the group rule at precedence 2, or drop a stale one for `Private`
    ///
    /// `Public` is a no-op here; removing protection is done with `remove`.
    ///
    /// # Errors
    ///
    /// - `Error::GroupNotFound`: the named group does not exist (no fallback
    ///   to `Private`)
    /// - `Error::Authentication`
    async fn grant(
        &self,
        hostname: &str,
        level: &AccessLevel,
        identity: &str,
    ) -> Result<GrantReceipt, crate::Error>;

    /// Remove only the precedence-2 group rule
    ///
    /// Returns `Ok(false)` when there was nothing to revoke.
    async fn revoke_group(&self, hostname: &str) -> Result<bool, crate::Error>;

    /// Tear down the whole container, owner rule included
    ///
    /// Returns `Ok(false)` when no container existed.
    async fn remove(&self, hostname: &str) -> Result<bool, crate::Error>;

    /// Current effective level for `hostname`.
    ///
    /// Read path for listing and health: implementations log lookup failures
    /// and report `Public` instead of raising.
    async fn describe(&self, hostname: &str) -> AccessLevel;
}

/// A provider-side access group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGroup {
    /// Provider group ID
    pub id: String,
    /// Group name
    pub name: String,
    /// Member emails
    pub members: Vec<String>,
}

/// Trait for access group administration
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Create a group with the given member emails
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyExists`: a group with this name exists
    async fn create_group(&self, name: &str, members: &[String]) -> Result<AccessGroup, crate::Error>;

    /// All groups on the account
    async fn list_groups(&self) -> Result<Vec<AccessGroup>, crate::Error>;

    /// Look a group up by name
    ///
    /// # Errors
    ///
    /// - `Error::GroupNotFound`
    async fn find_group(&self, name: &str) -> Result<AccessGroup, crate::Error>;

    /// Add and remove members; returns the updated group
    async fn update_members(
        &self,
        name: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<AccessGroup, crate::Error>;

    /// Delete a group by name
    async fn delete_group(&self, name: &str) -> Result<(), crate::Error>;
}
