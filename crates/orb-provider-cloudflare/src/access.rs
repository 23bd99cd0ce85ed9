// # Cloudflare Access backend
//
// Implements `AccessPolicy` and `GroupDirectory` on Cloudflare Zero Trust
// Access.
//
// ## Object layout
//
// A protected hostname is one self-hosted Access application (the container)
// holding at most two app-scoped allow policies:
//
// | precedence | policy name         | include                 |
// |-----------:|---------------------|-------------------------|
// | 1          | `orb-owner`         | `{"email": {"email"}}`  |
// | 2          | `orb-group:<group>` | `{"group": {"id"}}`     |
//
// The effective level is read back from the policy names, so `describe` never
// needs a second lookup.
//
// ## API Reference
//
// - Applications: `/accounts/:account_id/access/apps[/:app_id]`
// - App policies: `/accounts/:account_id/access/apps/:app_id/policies[/:policy_id]`
// - Groups: `/accounts/:account_id/access/groups[/:group_id]`

use crate::api::{self, CloudflareClient};
use async_trait::async_trait;
use orb_core::access::{GROUP_PRECEDENCE, OWNER_PRECEDENCE};
use orb_core::validation::parse_access_level;
use orb_core::{
    AccessGroup, AccessLevel, AccessPolicy, Error, GrantReceipt, GroupDirectory, IncludeRule,
    Result,
};
use reqwest::Method;
use serde_json::Value;

/// Name of the owner policy
pub const OWNER_POLICY: &str = "orb-owner";

/// Prefix of the group policy name; the group name follows
pub const GROUP_POLICY_PREFIX: &str = "orb-group:";

/// Session length for applications created here
const SESSION_DURATION: &str = "24h";

/// Page size for listings
const PER_PAGE: &str = "1000";

/// An Access application as far as we care
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccessApp {
    pub id: String,
    pub domain: String,
}

/// An app-scoped policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PolicyEntry {
    pub id: String,
    pub name: String,
}

impl PolicyEntry {
    fn is_owner(&self) -> bool {
        self.name == OWNER_POLICY
    }

    fn group_name(&self) -> Option<&str> {
        self.name.strip_prefix(GROUP_POLICY_PREFIX)
    }
}

fn group_policy_name(group: &str) -> String {
    format!("{}{}", GROUP_POLICY_PREFIX, group)
}

/// Cloudflare Access backend for one account
#[derive(Debug, Clone)]
pub struct CloudflareAccess {
    client: CloudflareClient,
    account_id: String,
}

impl CloudflareAccess {
    /// Create a backend for `account_id`
    pub fn new(client: CloudflareClient, account_id: impl Into<String>) -> Self {
        Self {
            client,
            account_id: account_id.into(),
        }
    }

    fn apps_path(&self) -> String {
        format!("/accounts/{}/access/apps", self.account_id)
    }

    fn policies_path(&self, app_id: &str) -> String {
        format!("{}/{}/policies", self.apps_path(), app_id)
    }

    fn groups_path(&self) -> String {
        format!("/accounts/{}/access/groups", self.account_id)
    }

    async fn find_app(&self, hostname: &str) -> Result<Option<AccessApp>> {
        let result = self.client.get(&self.apps_path(), &[("per_page", PER_PAGE)]).await?;
        Ok(parse_apps(&result)?
            .into_iter()
            .find(|app| app.domain.eq_ignore_ascii_case(hostname)))
    }

    async fn create_app(&self, hostname: &str) -> Result<String> {
        tracing::info!("Creating Access application for {}", hostname);
        let result = self
            .client
            .send(Method::POST, &self.apps_path(), Some(&app_payload(hostname)))
            .await?;
        Ok(api::str_field(&result, "id", "app")?.to_string())
    }

    async fn delete_app(&self, app_id: &str) -> Result<()> {
        self.client
            .send(Method::DELETE, &format!("{}/{}", self.apps_path(), app_id), None)
            .await?;
        Ok(())
    }

    async fn policies(&self, app_id: &str) -> Result<Vec<PolicyEntry>> {
        let result = self.client.get(&self.policies_path(app_id), &[]).await?;
        parse_policies(&result)
    }

    /// Create the policy, or overwrite it in place when it exists
    async fn put_policy(
        &self,
        app_id: &str,
        existing: Option<&PolicyEntry>,
        name: &str,
        precedence: u32,
        include: &IncludeRule,
    ) -> Result<()> {
        let payload = policy_payload(name, precedence, include);
        match existing {
            Some(policy) => {
                tracing::debug!("Updating Access policy {} ({})", name, policy.id);
                self.client
                    .send(
                        Method::PUT,
                        &format!("{}/{}", self.policies_path(app_id), policy.id),
                        Some(&payload),
                    )
                    .await?;
            }
            None => {
                tracing::debug!("Creating Access policy {}", name);
                self.client
                    .send(Method::POST, &self.policies_path(app_id), Some(&payload))
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete_policy(&self, app_id: &str, policy: &PolicyEntry) -> Result<()> {
        tracing::debug!("Deleting Access policy {} ({})", policy.name, policy.id);
        self.client
            .send(
                Method::DELETE,
                &format!("{}/{}", self.policies_path(app_id), policy.id),
                None,
            )
            .await?;
        Ok(())
    }

    /// Write the owner rule and the group rule (or drop a stale one)
    ///
    /// Returns whether a group rule was issued.
    async fn apply_rules(&self, app_id: &str, identity: &str, group: Option<&AccessGroup>) -> Result<bool> {
        let policies = self.policies(app_id).await?;

        let owner = policies.iter().find(|p| p.is_owner());
        let owner_rule = IncludeRule::Email {
            email: identity.to_string(),
        };
        self.put_policy(app_id, owner, OWNER_POLICY, OWNER_PRECEDENCE, &owner_rule)
            .await?;

        // Stale group rules go first so the new one can take precedence 2
        let wanted = group.map(|g| group_policy_name(&g.name));
        for stale in policies
            .iter()
            .filter(|p| p.group_name().is_some() && Some(&p.name) != wanted.as_ref())
        {
            self.delete_policy(app_id, stale).await?;
        }

        let (Some(group), Some(name)) = (group, wanted) else {
            return Ok(false);
        };
        let existing = policies.iter().find(|p| p.name == name);
        let group_rule = IncludeRule::Group {
            id: group.id.clone(),
        };
        self.put_policy(app_id, existing, &name, GROUP_PRECEDENCE, &group_rule)
            .await?;
        Ok(true)
    }

    async fn try_describe(&self, hostname: &str) -> Result<AccessLevel> {
        match self.find_app(hostname).await? {
            Some(app) => Ok(level_from_policies(&self.policies(&app.id).await?)),
            None => Ok(AccessLevel::Public),
        }
    }
}

#[async_trait]
impl AccessPolicy for CloudflareAccess {
    async fn grant(&self, hostname: &str, level: &AccessLevel, identity: &str) -> Result<GrantReceipt> {
        if !level.requires_policy() {
            return Ok(GrantReceipt::default());
        }

        // Resolve the group before touching anything
        let group = match level.group() {
            Some(name) => Some(self.find_group(name).await?),
            None => None,
        };

        let (app_id, created_container) = match self.find_app(hostname).await? {
            Some(app) => (app.id, false),
            None => (self.create_app(hostname).await?, true),
        };

        match self.apply_rules(&app_id, identity, group.as_ref()).await {
            Ok(issued_group_rule) => {
                tracing::info!("Access for {} set to {}", hostname, level);
                Ok(GrantReceipt {
                    created_container,
                    issued_group_rule,
                })
            }
            Err(err) => {
                if created_container {
                    if let Err(cleanup) = self.delete_app(&app_id).await {
                        tracing::error!(
                            "Failed to delete half-configured Access application for {}: {}",
                            hostname,
                            cleanup
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn revoke_group(&self, hostname: &str) -> Result<bool> {
        let Some(app) = self.find_app(hostname).await? else {
            return Ok(false);
        };

        let groups: Vec<PolicyEntry> = self
            .policies(&app.id)
            .await?
            .into_iter()
            .filter(|p| p.group_name().is_some())
            .collect();
        for policy in &groups {
            tracing::info!("Revoking {} on {}", policy.name, hostname);
            self.delete_policy(&app.id, policy).await?;
        }
        Ok(!groups.is_empty())
    }

    async fn remove(&self, hostname: &str) -> Result<bool> {
        let Some(app) = self.find_app(hostname).await? else {
            return Ok(false);
        };

        tracing::info!("Deleting Access application for {}", hostname);
        self.delete_app(&app.id).await?;
        Ok(true)
    }

    async fn describe(&self, hostname: &str) -> AccessLevel {
        match self.try_describe(hostname).await {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!("Access lookup for {} failed, reporting public: {}", hostname, e);
                AccessLevel::Public
            }
        }
    }
}

#[async_trait]
impl GroupDirectory for CloudflareAccess {
    async fn create_group(&self, name: &str, members: &[String]) -> Result<AccessGroup> {
        validate_group_name(name)?;
        validate_members(members)?;

        let existing = self.list_groups().await?;
        if existing.iter().any(|g| g.name == name) {
            return Err(Error::already_exists(format!("access group {:?}", name)));
        }

        tracing::info!("Creating access group {} with {} member(s)", name, members.len());
        let result = self
            .client
            .send(Method::POST, &self.groups_path(), Some(&group_payload(name, members)))
            .await?;

        Ok(AccessGroup {
            id: api::str_field(&result, "id", "group")?.to_string(),
            name: name.to_string(),
            members: members.to_vec(),
        })
    }

    async fn list_groups(&self) -> Result<Vec<AccessGroup>> {
        let result = self.client.get(&self.groups_path(), &[("per_page", PER_PAGE)]).await?;
        api::array(&result, "groups")?.iter().map(parse_group).collect()
    }

    async fn find_group(&self, name: &str) -> Result<AccessGroup> {
        self.list_groups()
            .await?
            .into_iter()
            .find(|g| g.name == name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    async fn update_members(&self, name: &str, add: &[String], remove: &[String]) -> Result<AccessGroup> {
        validate_members(add)?;
        let group = self.find_group(name).await?;

        let members = merge_members(&group.members, add, remove);
        if members.is_empty() {
            return Err(Error::validation(format!(
                "access group {:?} would have no members; delete it with `orb access delete {}`",
                name, name
            )));
        }

        tracing::info!("Updating access group {}: {} member(s)", name, members.len());
        self.client
            .send(
                Method::PUT,
                &format!("{}/{}", self.groups_path(), group.id),
                Some(&group_payload(name, &members)),
            )
            .await?;

        Ok(AccessGroup { members, ..group })
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        let group = self.find_group(name).await?;
        tracing::info!("Deleting access group {}", name);
        self.client
            .send(Method::DELETE, &format!("{}/{}", self.groups_path(), group.id), None)
            .await?;
        Ok(())
    }
}

pub(crate) fn app_payload(hostname: &str) -> Value {
    serde_json::json!({
        "name": hostname,
        "domain": hostname,
        "type": "self_hosted",
        "session_duration": SESSION_DURATION,
    })
}

pub(crate) fn policy_payload(name: &str, precedence: u32, include: &IncludeRule) -> Value {
    serde_json::json!({
        "name": name,
        "decision": "allow",
        "precedence": precedence,
        "include": [include],
    })
}

pub(crate) fn group_payload(name: &str, members: &[String]) -> Value {
    let include: Vec<IncludeRule> = members
        .iter()
        .map(|email| IncludeRule::Email { email: email.clone() })
        .collect();
    serde_json::json!({
        "name": name,
        "include": include,
    })
}

pub(crate) fn parse_apps(result: &Value) -> Result<Vec<AccessApp>> {
    api::array(result, "apps")?
        .iter()
        // Non-self-hosted apps (e.g. SaaS, bookmarks) carry no domain
        .filter(|app| app["domain"].is_string())
        .map(|app| {
            Ok(AccessApp {
                id: api::str_field(app, "id", "app")?.to_string(),
                domain: api::str_field(app, "domain", "app")?.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_policies(result: &Value) -> Result<Vec<PolicyEntry>> {
    api::array(result, "policies")?
        .iter()
        .map(|policy| {
            Ok(PolicyEntry {
                id: api::str_field(policy, "id", "policy")?.to_string(),
                name: api::str_field(policy, "name", "policy")?.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_group(group: &Value) -> Result<AccessGroup> {
    let members = group["include"]
        .as_array()
        .map(|rules| {
            rules
                .iter()
                .filter_map(|rule| serde_json::from_value::<IncludeRule>(rule.clone()).ok())
                .filter_map(|rule| match rule {
                    IncludeRule::Email { email } => Some(email),
                    IncludeRule::Group { .. } => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(AccessGroup {
        id: api::str_field(group, "id", "group")?.to_string(),
        name: api::str_field(group, "name", "group")?.to_string(),
        members,
    })
}

/// Effective level of an existing application
pub(crate) fn level_from_policies(policies: &[PolicyEntry]) -> AccessLevel {
    match policies.iter().find_map(|p| p.group_name()) {
        Some(group) => AccessLevel::Group(group.to_string()),
        None => AccessLevel::Private,
    }
}

pub(crate) fn merge_members(current: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let mut members: Vec<String> = Vec::with_capacity(current.len() + add.len());
    for email in current.iter().chain(add) {
        if !members.iter().any(|m| m.eq_ignore_ascii_case(email)) {
            members.push(email.clone());
        }
    }
    members.retain(|m| !remove.iter().any(|r| r.eq_ignore_ascii_case(m)));
    members
}

fn validate_group_name(name: &str) -> Result<()> {
    match parse_access_level(name)? {
        AccessLevel::Group(_) => Ok(()),
        _ => Err(Error::validation(format!(
            "{:?} is a reserved access level and cannot be a group name",
            name
        ))),
    }
}

fn validate_members(members: &[String]) -> Result<()> {
    if let Some(bad) = members.iter().find(|m| !m.contains('@')) {
        return Err(Error::validation(format!("invalid email address {:?}", bad)));
    }
    Ok(())
}
