//! Role hierarchy, creation rules and scope table
//!
//! The table is data: it is loaded once at startup (built-in or from a JSON
//! file) into an immutable [`RolePolicy`] that is shared behind an `Arc`.
//! Lookups are keyed by the role string, so a role the table does not know
//! ranks at level 0 and may create nothing.

use crate::models::{Role, RoleScope};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One row of the role table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRule {
    pub role: String,
    pub level: u8,
    pub scope: RoleScope,
    #[serde(default)]
    pub can_create: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("role table is empty")]
    Empty,

    #[error("role {0} is defined more than once")]
    DuplicateRole(String),

    #[error("role {role} may create undefined role {target}")]
    UnknownCreationTarget { role: String, target: String },

    #[error("more than one role holds the highest level {0}")]
    AmbiguousTopLevel(u8),

    #[error("failed to read role table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse role table: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct RoleEntry {
    level: u8,
    scope: RoleScope,
    can_create: HashSet<String>,
}

/// Immutable role lookup structure
#[derive(Debug, Clone)]
pub struct RolePolicy {
    entries: HashMap<String, RoleEntry>,
    top_role: String,
}

fn key(role: &str) -> String {
    role.trim().to_ascii_uppercase()
}

impl RolePolicy {
    /// Built-in table.
    ///
    /// VENDOR may create ADMIN and MANAGER accounts inside its own organization
    /// even though it ranks below both; ADMIN may not create another ADMIN.
    pub fn builtin_rules() -> Vec<RoleRule> {
        fn rule(role: Role, level: u8, scope: RoleScope, can_create: &[Role]) -> RoleRule {
            RoleRule {
                role: role.as_str().to_string(),
                level,
                scope,
                can_create: can_create.iter().map(|r| r.as_str().to_string()).collect(),
            }
        }

        vec![
            rule(
                Role::SuperAdmin,
                5,
                RoleScope::Global,
                &[Role::Admin, Role::Manager, Role::Vendor, Role::User],
            ),
            rule(
                Role::Admin,
                4,
                RoleScope::Global,
                &[Role::Manager, Role::Vendor, Role::User],
            ),
            rule(Role::Manager, 3, RoleScope::Scoped, &[]),
            rule(Role::Vendor, 2, RoleScope::Own, &[Role::Admin, Role::Manager]),
            rule(Role::User, 1, RoleScope::Own, &[]),
        ]
    }

    pub fn builtin() -> Self {
        // The built-in table is validated by the unit tests below
        Self::from_rules(Self::builtin_rules()).expect("built-in role table is valid")
    }

    /// Build and validate a policy from table rows
    pub fn from_rules(rules: Vec<RoleRule>) -> Result<Self, PolicyError> {
        if rules.is_empty() {
            return Err(PolicyError::Empty);
        }

        let mut entries = HashMap::with_capacity(rules.len());
        for rule in &rules {
            let entry = RoleEntry {
                level: rule.level,
                scope: rule.scope,
                can_create: rule.can_create.iter().map(|r| key(r)).collect(),
            };
            if entries.insert(key(&rule.role), entry).is_some() {
                return Err(PolicyError::DuplicateRole(key(&rule.role)));
            }
        }

        for (role, entry) in &entries {
            if let Some(target) = entry.can_create.iter().find(|t| !entries.contains_key(*t)) {
                return Err(PolicyError::UnknownCreationTarget {
                    role: role.clone(),
                    target: target.clone(),
                });
            }
        }

        let top_level = entries.values().map(|e| e.level).max().unwrap_or(0);
        let mut top: Vec<&String> = entries
            .iter()
            .filter(|(_, e)| e.level == top_level)
            .map(|(r, _)| r)
            .collect();
        if top.len() != 1 {
            return Err(PolicyError::AmbiguousTopLevel(top_level));
        }
        let top_role = top.remove(0).clone();

        Ok(Self { entries, top_role })
    }

    /// Load a JSON array of [`RoleRule`] rows
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<RoleRule> = serde_json::from_str(&raw)?;
        Self::from_rules(rules)
    }

    /// Resolve the policy for this process: file if configured, else built-in
    pub fn load(policy_path: Option<&str>) -> Result<Self, PolicyError> {
        match policy_path {
            Some(path) => {
                let policy = Self::from_json_file(path)?;
                tracing::info!(path = %path, roles = policy.entries.len(), "Role table loaded");
                Ok(policy)
            }
            None => Ok(Self::builtin()),
        }
    }

    /// Hierarchy level; unknown roles rank 0
    pub fn level(&self, role: &str) -> u8 {
        self.entries.get(&key(role)).map_or(0, |e| e.level)
    }

    pub fn scope(&self, role: &str) -> Option<RoleScope> {
        self.entries.get(&key(role)).map(|e| e.scope)
    }

    pub fn is_global(&self, role: &str) -> bool {
        self.scope(role) == Some(RoleScope::Global)
    }

    /// Access-control decision for an action gated to `required`.
    ///
    /// An empty requirement means any authenticated actor. Otherwise the actor
    /// passes when its level reaches at least one required role's level.
    pub fn is_authorized(&self, actor_role: &str, required: &[Role]) -> bool {
        if required.is_empty() {
            return true;
        }
        let actor_level = self.level(actor_role);
        required.iter().any(|r| self.level(r.as_str()) <= actor_level)
    }

    /// Flat set-membership test, deliberately not a level comparison
    pub fn can_create(&self, creator_role: &str, target_role: &str) -> bool {
        self.entries
            .get(&key(creator_role))
            .is_some_and(|e| e.can_create.contains(&key(target_role)))
    }

    /// Roles `creator_role` may create, sorted by descending level
    pub fn creatable_roles(&self, creator_role: &str) -> Vec<String> {
        let mut roles: Vec<String> = self
            .entries
            .get(&key(creator_role))
            .map(|e| e.can_create.iter().cloned().collect())
            .unwrap_or_default();
        roles.sort_by(|a, b| self.level(b).cmp(&self.level(a)).then(a.cmp(b)));
        roles
    }

    /// Only the single highest-level role may physically remove rows
    pub fn can_hard_delete(&self, role: &str) -> bool {
        key(role) == self.top_role
    }

    pub fn top_role(&self) -> &str {
        &self.top_role
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::builtin()
    }
}
