//! Role and scope domain models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform role. The wire and storage representation is the upper-case string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Vendor,
    User,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Manager,
        Role::Vendor,
        Role::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Vendor => "VENDOR",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Breadth of resources a role may act upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleScope {
    /// Unrestricted
    Global,
    /// Restricted to an assigned sub-resource (vendor, category)
    Scoped,
    /// Restricted to resources the actor owns or created
    Own,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleScope::Global => "GLOBAL",
            RoleScope::Scoped => "SCOPED",
            RoleScope::Own => "OWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_string_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_uses_upper_snake_case() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"SUPER_ADMIN\"");

        let scope: RoleScope = serde_json::from_str("\"SCOPED\"").unwrap();
        assert_eq!(scope, RoleScope::Scoped);
    }
}
