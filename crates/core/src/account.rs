use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

pub const DEFAULT_ALLOWED_ROLES: [&str; 7] = [
    "Admin",
    "Council",
    "Noble",
    "Lord",
    "Lady",
    "Commander",
    "Master of Coin",
];

/// The account that invoked a command, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    #[serde(default)]
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Account {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            id: AccountId::new(id),
            username: display_name.to_lowercase(),
            display_name,
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Role names that grant proxy updates and log access. Matching is exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    allowed: Vec<String>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ROLES.iter().map(|r| r.to_string()).collect())
    }
}

impl RolePolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn is_privileged(&self, account: &Account) -> bool {
        self.allowed
            .iter()
            .any(|role| account.roles.iter().any(|r| r == role))
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}
