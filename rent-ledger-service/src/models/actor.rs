use serde::{Deserialize, Serialize};

/// Role of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Tenant,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "tenant" => Some(Self::Tenant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Tenant => "tenant",
        }
    }
}

/// The party invoking a ledger operation.
///
/// For owners `id` is the owner id; for tenants it is the tenant id the
/// ledger records reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn owner(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Owner,
        }
    }

    pub fn tenant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Tenant,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    pub fn is_tenant(&self) -> bool {
        self.role == Role::Tenant
    }
}
