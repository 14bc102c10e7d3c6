//! Role policy
//!
//! Pure predicate mapping (role, action) to allowed/denied. Authorization
//! checks happen before every admin-class command and every menu render;
//! handlers never mutate state on a denied action.

use serde::{Deserialize, Serialize};

/// User role, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The first user ever registered. At most one exists.
    Operator,
    /// Promoted by the operator. Can manage config, not roles.
    Admin,
    /// Everyone else. Ordinary conversation only.
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Parse a stored role string. Unknown values fall back to `User`
    /// (least privilege).
    pub fn parse(s: &str) -> Role {
        match s {
            "operator" => Role::Operator,
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    /// Spanish display label, used in chat messages and the user list.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Operator => "Operador",
            Role::Admin => "Admin",
            Role::User => "Usuario",
        }
    }

    /// Whether this role may perform `action`.
    pub fn allows(&self, action: AdminAction) -> bool {
        match self {
            Role::Operator => true,
            Role::Admin => !matches!(action, AdminAction::Promote | AdminAction::Demote),
            Role::User => false,
        }
    }
}

/// Actions gated by the role policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    Promote,
    Demote,
    ListUsers,
    ViewConfig,
    ToggleFlag,
    Restart,
    AdminMenu,
}
