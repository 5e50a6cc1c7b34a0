use std::fmt;

pub const ROLE_AGENT: &str = "agent";
pub const ROLE_CLIENT: &str = "client";
pub const ROLE_MODER: &str = "moder";
/// Role used for unattended actions (scoring, schedulers)
pub const ROLE_AUTO: &str = "auto";

pub const SIDE_BROKER: &str = "broker";

/// Acting role for one engine instance.
///
/// Resolved by the caller. Agents act on behalf of clients, so `agent` is
/// stored as `client` and every rule sees the client role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleContext {
    role: String,
}

impl RoleContext {
    pub fn new(role: impl AsRef<str>) -> Self {
        Self {
            role: Self::normalize(role.as_ref()).to_string(),
        }
    }

    /// Role for system initiated transitions
    pub fn auto() -> Self {
        Self::new(ROLE_AUTO)
    }

    /// Apply the fixed `agent` -> `client` alias
    pub fn normalize(role: &str) -> &str {
        let role = role.trim();
        if role == ROLE_AGENT {
            ROLE_CLIENT
        } else {
            role
        }
    }

    pub fn as_str(&self) -> &str {
        &self.role
    }

    /// True if `other` names this role (after aliasing)
    pub fn matches(&self, other: &str) -> bool {
        Self::normalize(other) == self.role
    }

    /// Side of the transaction this role works on; moderators sit with the broker.
    pub fn side(&self) -> &str {
        if self.role == ROLE_MODER {
            SIDE_BROKER
        } else {
            &self.role
        }
    }
}

impl fmt::Display for RoleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.role)
    }
}
