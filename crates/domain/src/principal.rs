//! The consumed result of external authentication.
//!
//! Token verification is an external collaborator; the gateway only ever
//! sees its output — a principal and a role. The core never assumes a
//! caller's role: DM-only operations take a caller id and the surface
//! enforces the role.

use serde::{Deserialize, Serialize};

/// Synthetic principal allowed to author `system` chat messages.
pub const SYSTEM_USER: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Player,
    Dm,
}

impl Role {
    pub fn is_dm(self) -> bool {
        matches!(self, Role::Dm)
    }
}
