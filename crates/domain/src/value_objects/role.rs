//! Connection roles.

use serde::{Deserialize, Serialize};

/// The role a connected viewer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dungeon Master - full authoring privileges
    Dm,
    /// Player - may move and edit only their own tokens
    #[default]
    Player,
}

impl Role {
    pub fn is_dm(self) -> bool {
        matches!(self, Role::Dm)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Dm => "dm",
            Role::Player => "player",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dm" | "gm" => Ok(Role::Dm),
            "player" => Ok(Role::Player),
            _ => Err(()),
        }
    }
}
