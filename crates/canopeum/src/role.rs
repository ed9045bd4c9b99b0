//! User roles.
//!
//! Roles used to be free-text strings and were renamed twice over the life of
//! the project (`Admin`, then `SiteManager`, now `ForestSteward`). The database
//! only stores the canonical names; [`Role::from_legacy`] is what the rename
//! migration and any imported data go through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RoleError;

/// Authorization tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Regular account: can follow sites, like and comment.
    User,
    /// Manages the sites it has a `site_admin` row for.
    ForestSteward,
    /// Global administrator; bypasses every permission check.
    MegaAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::ForestSteward, Role::MegaAdmin];

    /// Canonical name, as stored in the `user.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::ForestSteward => "ForestSteward",
            Role::MegaAdmin => "MegaAdmin",
        }
    }

    /// Parse a role name, accepting names from earlier revisions.
    pub fn from_legacy(name: &str) -> Result<Role, RoleError> {
        match name {
            "User" => Ok(Role::User),
            "Admin" | "SiteManager" | "ForestSteward" => Ok(Role::ForestSteward),
            "MegaAdmin" => Ok(Role::MegaAdmin),
            other => Err(RoleError(other.to_string())),
        }
    }

    /// Legacy names that map onto this role, excluding the canonical one.
    pub fn legacy_aliases(&self) -> &'static [&'static str] {
        match self {
            Role::ForestSteward => &["Admin", "SiteManager"],
            Role::User | Role::MegaAdmin => &[],
        }
    }

    pub fn is_mega_admin(&self) -> bool {
        matches!(self, Role::MegaAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleError;

    /// Strict parse: only canonical names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoleError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn legacy_names_map_to_forest_steward() {
        assert_eq!(Role::from_legacy("Admin"), Ok(Role::ForestSteward));
        assert_eq!(Role::from_legacy("SiteManager"), Ok(Role::ForestSteward));
        assert_eq!(Role::from_legacy("MegaAdmin"), Ok(Role::MegaAdmin));
        assert_eq!(Role::from_legacy("User"), Ok(Role::User));
    }

    #[test]
    fn strict_parse_rejects_legacy_names() {
        assert!("SiteManager".parse::<Role>().is_err());
        assert!(Role::from_legacy("Gardener").is_err());
    }

    #[test]
    fn aliases_agree_with_from_legacy() {
        for role in Role::ALL {
            for alias in role.legacy_aliases() {
                assert_eq!(Role::from_legacy(alias), Ok(role));
            }
        }
    }
}
