#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Closed set of roles a badge holder can have.
///
/// Only `Admin` is expected to carry an interactive credential; the
/// remaining roles exist purely for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Guard,
    Staff,
}

impl UserRole {
    pub fn all() -> &'static [UserRole] {
        &[
            UserRole::Admin,
            UserRole::User,
            UserRole::Guard,
            UserRole::Staff,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
            UserRole::Guard => "guard",
            UserRole::Staff => "staff",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "guard" => Ok(UserRole::Guard),
            "staff" => Ok(UserRole::Staff),
            _ => Err(ModelError::InvalidRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_role_case_insensitively() {
        for role in UserRole::all() {
            let upper = role.as_str().to_uppercase();
            assert_eq!(upper.parse::<UserRole>().unwrap(), *role);
        }
    }

    #[test]
    fn rejects_roles_outside_the_closed_set() {
        assert_eq!(
            "moderator".parse::<UserRole>(),
            Err(ModelError::InvalidRole("moderator".into()))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Guard).unwrap();
        assert_eq!(json, "\"guard\"");
    }
}
