use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::badge::badges_match;
use crate::role::UserRole;

/// A person known to the facility, identified at the gate by their badge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct User {
    #[cfg_attr(feature = "serde", serde(rename = "_id"))]
    pub id: String,
    pub name: String,
    /// Badge identifier. Unique across users, compared case-insensitively.
    pub id_number: String,
    pub role: UserRole,
    pub date_created: DateTime<Utc>,
    /// Argon2 PHC string; never leaves the process.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_badge(&self, badge: &str) -> bool {
        badges_match(&self.id_number, badge)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            name: self.name.clone(),
            id_number: self.id_number.clone(),
        }
    }

    /// Apply a partial update in place, bumping `updated_at`.
    pub fn apply(&mut self, update: &UserUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(hash) = &update.password_hash {
            self.password_hash = Some(hash.clone());
        }
        self.updated_at = now;
    }
}

/// The public part of a user echoed back to scanners.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct UserSummary {
    pub name: String,
    pub id_number: String,
}

/// Fields required to provision a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub id_number: String,
    pub role: UserRole,
}

impl NewUser {
    pub fn new(
        name: impl Into<String>,
        id_number: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            id_number: id_number.into().trim().to_string(),
            role,
        }
    }
}

/// Partial update. The credential arrives already hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.password_hash.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        let at = Utc::now();
        User {
            id: "u1".into(),
            name: "Alice Johnson".into(),
            id_number: "A1001".into(),
            role: UserRole::User,
            date_created: at,
            password_hash: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut user = sample();
        let later = user.updated_at + chrono::Duration::seconds(10);
        user.apply(
            &UserUpdate {
                role: Some(UserRole::Staff),
                ..Default::default()
            },
            later,
        );

        assert_eq!(user.name, "Alice Johnson");
        assert_eq!(user.role, UserRole::Staff);
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn badge_lookup_ignores_case() {
        assert!(sample().has_badge("a1001"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn credential_hash_is_never_serialized() {
        let mut user = sample();
        user.password_hash = Some("$argon2id$...".into());
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["_id"], "u1");
        assert_eq!(json["idNumber"], "A1001");
        assert!(json.get("passwordHash").is_none());
    }
}
