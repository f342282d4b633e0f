//! Identity and profile records.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Signed-in user as reported by the identity service.
///
/// Opaque beyond id and email; everything else lives on [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Whether the identity service has confirmed the email address.
    #[serde(default)]
    pub email_confirmed: bool,
}

impl User {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            email_confirmed: true,
        }
    }
}

/// Profile-level role, stored on `user_profiles.role`.
///
/// Independent of any chamber membership role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProfileRole {
    ChamberAdmin,
    BusinessOwner,
    Member,
    /// A role the platform knows about but this layer does not interpret.
    Other(String),
}

impl ProfileRole {
    pub fn as_str(&self) -> &str {
        match self {
            ProfileRole::ChamberAdmin => "chamber_admin",
            ProfileRole::BusinessOwner => "business_owner",
            ProfileRole::Member => "member",
            ProfileRole::Other(other) => other,
        }
    }
}

impl From<String> for ProfileRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "chamber_admin" => ProfileRole::ChamberAdmin,
            "business_owner" => ProfileRole::BusinessOwner,
            "member" => ProfileRole::Member,
            _ => ProfileRole::Other(value),
        }
    }
}

impl From<ProfileRole> for String {
    fn from(value: ProfileRole) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of `user_profiles` (1:1 with [`User`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserProfile {
    /// Same value as the owning [`User::id`].
    pub id: UserId,
    pub role: ProfileRole,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn new(id: UserId, role: ProfileRole) -> Self {
        Self {
            id,
            role,
            full_name: None,
            avatar_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_deserialize_to_variants() {
        let role: ProfileRole = serde_json::from_str("\"chamber_admin\"").unwrap();
        assert_eq!(role, ProfileRole::ChamberAdmin);

        let role: ProfileRole = serde_json::from_str("\"business_owner\"").unwrap();
        assert_eq!(role, ProfileRole::BusinessOwner);
    }

    #[test]
    fn unknown_roles_are_preserved() {
        let role: ProfileRole = serde_json::from_str("\"event_coordinator\"").unwrap();
        assert_eq!(role, ProfileRole::Other("event_coordinator".to_string()));
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"event_coordinator\"");
    }

    #[test]
    fn profile_row_tolerates_missing_optional_columns() {
        let id = UserId::new();
        let json = serde_json::json!({ "id": id, "role": "member" });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.role, ProfileRole::Member);
        assert!(profile.full_name.is_none());
    }
}
