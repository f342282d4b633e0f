//! Chambers, memberships, and member businesses.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{BusinessId, ChamberId, DomainError, UserId};

/// A tenant organization (a chamber of commerce).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chamber {
    pub id: ChamberId,
    pub name: String,
    pub slug: String,
}

impl Chamber {
    pub fn new(id: ChamberId, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
        }
    }
}

/// Role a user holds inside one chamber.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Admin,
    Staff,
    Member,
}

impl MembershipRole {
    /// Privilege rank, higher is more privileged.
    pub fn rank(self) -> u8 {
        match self {
            MembershipRole::Admin => 2,
            MembershipRole::Staff => 1,
            MembershipRole::Member => 0,
        }
    }

    /// True if this role carries at least the privileges of `other`.
    pub fn at_least(self, other: MembershipRole) -> bool {
        self.rank() >= other.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MembershipRole::Admin => "admin",
            MembershipRole::Staff => "staff",
            MembershipRole::Member => "member",
        }
    }
}

impl core::fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(MembershipRole::Admin),
            "staff" => Ok(MembershipRole::Staff),
            "member" => Ok(MembershipRole::Member),
            other => Err(DomainError::unknown_variant("membership role", other)),
        }
    }
}

/// Lifecycle state of a membership row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Active,
    Pending,
    Suspended,
    Expired,
    /// Any status string this layer does not recognise.
    #[serde(other)]
    Unknown,
}

impl MembershipStatus {
    pub fn is_active(self) -> bool {
        self == MembershipStatus::Active
    }
}

/// Row of `chamber_memberships`, joined with its chamber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChamberMembership {
    pub user_id: UserId,
    pub chamber_id: ChamberId,
    pub role: MembershipRole,
    #[serde(default)]
    pub status: MembershipStatus,
    /// The joined `chambers` row; absent if the join returned nothing.
    #[serde(default)]
    pub chamber: Option<Chamber>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl ChamberMembership {
    pub fn new(user_id: UserId, chamber: Chamber, role: MembershipRole) -> Self {
        Self {
            user_id,
            chamber_id: chamber.id,
            role,
            status: MembershipStatus::Active,
            chamber: Some(chamber),
            joined_at: None,
        }
    }

    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }
}

/// A `chamber_memberships` result set that tolerates bad rows.
///
/// A row that fails to parse (unknown role, missing column) is dropped and
/// counted instead of failing the whole list, so one bad row cannot hide
/// the user's other chambers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipRows {
    pub rows: Vec<ChamberMembership>,
    pub skipped: usize,
}

impl<'de> Deserialize<'de> for MembershipRows {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Row {
            Valid(ChamberMembership),
            Invalid(IgnoredAny),
        }

        let mut result = MembershipRows::default();
        for row in Vec::<Row>::deserialize(deserializer)? {
            match row {
                Row::Valid(membership) => result.rows.push(membership),
                Row::Invalid(_) => result.skipped += 1,
            }
        }
        Ok(result)
    }
}

/// A member business listed in a chamber directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub chamber_id: ChamberId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl Business {
    pub fn new(
        id: BusinessId,
        chamber_id: ChamberId,
        owner_id: UserId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            chamber_id,
            owner_id,
            name: name.into(),
            email: None,
            phone: None,
            website: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_outranks_staff_outranks_member() {
        assert!(MembershipRole::Admin.at_least(MembershipRole::Staff));
        assert!(MembershipRole::Staff.at_least(MembershipRole::Member));
        assert!(!MembershipRole::Member.at_least(MembershipRole::Staff));
        assert!(MembershipRole::Staff.at_least(MembershipRole::Staff));
    }

    #[test]
    fn unknown_membership_status_does_not_fail_the_row() {
        let json = serde_json::json!({
            "user_id": UserId::new(),
            "chamber_id": ChamberId::new(),
            "role": "staff",
            "status": "archived",
        });
        let membership: ChamberMembership = serde_json::from_value(json).unwrap();
        assert_eq!(membership.status, MembershipStatus::Unknown);
        assert!(!membership.status.is_active());
        assert!(membership.chamber.is_none());
    }

    #[test]
    fn membership_role_parses_from_column_value() {
        assert_eq!("admin".parse::<MembershipRole>().unwrap(), MembershipRole::Admin);
        let err = "owner".parse::<MembershipRole>().unwrap_err();
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn unparseable_membership_rows_are_skipped_not_fatal() {
        let user_id = UserId::new();
        let json = serde_json::json!([
            { "user_id": user_id, "chamber_id": ChamberId::new(), "role": "admin" },
            { "user_id": user_id, "chamber_id": ChamberId::new(), "role": "owner" },
            { "user_id": user_id, "role": "member" },
            { "user_id": user_id, "chamber_id": ChamberId::new(), "role": "member", "status": "pending" },
        ]);
        let parsed: MembershipRows = serde_json::from_value(json).unwrap();

        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].role, MembershipRole::Admin);
        assert_eq!(parsed.rows[1].status, MembershipStatus::Pending);
    }
}
