//! Team members and departments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DepartmentId, SystemAccountId, TeamMemberId};
use crate::import::ImportedMember;

/// Gender as recorded on a team member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Other.
    Other,
    /// Not disclosed; also the fallback for unrecognised input.
    #[default]
    PreferNotToSay,
}

impl Gender {
    /// Interpret a free-form cell. Unrecognised values become `PreferNotToSay`.
    #[must_use]
    pub fn from_cell(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            "other" => Self::Other,
            _ => Self::PreferNotToSay,
        }
    }

    /// The serialized token, e.g. `prefer-not-to-say`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::PreferNotToSay => "prefer-not-to-say",
        }
    }
}

/// A persisted team member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Time-ordered id.
    pub id: TeamMemberId,
    /// Owning account.
    pub system_account_id: SystemAccountId,
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Department name, if any.
    pub department: Option<String>,
    /// Date of birth.
    pub birthday: NaiveDate,
    /// First day at the company.
    pub start_date: NaiveDate,
    /// Gender.
    pub gender: Gender,
    /// Whether the member is currently active.
    pub active: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    /// Build a new member for `account` from an imported row.
    #[must_use]
    pub fn from_import(account: SystemAccountId, row: &ImportedMember) -> Self {
        let now = Utc::now();
        Self {
            id: TeamMemberId::generate(),
            system_account_id: account,
            name: row.name.clone(),
            email: row.email.clone(),
            department: row.department.clone(),
            birthday: row.birthday,
            start_date: row.start_date,
            gender: row.gender,
            active: row.active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A department belonging to a system account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// Department id.
    pub id: DepartmentId,
    /// Owning account.
    pub system_account_id: SystemAccountId,
    /// Display name, unique per account ignoring case.
    pub name: String,
    /// When the department was created.
    pub created_at: DateTime<Utc>,
}

impl Department {
    /// Create a department named `name` under `account`.
    #[must_use]
    pub fn new(account: SystemAccountId, name: impl Into<String>) -> Self {
        Self {
            id: DepartmentId::generate(),
            system_account_id: account,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
