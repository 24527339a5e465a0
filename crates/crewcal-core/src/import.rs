//! Normalisation of raw spreadsheet rows into team-member records.
//!
//! Header names vary between exports, so every field is resolved through an
//! alias table. Headers are compared trimmed and lower-cased, and the first
//! alias holding a non-empty value wins. Rows lacking a name, an email, a
//! parseable birthday or a parseable start date are dropped whole.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::parse_date;
use crate::team::Gender;

// ============================================================================
// Alias tables
// ============================================================================

const NAME_ALIASES: &[&str] = &["name", "fullname", "full name"];
const EMAIL_ALIASES: &[&str] = &["email", "email address"];
const DEPARTMENT_ALIASES: &[&str] = &["department", "dept", "division"];
const GENDER_ALIASES: &[&str] = &["gender", "sex"];
const ACTIVE_ALIASES: &[&str] = &["active", "status", "enabled"];
const BIRTHDAY_ALIASES: &[&str] = &[
    "birthday",
    "birthdate",
    "birth",
    "dob",
    "date of birth",
    "birth date",
];
const START_DATE_ALIASES: &[&str] = &[
    "startdate",
    "start date",
    "started",
    "joined",
    "join date",
    "joining date",
    "start",
];

/// Values of the active column that mark a member inactive.
const INACTIVE_TOKENS: &[&str] = &["no", "false", "inactive", "0", "disabled"];

/// One spreadsheet row: header/value pairs in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow(Vec<(String, String)>);

impl RawRow {
    /// An empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell.
    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.0.push((header.into(), value.into()));
    }

    /// Header/value pairs in column order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when the row has no cells or every cell is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|(_, v)| v.trim().is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A validated row, ready to be stored as a team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedMember {
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Department name, if the row had one.
    pub department: Option<String>,
    /// Gender, `prefer-not-to-say` when absent or unrecognised.
    pub gender: Gender,
    /// Active flag, true unless the row says otherwise.
    pub active: bool,
    /// Date of birth.
    pub birthday: NaiveDate,
    /// First day at the company.
    pub start_date: NaiveDate,
}

/// Normalise raw rows, keeping only those with every required field.
#[must_use]
pub fn process_rows(rows: &[RawRow]) -> Vec<ImportedMember> {
    rows.iter().filter_map(process_row).collect()
}

fn process_row(row: &RawRow) -> Option<ImportedMember> {
    // Later duplicate headers overwrite earlier ones.
    let cells: HashMap<String, &str> = row
        .cells()
        .map(|(header, value)| (header.trim().to_lowercase(), value.trim()))
        .collect();

    let pick = |aliases: &[&str]| -> Option<&str> {
        aliases
            .iter()
            .find_map(|alias| cells.get(*alias).copied().filter(|v| !v.is_empty()))
    };

    let name = pick(NAME_ALIASES)?;
    let email = pick(EMAIL_ALIASES)?;
    let birthday = pick(BIRTHDAY_ALIASES).and_then(parse_date)?;
    let start_date = pick(START_DATE_ALIASES).and_then(parse_date)?;

    let active = pick(ACTIVE_ALIASES).map_or(true, |value| {
        !INACTIVE_TOKENS.contains(&value.to_lowercase().as_str())
    });

    Some(ImportedMember {
        name: name.to_string(),
        email: email.to_string(),
        department: pick(DEPARTMENT_ALIASES).map(str::to_string),
        gender: pick(GENDER_ALIASES).map_or(Gender::PreferNotToSay, Gender::from_cell),
        active,
        birthday,
        start_date,
    })
}
