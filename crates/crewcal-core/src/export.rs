//! Team member export.
//!
//! Export rows use the same column names the importer recognises, so an
//! exported file can be imported again.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::team::TeamMember;

/// Column headers of an export, in order.
pub const EXPORT_HEADERS: [&str; 7] = [
    "Name",
    "Email",
    "Birthday",
    "Start Date",
    "Department",
    "Gender",
    "Active",
];

/// How dates are written in an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportDateFormat {
    /// `DD/MM/YYYY`
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYear,
    /// `MM/DD/YYYY`
    #[serde(rename = "MM/DD/YYYY")]
    MonthDayYear,
    /// `YYYY-MM-DD`
    #[default]
    #[serde(rename = "YYYY-MM-DD")]
    Iso,
    /// `YYYYMMDD`
    #[serde(rename = "YYYYMMDD")]
    Compact,
}

impl ExportDateFormat {
    /// The format's display label, also its wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DayMonthYear => "DD/MM/YYYY",
            Self::MonthDayYear => "MM/DD/YYYY",
            Self::Iso => "YYYY-MM-DD",
            Self::Compact => "YYYYMMDD",
        }
    }

    /// Render `date` in this format.
    #[must_use]
    pub fn format(self, date: NaiveDate) -> String {
        let pattern = match self {
            Self::DayMonthYear => "%d/%m/%Y",
            Self::MonthDayYear => "%m/%d/%Y",
            Self::Iso => "%Y-%m-%d",
            Self::Compact => "%Y%m%d",
        };
        date.format(pattern).to_string()
    }
}

impl fmt::Display for ExportDateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportDateFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DD/MM/YYYY" => Ok(Self::DayMonthYear),
            "MM/DD/YYYY" => Ok(Self::MonthDayYear),
            "YYYY-MM-DD" => Ok(Self::Iso),
            "YYYYMMDD" => Ok(Self::Compact),
            _ => Err(CoreError::UnknownDateFormat(s.to_string())),
        }
    }
}

/// One exported member, every cell already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Date of birth.
    pub birthday: String,
    /// First day at the company.
    pub start_date: String,
    /// Department, empty when unset.
    pub department: String,
    /// Gender token.
    pub gender: String,
    /// `Yes` or `No`.
    pub active: String,
}

impl ExportRow {
    fn from_member(member: &TeamMember, date_format: ExportDateFormat) -> Self {
        Self {
            name: member.name.clone(),
            email: member.email.clone(),
            birthday: date_format.format(member.birthday),
            start_date: date_format.format(member.start_date),
            department: member.department.clone().unwrap_or_default(),
            gender: member.gender.as_str().to_string(),
            active: if member.active { "Yes" } else { "No" }.to_string(),
        }
    }

    /// Example row offered when there is nothing to export.
    #[must_use]
    pub fn template(date_format: ExportDateFormat) -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).map(|d| date_format.format(d));
        Self {
            name: "John Doe".into(),
            email: "john.doe@example.com".into(),
            birthday: date(1990, 1, 15).unwrap_or_default(),
            start_date: date(2022, 3, 1).unwrap_or_default(),
            department: "Engineering".into(),
            gender: "male".into(),
            active: "Yes".into(),
        }
    }

    /// Cells in [`EXPORT_HEADERS`] order.
    #[must_use]
    pub fn cells(&self) -> [&str; 7] {
        [
            &self.name,
            &self.email,
            &self.birthday,
            &self.start_date,
            &self.department,
            &self.gender,
            &self.active,
        ]
    }
}

/// Render members for export, sorted by name. An empty team yields a single
/// template row.
#[must_use]
pub fn export_rows(members: &[TeamMember], date_format: ExportDateFormat) -> Vec<ExportRow> {
    if members.is_empty() {
        return vec![ExportRow::template(date_format)];
    }
    let mut sorted: Vec<&TeamMember> = members.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
        .into_iter()
        .map(|m| ExportRow::from_member(m, date_format))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_date;
    use crate::ids::SystemAccountId;
    use crate::import::ImportedMember;
    use crate::team::Gender;

    fn member(name: &str, birthday: NaiveDate) -> TeamMember {
        TeamMember::from_import(
            SystemAccountId::generate(),
            &ImportedMember {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                department: None,
                birthday,
                start_date: NaiveDate::from_ymd_opt(2020, 2, 3).unwrap(),
                gender: Gender::PreferNotToSay,
                active: false,
            },
        )
    }

    #[test]
    fn date_formats_render_and_parse_labels() {
        let date = NaiveDate::from_ymd_opt(1990, 4, 3).unwrap();
        let rendered: Vec<_> = [
            ExportDateFormat::DayMonthYear,
            ExportDateFormat::MonthDayYear,
            ExportDateFormat::Iso,
            ExportDateFormat::Compact,
        ]
        .into_iter()
        .map(|f| {
            assert_eq!(f.as_str().parse::<ExportDateFormat>().unwrap(), f);
            f.format(date)
        })
        .collect();
        assert_eq!(rendered, ["03/04/1990", "04/03/1990", "1990-04-03", "19900403"]);
        assert!("dd.mm.yyyy".parse::<ExportDateFormat>().is_err());
    }

    #[test]
    fn empty_team_exports_template() {
        let rows = export_rows(&[], ExportDateFormat::Compact);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "John Doe");
        assert_eq!(rows[0].birthday, "19900115");
    }

    #[test]
    fn rows_are_sorted_and_reimportable() {
        let birthday = NaiveDate::from_ymd_opt(1988, 12, 31).unwrap();
        let rows = export_rows(
            &[member("Zoe", birthday), member("Ann", birthday)],
            ExportDateFormat::DayMonthYear,
        );
        assert_eq!(rows[0].name, "Ann");
        assert_eq!(rows[0].active, "No");
        assert_eq!(rows[0].department, "");
        assert_eq!(rows[0].gender, "prefer-not-to-say");
        assert_eq!(parse_date(&rows[0].birthday), Some(birthday));
    }
}
