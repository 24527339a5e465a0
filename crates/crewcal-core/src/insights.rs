//! Dashboard aggregates over an account's team members.
//!
//! All functions take `today` explicitly so results are reproducible. Only
//! active members count.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ids::TeamMemberId;
use crate::team::{Gender, TeamMember};

/// How far ahead the upcoming-events list looks.
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

const DAYS_PER_YEAR: f64 = 365.25;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamInsights {
    /// Active members.
    pub total_members: usize,
    /// Mean tenure in years, one decimal.
    pub average_employment_time: f64,
    /// Mean age in years, one decimal.
    pub average_age: f64,
    /// Share of female members in percent, one decimal.
    pub gender_ratio: f64,
}

/// Event counts for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyEvents {
    /// Short month name.
    pub month: String,
    /// Birthdays falling in the month.
    pub birthdays: usize,
    /// Work anniversaries falling in the month.
    pub workiversaries: usize,
}

/// Kind of upcoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpcomingEventKind {
    /// Birthday.
    Birthday,
    /// Work anniversary.
    Workiversary,
}

/// One upcoming birthday or anniversary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingEvent {
    /// The member.
    pub member_id: TeamMemberId,
    /// Member name.
    pub name: String,
    /// Member department.
    pub department: Option<String>,
    /// Event kind.
    pub kind: UpcomingEventKind,
    /// Date of the next occurrence.
    pub date: NaiveDate,
    /// Days from today (0 = today).
    pub days_until: i64,
    /// Age being turned, or years completed at the company.
    pub years: i32,
}

/// Upcoming events split by kind, each sorted soonest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingEvents {
    /// Birthdays.
    pub birthdays: Vec<UpcomingEvent>,
    /// Work anniversaries.
    pub workiversaries: Vec<UpcomingEvent>,
}

/// Compute the headline insights.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn team_insights(members: &[TeamMember], today: NaiveDate) -> TeamInsights {
    let active: Vec<&TeamMember> = members.iter().filter(|m| m.active).collect();
    if active.is_empty() {
        return TeamInsights::default();
    }
    let count = active.len() as f64;

    let years_since = |date: NaiveDate| (today - date).num_days() as f64 / DAYS_PER_YEAR;
    let tenure: f64 = active.iter().map(|m| years_since(m.start_date)).sum();
    let age: f64 = active.iter().map(|m| years_since(m.birthday)).sum();
    let female = active.iter().filter(|m| m.gender == Gender::Female).count() as f64;

    TeamInsights {
        total_members: active.len(),
        average_employment_time: round1(tenure / count),
        average_age: round1(age / count),
        gender_ratio: round1(female / count * 100.0),
    }
}

/// Count birthdays and anniversaries per calendar month, January first.
#[must_use]
pub fn event_distribution(members: &[TeamMember]) -> Vec<MonthlyEvents> {
    let mut months: Vec<MonthlyEvents> = MONTH_NAMES
        .iter()
        .map(|name| MonthlyEvents {
            month: (*name).to_string(),
            birthdays: 0,
            workiversaries: 0,
        })
        .collect();

    for member in members.iter().filter(|m| m.active) {
        months[member.birthday.month0() as usize].birthdays += 1;
        months[member.start_date.month0() as usize].workiversaries += 1;
    }
    months
}

/// Birthdays and anniversaries within the next `window_days` days.
#[must_use]
pub fn upcoming_events(
    members: &[TeamMember],
    today: NaiveDate,
    window_days: i64,
) -> UpcomingEvents {
    let mut events = UpcomingEvents::default();

    for member in members.iter().filter(|m| m.active) {
        if let Some(event) = next_event(member, UpcomingEventKind::Birthday, today) {
            if event.days_until <= window_days {
                events.birthdays.push(event);
            }
        }
        if let Some(event) = next_event(member, UpcomingEventKind::Workiversary, today) {
            // Nothing to celebrate before the first full year.
            if event.days_until <= window_days && event.years >= 1 {
                events.workiversaries.push(event);
            }
        }
    }

    events.birthdays.sort_by_key(|e| (e.days_until, e.name.clone()));
    events.workiversaries.sort_by_key(|e| (e.days_until, e.name.clone()));
    events
}

fn next_event(
    member: &TeamMember,
    kind: UpcomingEventKind,
    today: NaiveDate,
) -> Option<UpcomingEvent> {
    let origin = match kind {
        UpcomingEventKind::Birthday => member.birthday,
        UpcomingEventKind::Workiversary => member.start_date,
    };

    let mut date = anniversary_in(origin, today.year())?;
    if date < today {
        date = anniversary_in(origin, today.year() + 1)?;
    }

    Some(UpcomingEvent {
        member_id: member.id,
        name: member.name.clone(),
        department: member.department.clone(),
        kind,
        date,
        days_until: (date - today).num_days(),
        years: date.year() - origin.year(),
    })
}

/// The anniversary of `origin` in `year`. 29 February falls on the 28th in common years.
fn anniversary_in(origin: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, origin.month(), origin.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, origin.month(), origin.day() - 1))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
