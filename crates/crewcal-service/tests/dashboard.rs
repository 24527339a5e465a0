//! Dashboard loader.

mod common;

use axum::http::header::AUTHORIZATION;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use common::TestHarness;

use crewcal_core::format_date;

/// `date` moved back `years` years, clamped to the 28th to dodge leap days.
fn years_before(date: NaiveDate, years: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() - years, date.month(), date.day().min(28)).unwrap()
}

async fn import(harness: &TestHarness, csv: String) {
    harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team.csv")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .bytes(csv.into())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn empty_team_has_zeroed_dashboard() {
    let harness = TestHarness::new();
    let response = harness
        .server
        .get("/v1/dashboard")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["insights"]["total_members"], 0);
    assert_eq!(body["eventDistribution"].as_array().unwrap().len(), 12);
    assert_eq!(body["upcomingEvents"]["birthdays"], serde_json::json!([]));
}

#[tokio::test]
async fn dashboard_combines_all_three_reads() {
    let harness = TestHarness::new();
    let today = Utc::now().date_naive();
    let soon = today + Duration::days(3);
    let later = today + Duration::days(120);

    let csv = format!(
        "Name,Email,Birthday,Start Date,Gender\n\
         Ada,ada@example.com,{},{},female\n\
         Bob,bob@example.com,{},{},male\n",
        format_date(years_before(soon, 30)),
        format_date(years_before(soon, 2)),
        format_date(years_before(later, 40)),
        format_date(years_before(later, 5)),
    );
    import(&harness, csv).await;

    let body: serde_json::Value = harness
        .server
        .get("/v1/dashboard")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await
        .json();

    let insights = &body["insights"];
    assert_eq!(insights["total_members"], 2);
    assert_eq!(insights["gender_ratio"], 50.0);

    let distribution = body["eventDistribution"].as_array().unwrap();
    let birthdays: u64 = distribution
        .iter()
        .map(|m| m["birthdays"].as_u64().unwrap())
        .sum();
    assert_eq!(birthdays, 2);

    let upcoming = &body["upcomingEvents"];
    let upcoming_birthdays = upcoming["birthdays"].as_array().unwrap();
    assert_eq!(upcoming_birthdays.len(), 1);
    assert_eq!(upcoming_birthdays[0]["name"], "Ada");
    assert_eq!(upcoming_birthdays[0]["years"], 30);

    let anniversaries = upcoming["workiversaries"].as_array().unwrap();
    assert_eq!(anniversaries.len(), 1);
    assert_eq!(anniversaries[0]["name"], "Ada");
    assert_eq!(anniversaries[0]["years"], 2);
}

#[tokio::test]
async fn dashboard_is_scoped_to_the_callers_account() {
    let harness = TestHarness::new();
    let today = Utc::now().date_naive();
    import(
        &harness,
        format!(
            "Name,Email,Birthday,Start Date\nAda,ada@example.com,{},{}\n",
            format_date(years_before(today, 30)),
            format_date(years_before(today, 1)),
        ),
    )
    .await;

    let stranger = crewcal_core::UserId::generate();
    let body: serde_json::Value = harness
        .server
        .get("/v1/dashboard")
        .add_header(AUTHORIZATION, common::auth_header_for(&stranger))
        .await
        .json();
    assert_eq!(body["insights"]["total_members"], 0);
}
