//! Team member import over HTTP.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use common::{auth_header_for, TestHarness};

use crewcal_core::UserId;
use crewcal_store::Store;

const CSV: &str = "\u{feff}Name,Email,Department,Birthday,Start Date,Gender\n\
    Ada Lovelace,ada@example.com,Engineering,1990-05-01,2020-01-15,female\n\
    Bob Smith,bob@example.com, engineering ,15/03/1985,01/02/2019,male\n\
    Cy Young,cy@example.com,Sales,03.03.1992,2021-06-01,\n\
    ,,,,,\n\
    No Birthday,nb@example.com,Sales,,2021-06-01,\n";

#[tokio::test]
async fn csv_import_counts_rows_and_creates_departments() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team.csv")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .bytes(CSV.into())
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["total_rows"], 4);
    assert_eq!(body["valid_rows"], 3);
    assert_eq!(body["imported"], 3);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["departments_created"], 2);

    let profile = harness
        .store
        .get_profile(&harness.test_user_id)
        .unwrap()
        .unwrap();
    let members = harness
        .store
        .list_team_members(&profile.system_account_id)
        .unwrap();
    assert_eq!(members.len(), 3);
    let bob = members.iter().find(|m| m.email == "bob@example.com").unwrap();
    assert_eq!(bob.birthday.to_string(), "1985-03-15");
    assert_eq!(bob.department.as_deref(), Some("engineering"));

    let mut departments: Vec<_> = harness
        .store
        .list_departments(&profile.system_account_id)
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    departments.sort();
    assert_eq!(departments, vec!["Engineering", "Sales"]);
}

#[tokio::test]
async fn second_import_reuses_departments() {
    let harness = TestHarness::new();
    for expected_created in [2, 0] {
        let body: serde_json::Value = harness
            .server
            .post("/v1/team-members/import")
            .add_query_param("filename", "team.csv")
            .add_header(AUTHORIZATION, harness.user_auth_header())
            .bytes(CSV.into())
            .await
            .json();
        assert_eq!(body["departments_created"], expected_created);
    }
}

#[tokio::test]
async fn unsupported_file_type_is_rejected() {
    let harness = TestHarness::new();
    let response = harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team.pdf")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .bytes("%PDF-1.4".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn file_without_valid_rows_is_rejected() {
    let harness = TestHarness::new();
    let response = harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team.csv")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .bytes("Name,Email,Birthday,Start Date\nA,a@example.com,,2020-01-01\n".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("No valid data found"));
}

#[tokio::test]
async fn import_requires_authentication() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team.csv")
        .bytes(CSV.into())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn export_reimports_into_another_account() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team.csv")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .bytes(CSV.into())
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/team-members/export")
        .add_query_param("format", "csv")
        .add_query_param("dateFormat", "DD/MM/YYYY")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "text/csv; charset=utf-8");

    let exported = response.text();
    let lines: Vec<&str> = exported.lines().collect();
    assert_eq!(lines[0], "Name,Email,Birthday,Start Date,Department,Gender,Active");
    assert_eq!(
        lines[1],
        "Ada Lovelace,ada@example.com,01/05/1990,15/01/2020,Engineering,female,Yes"
    );
    assert_eq!(lines.len(), 4);

    let other = UserId::generate();
    let body: serde_json::Value = harness
        .server
        .post("/v1/team-members/import")
        .add_query_param("filename", "team-members.csv")
        .add_header(AUTHORIZATION, auth_header_for(&other))
        .bytes(exported.into_bytes().into())
        .await
        .json();
    assert_eq!(body["imported"], 3);
    assert_eq!(body["departments_created"], 2);

    let account = harness.store.get_profile(&other).unwrap().unwrap().system_account_id;
    let members = harness.store.list_team_members(&account).unwrap();
    let bob = members.iter().find(|m| m.email == "bob@example.com").unwrap();
    assert_eq!(bob.birthday.to_string(), "1985-03-15");
    assert_eq!(bob.start_date.to_string(), "2019-02-01");
}

#[tokio::test]
async fn empty_team_exports_template_row() {
    let harness = TestHarness::new();
    let response = harness
        .server
        .get("/v1/team-members/export")
        .add_query_param("dateFormat", "YYYYMMDD")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await;
    response.assert_status_ok();

    let exported = response.text();
    let lines: Vec<&str> = exported.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Name,Email,Birthday,Start Date,Department,Gender,Active",
            "John Doe,john.doe@example.com,19900115,20220301,Engineering,male,Yes",
        ]
    );
}

#[tokio::test]
async fn export_rejects_unknown_formats() {
    let harness = TestHarness::new();
    for (key, value) in [("format", "xlsx"), ("dateFormat", "DD.MM.YYYY")] {
        harness
            .server
            .get("/v1/team-members/export")
            .add_query_param(key, value)
            .add_header(AUTHORIZATION, harness.user_auth_header())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
    harness
        .server
        .get("/v1/team-members/export")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
