use chrono::NaiveDate;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{TEST_PROPERTY_ID, report_row, spawn_app};

#[tokio::test]
async fn returns_one_record_per_url_in_input_order() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    app.mock_report(serde_json::json!({
        "rows": [
            report_row("/a", 10, 8, 0.5, 30.0, 5),
            report_row("/c", 99, 70, 0.1, 120.0, 80),
        ],
        "rowCount": 2
    }))
    .await;

    let body = app.analyze_body(&[
        "https://site.com/c",
        "https://site.com/a",
        "https://site.com/b",
    ]);

    // act
    let response = app.post_analyze(&body).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let payload: serde_json::Value = response.json().await.expect("body is JSON");
    assert_eq!(payload["success"], true);

    let data = payload["data"].as_array().expect("data is an array");
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["pagePath"], "/c");
    assert_eq!(data[0]["sessions"], 99);
    assert_eq!(data[1]["pagePath"], "/a");
    assert_eq!(data[1]["sessions"], 10);
    assert_eq!(data[2]["pagePath"], "/b");
    assert_eq!(data[2]["sessions"], 0);
}

#[tokio::test]
async fn unmatched_urls_come_back_zero_filled_rather_than_omitted() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    app.mock_report(serde_json::json!({
        "rows": [report_row("/a", 150, 120, 0.42, 63.5, 90)],
        "rowCount": 1
    }))
    .await;

    let body = app.analyze_body(&["https://site.com/a", "https://site.com/b"]);

    // act
    let response = app.post_analyze(&body).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let payload: serde_json::Value = response.json().await.expect("body is JSON");
    let data = payload["data"].as_array().expect("data is an array");
    assert_eq!(data.len(), 2);

    assert_eq!(data[0]["pagePath"], "/a");
    assert_eq!(data[0]["sessions"], 150);
    assert_eq!(data[0]["totalUsers"], 120);
    assert_eq!(data[0]["bounceRate"], 0.42);
    assert_eq!(data[0]["averageSessionDuration"], 63.5);
    assert_eq!(data[0]["engagedSessions"], 90);

    assert_eq!(data[1]["pagePath"], "/b");
    assert_eq!(data[1]["sessions"], 0);
    assert_eq!(data[1]["totalUsers"], 0);
    assert_eq!(data[1]["bounceRate"], 0.0);
    assert_eq!(data[1]["averageSessionDuration"], 0.0);
    assert_eq!(data[1]["engagedSessions"], 0);
}

#[tokio::test]
async fn omitting_days_back_requests_a_seven_day_window() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    app.mock_report(serde_json::json!({"rowCount": 0})).await;

    let body = app.analyze_body(&["https://site.com/a"]);

    // act
    let response = app.post_analyze(&body).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let report_request = report_request_body(&app).await;

    assert_eq!(
        report_request["dimensions"],
        serde_json::json!([{"name": "pagePath"}])
    );
    assert_eq!(
        report_request["metrics"],
        serde_json::json!([
            {"name": "sessions"},
            {"name": "totalUsers"},
            {"name": "bounceRate"},
            {"name": "averageSessionDuration"},
            {"name": "engagedSessions"}
        ])
    );

    let (start, end) = requested_date_range(&report_request);
    assert_eq!((end - start).num_days(), 7);
}

#[tokio::test]
async fn omitting_days_back_behaves_like_days_back_seven() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    app.mock_report(serde_json::json!({"rowCount": 0})).await;

    let mut explicit = app.analyze_body(&["https://site.com/a"]);
    explicit["daysBack"] = serde_json::json!(7);
    let implicit = app.analyze_body(&["https://site.com/a"]);

    // act
    assert_eq!(app.post_analyze(&explicit).await.status().as_u16(), 200);
    assert_eq!(app.post_analyze(&implicit).await.status().as_u16(), 200);

    // assert
    let report_requests: Vec<serde_json::Value> = app
        .upstream_requests()
        .await
        .iter()
        .filter(|r| r.url.path().ends_with(":runReport"))
        .map(|r| serde_json::from_slice(&r.body).expect("report body is JSON"))
        .collect();
    assert_eq!(report_requests.len(), 2);
    assert_eq!(report_requests[0]["dateRanges"], report_requests[1]["dateRanges"]);
}

#[tokio::test]
async fn the_report_call_carries_the_exchanged_bearer_token() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    app.mock_report(serde_json::json!({"rowCount": 0})).await;

    // act
    let response = app.post_analyze(&app.analyze_body(&["https://site.com/a"])).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let requests = app.upstream_requests().await;
    let report_request = requests
        .iter()
        .find(|r| r.url.path().ends_with(":runReport"))
        .expect("a report request was issued");
    let authorization = report_request
        .headers
        .get("authorization")
        .expect("authorization header present")
        .to_str()
        .expect("authorization header is ASCII");
    assert_eq!(authorization, "Bearer test-access-token");
}

#[tokio::test]
async fn snake_case_field_names_are_still_accepted() {
    // arrange: the original service spoke snake_case, existing callers still do
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    app.mock_report(serde_json::json!({"rowCount": 0})).await;

    let body = serde_json::json!({
        "property_id": TEST_PROPERTY_ID,
        "credentials": app.service_account_key(),
        "urls": ["https://site.com/a"],
        "days_back": 14,
    });

    // act
    let response = app.post_analyze(&body).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let report_request = report_request_body(&app).await;
    let (start, end) = requested_date_range(&report_request);
    assert_eq!((end - start).num_days(), 14);
}

#[tokio::test]
async fn a_rejected_assertion_maps_to_invalid_credentials() {
    // arrange
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&app.ga4_server)
        .await;

    // act
    let response = app.post_analyze(&app.analyze_body(&["https://site.com/a"])).await;

    // assert
    assert_eq!(response.status().as_u16(), 500);
    let payload: serde_json::Value = response.json().await.expect("body is JSON");
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error"], "Invalid credentials");
}

#[tokio::test]
async fn a_permission_denied_report_maps_to_invalid_credentials() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/v1beta/properties/{TEST_PROPERTY_ID}:runReport"
        )))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "code": 403,
                "message": "User does not have sufficient permissions for this property.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&app.ga4_server)
        .await;

    // act
    let response = app.post_analyze(&app.analyze_body(&["https://site.com/a"])).await;

    // assert
    assert_eq!(response.status().as_u16(), 500);
    let payload: serde_json::Value = response.json().await.expect("body is JSON");
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error"], "Invalid credentials");
}

#[tokio::test]
async fn upstream_query_failures_surface_the_upstream_message() {
    // arrange
    let app = spawn_app().await;
    app.mock_token_exchange().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/v1beta/properties/{TEST_PROPERTY_ID}:runReport"
        )))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "code": 400,
                "message": "Property 999 not found",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&app.ga4_server)
        .await;

    // act
    let response = app.post_analyze(&app.analyze_body(&["https://site.com/a"])).await;

    // assert
    assert_eq!(response.status().as_u16(), 500);
    let payload: serde_json::Value = response.json().await.expect("body is JSON");
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error"], "Property 999 not found");
}

async fn report_request_body(app: &crate::helpers::TestApp) -> serde_json::Value {
    let requests = app.upstream_requests().await;
    let report_request = requests
        .iter()
        .find(|r| r.url.path().ends_with(":runReport"))
        .expect("a report request was issued");
    serde_json::from_slice(&report_request.body).expect("report body is JSON")
}

fn requested_date_range(report_request: &serde_json::Value) -> (NaiveDate, NaiveDate) {
    let range = &report_request["dateRanges"][0];
    let start = NaiveDate::parse_from_str(range["startDate"].as_str().unwrap(), "%Y-%m-%d")
        .expect("startDate is a date");
    let end = NaiveDate::parse_from_str(range["endDate"].as_str().unwrap(), "%Y-%m-%d")
        .expect("endDate is a date");
    (start, end)
}
