use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use prep::{
    PipelineSettings,
    brain::{ModelSettings, ProviderError, ProviderType},
    testing::{FakeCalendar, FakeResearcher, FakeSet, ScriptedProvider},
};
use server::{AppState, routes};
use tower::ServiceExt;

const EXTRACTION_JSON: &str = r#"{"meetings":[{"title":"Acme Sync","company":"Acme",
    "meeting_time":"2:00 PM","attendees":[{"email":"jane@acme.com"},{"email":"bob@operator.com"}]}]}"#;

fn app(fakes: &FakeSet) -> axum::Router {
    let settings = PipelineSettings {
        operator_domain: "operator.com".to_string(),
        extraction: ModelSettings::new(ProviderType::OpenAI, "gpt-4.1-nano"),
        formatter: ModelSettings::new(ProviderType::OpenAI, "gpt-4.1"),
    };
    routes::router(
        AppState::new(fakes.collaborators(), settings),
        &["http://localhost:5173".to_string()],
    )
}

fn analyze(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze-meetings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn lines(response: axum::response::Response) -> Vec<serde_json::Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn streams_ndjson_event_records() {
    let fakes = FakeSet::new(
        FakeCalendar::returning("Acme Sync, 2:00 PM, attendees: jane@acme.com, bob@operator.com"),
        ScriptedProvider::new().respond_text(EXTRACTION_JSON),
        FakeResearcher::returning("Jane is VP Engineering at Acme"),
        ScriptedProvider::new().stream_chunks(&["## Acme @ 2:00 PM\n", "- **jane**\n"]),
    );

    let response = app(&fakes)
        .oneshot(analyze(r#"{"date": "June 3, 2025"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let records = lines(response).await;
    let types: Vec<&str> = records.iter().map(|r| r["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec![
            "calendar_status",
            "calendar_parser_status",
            "company_event",
            "react_status",
            "markdown_formatter_status",
            "streaming",
            "streaming",
        ]
    );
    assert_eq!(records[2]["content"], "Acme @ 2:00 PM");

    let document: String = records
        .iter()
        .filter(|r| r["type"] == "streaming")
        .map(|r| r["content"].as_str().unwrap())
        .collect();
    assert!(document.contains("## Acme @ 2:00 PM"));
    assert!(!document.contains("bob@operator.com"));
}

#[tokio::test]
async fn calendar_failure_returns_single_error_body() {
    let fakes = FakeSet::new(
        FakeCalendar::failing("invalid_grant"),
        ScriptedProvider::new(),
        FakeResearcher::returning("unused"),
        ScriptedProvider::new(),
    );

    let response = app(&fakes)
        .oneshot(analyze(r#"{"date": "today"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_type"], "CalendarError");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("invalid_grant"));
    assert!(!message.starts_with("CalendarError"));
    assert!(body.get("type").is_none());
}

#[tokio::test]
async fn mid_stream_failure_ends_with_error_record() {
    let fakes = FakeSet::new(
        FakeCalendar::returning("Acme Sync 2pm"),
        ScriptedProvider::new().respond_text(EXTRACTION_JSON),
        FakeResearcher::returning("findings"),
        ScriptedProvider::new().stream_then_fail(
            &["## Acme"],
            ProviderError::RateLimited {
                retry_after_ms: Some(1000),
            },
        ),
    );

    let response = app(&fakes)
        .oneshot(analyze(r#"{"date": "today"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = lines(response).await;
    let last = records.last().unwrap();
    assert_eq!(last["type"], "error");
    assert!(last["content"].as_str().unwrap().contains("Rate limited"));
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let fakes = FakeSet::new(
        FakeCalendar::returning("unused"),
        ScriptedProvider::new(),
        FakeResearcher::returning("unused"),
        ScriptedProvider::new(),
    );

    let response = app(&fakes)
        .oneshot(analyze(r#"{"day": "today"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fakes.calendar.dates().is_empty());
}

#[tokio::test]
async fn health_reports_ok() {
    let fakes = FakeSet::new(
        FakeCalendar::returning("unused"),
        ScriptedProvider::new(),
        FakeResearcher::returning("unused"),
        ScriptedProvider::new(),
    );

    let response = app(&fakes)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn cors_allows_ui_origin() {
    let fakes = FakeSet::new(
        FakeCalendar::returning("unused"),
        ScriptedProvider::new(),
        FakeResearcher::returning("unused"),
        ScriptedProvider::new(),
    );

    let response = app(&fakes)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/analyze-meetings")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
}
