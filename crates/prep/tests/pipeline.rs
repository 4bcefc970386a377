use futures::StreamExt;
use prep::{
    brain::{ModelSettings, ProviderError, ProviderType},
    testing::{FakeCalendar, FakeResearcher, FakeSet, ScriptedProvider},
    trace_channel, EventKind, EventRecord, Pipeline, PipelineSettings, PrepError,
};

const CALENDAR_TEXT: &str =
    "Acme Sync, 2:00 PM, attendees: jane@acme.com, bob@operator.com";

const EXTRACTION_JSON: &str = r#"{"meetings":[{
    "title": "Acme Sync",
    "company": "Acme",
    "meeting_time": "2:00 PM",
    "attendees": [
        {"email": "jane@acme.com"},
        {"email": "bob@operator.com", "name": "Bob"}
    ]
}]}"#;

fn settings() -> PipelineSettings {
    PipelineSettings {
        operator_domain: "operator.com".to_string(),
        extraction: ModelSettings::new(ProviderType::OpenAI, "gpt-4.1-nano").with_temperature(0.0),
        formatter: ModelSettings::new(ProviderType::OpenAI, "gpt-4.1"),
    }
}

fn acme_fakes(formatter: ScriptedProvider) -> FakeSet {
    FakeSet::new(
        FakeCalendar::returning(CALENDAR_TEXT),
        ScriptedProvider::new().respond_text(EXTRACTION_JSON),
        FakeResearcher::returning("Jane is VP Engineering at Acme [profile](https://example.com/jane)"),
        formatter,
    )
}

fn kinds(records: &[EventRecord]) -> Vec<EventKind> {
    records.iter().map(|r| r.kind).collect()
}

fn streamed_text(records: &[EventRecord]) -> String {
    records
        .iter()
        .filter(|r| r.kind == EventKind::Streaming)
        .filter_map(|r| r.content.as_str())
        .collect()
}

#[tokio::test]
async fn acme_day_streams_in_stage_order() {
    let fakes = acme_fakes(ScriptedProvider::new().stream_chunks(&[
        "## Acme @ 2:00 PM\n",
        "### Attendees\n",
        "- **jane** ([profile](https://example.com/jane))\n",
    ]));
    let (sink, receiver) = trace_channel();

    let state = Pipeline::new(fakes.collaborators(), settings())
        .run("June 3, 2025", sink)
        .await
        .unwrap();
    let records: Vec<EventRecord> = receiver.into_records().collect().await;

    assert_eq!(
        kinds(&records),
        vec![
            EventKind::CalendarStatus,
            EventKind::CalendarParserStatus,
            EventKind::CompanyEvent,
            EventKind::ReactStatus,
            EventKind::MarkdownFormatterStatus,
            EventKind::Streaming,
            EventKind::Streaming,
            EventKind::Streaming,
        ]
    );
    assert_eq!(records[2].content, "Acme @ 2:00 PM");

    let document = streamed_text(&records);
    assert!(document.contains("## Acme @ 2:00 PM"));
    assert!(!document.contains("bob@operator.com"));
    assert!(state.is_complete());
    assert_eq!(state.formatted_output.get().unwrap(), &document);

    assert_eq!(fakes.calendar.dates(), vec!["June 3, 2025"]);
    let researched = fakes.researcher.seen();
    assert_eq!(researched[0][0].attendees.len(), 1);
    assert!(researched[0][0].attendees.contains_key("jane@acme.com"));

    let formatter_prompt = &fakes.formatter.requests()[0].messages[0].content;
    assert!(formatter_prompt.contains("jane@acme.com"));
    assert!(!formatter_prompt.contains("bob@operator.com"));
}

#[tokio::test]
async fn calendar_failure_stops_before_extraction() {
    let fakes = FakeSet::new(
        FakeCalendar::failing("invalid_grant"),
        ScriptedProvider::new().respond_text(EXTRACTION_JSON),
        FakeResearcher::returning("unused"),
        ScriptedProvider::new().stream_chunks(&["unused"]),
    );
    let (sink, receiver) = trace_channel();

    let err = Pipeline::new(fakes.collaborators(), settings())
        .begin("today", sink)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, PrepError::Calendar(_)));
    assert!(fakes.extractor.requests().is_empty());

    let records: Vec<EventRecord> = receiver.into_records().collect().await;
    assert!(records.iter().all(|r| r.kind != EventKind::Error));
    assert!(records.iter().all(|r| r.kind != EventKind::Streaming));
}

#[tokio::test]
async fn formatter_failure_ends_with_error_record() {
    let fakes = acme_fakes(ScriptedProvider::new().stream_then_fail(
        &["## Acme @ 2:00 PM\n"],
        ProviderError::RequestFailed("connection reset".into()),
    ));
    let (sink, receiver) = trace_channel();

    let err = Pipeline::new(fakes.collaborators(), settings())
        .run("today", sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PrepError::Provider(_)));

    let records: Vec<EventRecord> = receiver.into_records().collect().await;
    let last = records.last().unwrap();
    assert_eq!(last.kind, EventKind::Error);
    assert!(last.content.as_str().unwrap().contains("connection reset"));
    assert_eq!(streamed_text(&records), "## Acme @ 2:00 PM\n");
}

#[tokio::test]
async fn research_failure_skips_formatting() {
    let fakes = FakeSet::new(
        FakeCalendar::returning(CALENDAR_TEXT),
        ScriptedProvider::new().respond_text(EXTRACTION_JSON),
        FakeResearcher::failing("agent stopped"),
        ScriptedProvider::new().stream_chunks(&["unused"]),
    );
    let (sink, receiver) = trace_channel();

    assert!(Pipeline::new(fakes.collaborators(), settings())
        .run("today", sink)
        .await
        .is_err());

    let records: Vec<EventRecord> = receiver.into_records().collect().await;
    assert_eq!(
        kinds(&records),
        vec![
            EventKind::CalendarStatus,
            EventKind::CalendarParserStatus,
            EventKind::CompanyEvent,
            EventKind::ReactStatus,
            EventKind::Error,
        ]
    );
    assert!(fakes.formatter.requests().is_empty());
}

#[tokio::test]
async fn dropped_reader_abandons_run() {
    let fakes = acme_fakes(ScriptedProvider::new().stream_then_hang(&["## Acme"]));
    let (sink, receiver) = trace_channel();

    let fetched = Pipeline::new(fakes.collaborators(), settings())
        .begin("today", sink)
        .await
        .unwrap();
    assert_eq!(fetched.state().calendar_data.get().unwrap(), CALENDAR_TEXT);
    let run = tokio::spawn(fetched.finish());

    let mut records = Box::pin(receiver.into_records());
    while let Some(record) = records.next().await {
        if record.kind == EventKind::Streaming {
            break;
        }
    }
    drop(records);

    let outcome = run.await.unwrap();
    assert!(matches!(outcome, Err(PrepError::StreamClosed)));
}
