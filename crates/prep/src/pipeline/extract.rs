//! Rules that turn the extraction model's output into [`Meeting`]s.

use indexmap::IndexMap;

use super::meeting::{CalendarData, Meeting, RawAttendee};
use crate::{
    events::{StatusKind, TraceSink},
    PrepError, Result,
};

/// Parse the model's structured reply. No repair is attempted.
pub fn parse_calendar_data(text: &str) -> Result<CalendarData> {
    let trimmed = strip_code_fence(text.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| PrepError::Schema(format!("extraction output does not match schema: {}", e)))
}

/// Build meetings in model order, dropping operator-domain attendees and publishing one
/// `company_event` per meeting as it is processed. Meetings left without attendees are kept.
pub fn build_meetings(
    data: CalendarData,
    operator_domain: &str,
    sink: &TraceSink,
) -> Result<Vec<Meeting>> {
    let mut meetings = Vec::with_capacity(data.meetings.len());

    for raw in data.meetings {
        let mut attendees = IndexMap::new();
        for attendee in &raw.attendees {
            if is_operator_email(&attendee.email, operator_domain) {
                tracing::debug!("[EXTRACT] Skipping operator attendee {}", attendee.email);
                continue;
            }
            attendees.insert(attendee.email.clone(), display_name(attendee));
        }

        let meeting = Meeting {
            company: raw.company,
            title: raw.title,
            attendees,
            meeting_time: raw.meeting_time,
        };
        sink.status(StatusKind::CompanyEvent, meeting.label())?;
        meetings.push(meeting);
    }

    Ok(meetings)
}

/// Supplied name, or the local part of the email when none is given
pub fn display_name(attendee: &RawAttendee) -> String {
    match attendee.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => attendee
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Case-insensitive substring match against the operator's domain
pub fn is_operator_email(email: &str, operator_domain: &str) -> bool {
    let domain = operator_domain.trim().trim_start_matches('@').to_lowercase();
    !domain.is_empty() && email.to_lowercase().contains(&domain)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::super::meeting::RawMeeting;
    use super::*;
    use crate::events::{trace_channel, TraceEvent};

    fn attendee(email: &str, name: Option<&str>) -> RawAttendee {
        RawAttendee {
            email: email.into(),
            name: name.map(String::from),
            status: None,
            info: None,
        }
    }

    fn meeting(company: &str, time: &str, attendees: Vec<RawAttendee>) -> RawMeeting {
        RawMeeting {
            title: format!("{} Sync", company),
            company: company.into(),
            attendees,
            meeting_time: time.into(),
        }
    }

    #[test]
    fn name_falls_back_to_email_local_part() {
        assert_eq!(display_name(&attendee("jane@acme.com", None)), "jane");
        assert_eq!(display_name(&attendee("jane@acme.com", Some("  "))), "jane");
        assert_eq!(
            display_name(&attendee("jane@acme.com", Some("Jane Doe"))),
            "Jane Doe"
        );
    }

    #[test]
    fn operator_match_ignores_case() {
        assert!(is_operator_email("Bob@Operator.COM", "operator.com"));
        assert!(is_operator_email("bob@operator.com", "@operator.com"));
        assert!(!is_operator_email("jane@acme.com", "operator.com"));
        assert!(!is_operator_email("jane@acme.com", ""));
    }

    #[test]
    fn filters_operator_attendees_and_keeps_empty_meetings() {
        let (sink, mut receiver) = trace_channel();
        let data = CalendarData {
            meetings: vec![
                meeting(
                    "Acme",
                    "2:00 PM",
                    vec![attendee("jane@acme.com", None), attendee("bob@operator.com", None)],
                ),
                meeting("Initech", "4:30 PM", vec![attendee("amy@operator.com", Some("Amy"))]),
            ],
        };

        let meetings = build_meetings(data, "operator.com", &sink).unwrap();

        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].attendees.get("jane@acme.com").unwrap(), "jane");
        assert!(meetings
            .iter()
            .flat_map(|m| m.attendees.keys())
            .all(|email| !email.contains("operator.com")));
        assert!(meetings[1].attendees.is_empty());

        let events = receiver.drain();
        assert_eq!(
            events,
            vec![
                TraceEvent::status(StatusKind::CompanyEvent, "Acme @ 2:00 PM"),
                TraceEvent::status(StatusKind::CompanyEvent, "Initech @ 4:30 PM"),
            ]
        );
    }

    #[test]
    fn filtering_is_idempotent() {
        let (sink, _receiver) = trace_channel();
        let data = CalendarData {
            meetings: vec![meeting(
                "Acme",
                "9:00 AM",
                vec![attendee("jane@acme.com", Some("Jane")), attendee("x@operator.com", None)],
            )],
        };
        let once = build_meetings(data, "operator.com", &sink).unwrap();

        let again = CalendarData {
            meetings: once
                .iter()
                .map(|m| RawMeeting {
                    title: m.title.clone(),
                    company: m.company.clone(),
                    attendees: m
                        .attendees
                        .iter()
                        .map(|(email, name)| attendee(email, Some(name.as_str())))
                        .collect(),
                    meeting_time: m.meeting_time.clone(),
                })
                .collect(),
        };
        let twice = build_meetings(again, "operator.com", &sink).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_emails_collapse_to_one_key() {
        let (sink, _receiver) = trace_channel();
        let data = CalendarData {
            meetings: vec![meeting(
                "Acme",
                "2:00 PM",
                vec![
                    attendee("jane@acme.com", None),
                    attendee("raj@acme.com", None),
                    attendee("jane@acme.com", Some("Jane Doe")),
                ],
            )],
        };
        let meetings = build_meetings(data, "operator.com", &sink).unwrap();
        let keys: Vec<&String> = meetings[0].attendees.keys().collect();
        assert_eq!(keys, vec!["jane@acme.com", "raj@acme.com"]);
        assert_eq!(meetings[0].attendees["jane@acme.com"], "Jane Doe");
    }

    #[test]
    fn parse_accepts_fenced_json_and_rejects_garbage() {
        let fenced = "```json\n{\"meetings\": []}\n```";
        assert_eq!(parse_calendar_data(fenced).unwrap(), CalendarData::default());

        let err = parse_calendar_data("I could not find any meetings").unwrap_err();
        assert!(matches!(err, PrepError::Schema(_)));

        let err = parse_calendar_data(r#"{"meetings":[{"title":"x"}]}"#).unwrap_err();
        assert!(matches!(err, PrepError::Schema(_)));
    }

    #[test]
    fn closed_sink_aborts_extraction() {
        let (sink, receiver) = trace_channel();
        drop(receiver);
        let data = CalendarData {
            meetings: vec![meeting("Acme", "2:00 PM", vec![])],
        };
        assert!(matches!(
            build_meetings(data, "operator.com", &sink),
            Err(PrepError::StreamClosed)
        ));
    }
}
