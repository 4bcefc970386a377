//! Meeting data: the schema the extraction model fills in and the cleaned record the rest of
//! the pipeline consumes.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Attendee as reported by the extraction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawAttendee {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

/// Meeting as reported by the extraction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawMeeting {
    pub title: String,
    /// The client company, never the operator's own
    pub company: String,
    #[serde(default)]
    pub attendees: Vec<RawAttendee>,
    /// Expected as `[Hour:Minute AM/PM]`
    pub meeting_time: String,
}

/// Structured-output envelope for the extraction call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalendarData {
    #[serde(default)]
    pub meetings: Vec<RawMeeting>,
}

impl CalendarData {
    /// JSON schema handed to the model
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(CalendarData))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }
}

/// A meeting ready for research and formatting. Attendees map email to display name, in the
/// order they were first listed, and never include the operator's own domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Meeting {
    pub company: String,
    pub title: String,
    #[ts(type = "Record<string, string>")]
    pub attendees: IndexMap<String, String>,
    pub meeting_time: String,
}

impl Meeting {
    /// `"<company> @ <meeting_time>"`, the label used for progress events and section headings
    pub fn label(&self) -> String {
        format!("{} @ {}", self.company, self.meeting_time)
    }
}

/// Pretty JSON rendering used inside prompts
pub fn meetings_to_prompt_json(meetings: &[Meeting]) -> String {
    serde_json::to_string_pretty(meetings).unwrap_or_else(|_| "[]".to_string())
}
