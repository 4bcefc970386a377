//! Per-request run state. Every field after `date` is written exactly once, by one stage.

use std::sync::OnceLock;

use super::meeting::Meeting;
use crate::{PrepError, Result};

/// A field that may be set once and read only after it has been set
#[derive(Debug)]
pub struct Slot<T> {
    name: &'static str,
    cell: OnceLock<T>,
}

impl<T> Slot<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
        }
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.cell
            .set(value)
            .map_err(|_| PrepError::State(format!("{} was already written", self.name)))
    }

    pub fn get(&self) -> Result<&T> {
        self.cell
            .get()
            .ok_or_else(|| PrepError::State(format!("{} read before it was written", self.name)))
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn into_inner(self) -> Option<T> {
        self.cell.into_inner()
    }
}

/// Accumulator threaded through the four stages of one run
#[derive(Debug)]
pub struct RunState {
    date: String,
    /// Written by calendar fetch
    pub calendar_data: Slot<String>,
    /// Written by extraction
    pub calendar_events: Slot<Vec<Meeting>>,
    /// Written by research
    pub research_results: Slot<String>,
    /// Written by formatting
    pub formatted_output: Slot<String>,
}

impl RunState {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            calendar_data: Slot::new("calendar_data"),
            calendar_events: Slot::new("calendar_events"),
            research_results: Slot::new("research_results"),
            formatted_output: Slot::new("formatted_output"),
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn is_complete(&self) -> bool {
        self.calendar_data.is_set()
            && self.calendar_events.is_set()
            && self.research_results.is_set()
            && self.formatted_output.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_write_once() {
        let state = RunState::new("June 3, 2025");
        state.calendar_data.set("10am Acme".into()).unwrap();

        let err = state.calendar_data.set("overwrite".into()).unwrap_err();
        assert!(matches!(err, PrepError::State(msg) if msg.contains("calendar_data")));
        assert_eq!(state.calendar_data.get().unwrap(), "10am Acme");
    }

    #[test]
    fn reading_unwritten_slot_fails() {
        let state = RunState::new("June 3, 2025");
        assert!(state.research_results.get().is_err());
        assert!(!state.is_complete());
        assert_eq!(state.date(), "June 3, 2025");
    }

    #[test]
    fn complete_once_every_stage_has_written() {
        let state = RunState::new("today");
        state.calendar_data.set(String::new()).unwrap();
        state.calendar_events.set(vec![]).unwrap();
        state.research_results.set("findings".into()).unwrap();
        state.formatted_output.set("# Brief".into()).unwrap();
        assert!(state.is_complete());
        assert_eq!(state.formatted_output.into_inner().as_deref(), Some("# Brief"));
    }
}
