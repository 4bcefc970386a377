//! Scripted stand-ins for every collaborator, for tests that must not touch the network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;

use crate::brain::{
    ChatRequest, ChunkStream, LLMProviderTrait, ProviderError, ProviderResponse, ProviderType,
    StreamChunk,
};
use crate::calendar::{CalendarError, CalendarSource};
use crate::pipeline::{Collaborators, Meeting};
use crate::research::Researcher;
use crate::{PrepError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Step {
    Respond(ProviderResponse),
    Fail(ProviderError),
    Stream(Vec<String>),
    StreamThenFail(Vec<String>, ProviderError),
    StreamThenHang(Vec<String>),
}

/// Provider that replays a fixed script, one step per call, and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    pub fn respond(self, response: ProviderResponse) -> Self {
        self.push(Step::Respond(response))
    }

    pub fn respond_text(self, text: &str) -> Self {
        self.respond(ProviderResponse::Text {
            content: text.to_string(),
            usage: None,
        })
    }

    pub fn fail_with(self, error: ProviderError) -> Self {
        self.push(Step::Fail(error))
    }

    pub fn stream_chunks(self, chunks: &[&str]) -> Self {
        self.push(Step::Stream(chunks.iter().map(|c| c.to_string()).collect()))
    }

    pub fn stream_then_fail(self, chunks: &[&str], error: ProviderError) -> Self {
        self.push(Step::StreamThenFail(
            chunks.iter().map(|c| c.to_string()).collect(),
            error,
        ))
    }

    /// Streams `chunks` and then never produces another item
    pub fn stream_then_hang(self, chunks: &[&str]) -> Self {
        self.push(Step::StreamThenHang(
            chunks.iter().map(|c| c.to_string()).collect(),
        ))
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    fn next_step(&self, request: ChatRequest) -> std::result::Result<Step, ProviderError> {
        lock(&self.requests).push(request);
        lock(&self.steps)
            .pop_front()
            .ok_or_else(|| ProviderError::NotAvailable("script exhausted".to_string()))
    }
}

fn chunk(content: String) -> std::result::Result<StreamChunk, ProviderError> {
    Ok(StreamChunk {
        content,
        is_done: false,
    })
}

#[async_trait]
impl LLMProviderTrait for ScriptedProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn chat(&self, request: ChatRequest) -> std::result::Result<ProviderResponse, ProviderError> {
        match self.next_step(request)? {
            Step::Respond(response) => Ok(response),
            Step::Fail(error) | Step::StreamThenFail(_, error) => Err(error),
            Step::Stream(chunks) | Step::StreamThenHang(chunks) => Ok(ProviderResponse::Text {
                content: chunks.concat(),
                usage: None,
            }),
        }
    }

    async fn chat_stream(&self, request: ChatRequest) -> std::result::Result<ChunkStream, ProviderError> {
        match self.next_step(request)? {
            Step::Respond(response) => {
                let text = response.text().unwrap_or_default().to_string();
                Ok(futures::stream::iter(vec![chunk(text)]).boxed())
            }
            Step::Fail(error) => Err(error),
            Step::Stream(chunks) => Ok(futures::stream::iter(chunks.into_iter().map(chunk)).boxed()),
            Step::StreamThenFail(chunks, error) => {
                let items = chunks
                    .into_iter()
                    .map(chunk)
                    .chain(std::iter::once(Err(error)));
                Ok(futures::stream::iter(items).boxed())
            }
            Step::StreamThenHang(chunks) => Ok(futures::stream::iter(chunks.into_iter().map(chunk))
                .chain(futures::stream::pending())
                .boxed()),
        }
    }
}

/// Calendar that returns canned text or fails, recording the dates it was asked for
pub struct FakeCalendar {
    outcome: std::result::Result<String, String>,
    dates: Mutex<Vec<String>>,
}

impl FakeCalendar {
    pub fn returning(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            dates: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            dates: Mutex::new(Vec::new()),
        }
    }

    pub fn dates(&self) -> Vec<String> {
        lock(&self.dates).clone()
    }
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    async fn fetch(&self, date: &str) -> std::result::Result<String, CalendarError> {
        lock(&self.dates).push(date.to_string());
        self.outcome.clone().map_err(CalendarError::Agent)
    }
}

/// Researcher that returns canned findings, recording the meetings it was given
pub struct FakeResearcher {
    outcome: std::result::Result<String, String>,
    seen: Mutex<Vec<Vec<Meeting>>>,
}

impl FakeResearcher {
    pub fn returning(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Vec<Meeting>> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl Researcher for FakeResearcher {
    async fn research(&self, meetings: &[Meeting]) -> Result<String> {
        lock(&self.seen).push(meetings.to_vec());
        self.outcome
            .clone()
            .map_err(|message| PrepError::Provider(ProviderError::RequestFailed(message)))
    }
}

/// Collaborators built from fakes, plus handles to inspect them afterwards
pub struct FakeSet {
    pub calendar: Arc<FakeCalendar>,
    pub extractor: Arc<ScriptedProvider>,
    pub researcher: Arc<FakeResearcher>,
    pub formatter: Arc<ScriptedProvider>,
}

impl FakeSet {
    pub fn new(
        calendar: FakeCalendar,
        extractor: ScriptedProvider,
        researcher: FakeResearcher,
        formatter: ScriptedProvider,
    ) -> Self {
        Self {
            calendar: Arc::new(calendar),
            extractor: Arc::new(extractor),
            researcher: Arc::new(researcher),
            formatter: Arc::new(formatter),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            calendar: self.calendar.clone(),
            extractor: self.extractor.clone(),
            researcher: self.researcher.clone(),
            formatter: self.formatter.clone(),
        }
    }
}
