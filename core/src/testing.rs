//! In-memory collaborators that record what they were asked

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::completion::{CompletionError, CompletionModel, Message, TokenUsage};
use crate::providers::geocoding::{Coordinates, Geocoder};
use crate::providers::weather::{WeatherProvider, WeatherReport};
use crate::providers::LookupError;
use crate::tools::{GeocodeTool, ToolCall, ToolSet, WeatherTool};

pub(crate) fn seoul() -> Coordinates {
    Coordinates {
        lat: 37.57,
        lon: 126.98,
    }
}

pub(crate) fn seoul_report() -> WeatherReport {
    WeatherReport {
        city_name: Some("Seoul".to_string()),
        temp_celsius: 21.3,
        description: "clear sky".to_string(),
        humidity: 55,
    }
}

pub(crate) struct MockGeocoder {
    result: Result<Coordinates, LookupError>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockGeocoder {
    pub(crate) fn returning(result: Result<Coordinates, LookupError>) -> Self {
        Self {
            result,
            calls: Arc::default(),
        }
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn lookup(&self, city: &str) -> Result<Coordinates, LookupError> {
        self.calls.lock().unwrap().push(city.to_string());
        self.result.clone()
    }
}

pub(crate) struct MockWeather {
    result: Result<WeatherReport, LookupError>,
    calls: Arc<Mutex<Vec<Coordinates>>>,
}

impl MockWeather {
    pub(crate) fn returning(result: Result<WeatherReport, LookupError>) -> Self {
        Self {
            result,
            calls: Arc::default(),
        }
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<Coordinates>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl WeatherProvider for MockWeather {
    async fn current(&self, coords: Coordinates) -> Result<WeatherReport, LookupError> {
        self.calls.lock().unwrap().push(coords);
        self.result.clone()
    }
}

/// Both lookup tools backed by successful mocks
pub(crate) fn lookup_toolset() -> ToolSet {
    ToolSet::new(vec![
        Box::new(GeocodeTool::new(MockGeocoder::returning(Ok(seoul())))),
        Box::new(WeatherTool::new(MockWeather::returning(Ok(seoul_report())))),
    ])
    .unwrap()
}

/// One request the scripted model received
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Request {
    pub transcript: Vec<Message>,
    pub tool_names: Option<Vec<String>>,
}

/// Replies with queued responses in order and records every request
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Message, CompletionError>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedModel {
    pub(crate) fn new(replies: Vec<Result<Message, CompletionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Arc::default(),
        }
    }

    pub(crate) fn replying(replies: Vec<Message>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    pub(crate) fn requests(&self) -> Arc<Mutex<Vec<Request>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn send(
        &self,
        transcript: &[Message],
        tools: Option<&ToolSet>,
    ) -> Result<(Message, TokenUsage), CompletionError> {
        self.requests.lock().unwrap().push(Request {
            transcript: transcript.to_vec(),
            tool_names: tools.map(|t| t.names().into_iter().map(String::from).collect()),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::RequestError("no scripted reply left".to_string())))?;
        let usage = TokenUsage {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            total_tokens: Some(15),
        };
        Ok((reply, usage))
    }
}

/// A model turn answering in plain text
pub(crate) fn model_text(text: &str) -> Message {
    Message::Assistant {
        content: text.to_string(),
        tool_calls: None,
        raw: Some(json!({ "role": "model", "parts": [{ "text": text }] })),
    }
}

/// A model turn asking for one function call
pub(crate) fn model_call(name: &str, args: Value) -> Message {
    Message::Assistant {
        content: String::new(),
        tool_calls: Some(vec![ToolCall::new(name, args.clone())]),
        raw: Some(json!({
            "role": "model",
            "parts": [{ "functionCall": { "name": name, "args": args } }]
        })),
    }
}
