use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::tools::{ToolCall, ToolResponse, ToolSet};

/// Who produced a turn in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Tool => "tool",
        })
    }
}

/// A single turn of the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Message sent by the user
    User { content: String },
    /// Response from the model
    Assistant {
        content: String,
        tool_calls: Option<Vec<ToolCall>>,
        /// The provider's own content object, resubmitted verbatim on later rounds
        raw: Option<Value>,
    },
    /// Result of a local function invocation
    Tool { response: ToolResponse },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Model,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text of a user or model turn, empty for tool turns
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::User { content } | Self::Assistant { content, .. } => content,
            Self::Tool { .. } => "",
        }
    }

    /// The first function call a model turn asks for. Only one call is honoured per turn.
    #[must_use]
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls.first(),
            _ => None,
        }
    }
}

/// Ordered, append-only history of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        self.0.iter().map(Message::role).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Adds the usage of another round to this one
    pub fn accumulate(&mut self, usage: &TokenUsage) {
        self.prompt_tokens = combine_options(self.prompt_tokens, usage.prompt_tokens);
        self.completion_tokens = combine_options(self.completion_tokens, usage.completion_tokens);
        self.total_tokens = combine_options(self.total_tokens, usage.total_tokens);
    }
}

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Provider error -> HTTP Status {0}: {1}")]
    ProviderError(u16, String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send the transcript to the model and get its reply.
    ///
    /// The reply is always a `Message::Assistant`. When `tools` is `None` the model
    /// gets no function declarations and can only answer in text.
    async fn send(
        &self,
        transcript: &[Message],
        tools: Option<&ToolSet>,
    ) -> Result<(Message, TokenUsage), CompletionError>;
}

fn combine_options(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a_val), Some(b_val)) => Some(a_val + b_val),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
