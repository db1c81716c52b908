use crate::{
    completion::CompletionError,
    config::ConfigError,
    tools::{ToolError, ToolSetError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
    #[error("ToolSet error: {0}")]
    ToolSet(#[from] ToolSetError),
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("Prompt must not be empty")]
    EmptyPrompt,
}
