pub use crate::chain::{
    weather::{ask, lookup_tools, weather_stages},
    ChainOutcome, Stage, StopReason, ToolChain,
};
pub use crate::completion::{CompletionModel, Message, Role, TokenUsage, Transcript};
pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::tools::{Tool, ToolArg, ToolOutput, ToolSet};
