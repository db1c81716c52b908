/// The geocoding → weather chain wired to the builtin providers
pub mod weather;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    completion::{CompletionModel, Message, TokenUsage, Transcript},
    error::Error,
    tools::{validate_args, ToolCall, ToolOutput, ToolResponse, ToolSet, ToolSetError},
};

/// One dispatch step of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// Human readable name used in logs and error results
    pub label: &'static str,
    /// The only tool the model may call at this stage
    pub tool: &'static str,
    /// Key the serialized tool result is reported under
    pub result_key: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without asking for a function
    Direct,
    /// Every stage ran and the model synthesized a final answer
    Completed,
    /// A tool returned an error, so the stages depending on it never ran
    ToolFailed { tool: String, error: String },
    /// The model stopped asking for functions before the last stage
    NoFurtherCall { stage: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub answer: String,
    pub stop_reason: StopReason,
    /// Every turn exchanged during the run, including the last model reply
    pub transcript: Transcript,
    pub usage: TokenUsage,
}

/// Drives a two stage function calling conversation.
///
/// Stage one runs the tool the model asks for first, its result goes back to the
/// model, stage two runs the next requested tool and a last tool-less request
/// turns both results into the answer. The chain holds no state between runs.
pub struct ToolChain<M: CompletionModel> {
    model: M,
    tools: ToolSet,
    stages: [Stage; 2],
}

impl<M: CompletionModel> ToolChain<M> {
    /// Fails if a stage names a tool that isn't in `tools`
    pub fn new(model: M, tools: ToolSet, stages: [Stage; 2]) -> Result<Self, ToolSetError> {
        for stage in &stages {
            tools.find_tool(stage.tool)?;
        }
        Ok(Self {
            model,
            tools,
            stages,
        })
    }

    #[instrument(skip(self))]
    pub async fn run(&self, prompt: &str) -> Result<ChainOutcome, Error> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        info!("Received user request");

        let mut transcript = Transcript::new();
        let mut usage = TokenUsage::default();
        transcript.push(Message::user(prompt));

        let mut response = self.round(&transcript, Some(&self.tools), &mut usage).await?;
        let Some(mut call) = response.first_tool_call().cloned() else {
            info!("Model answered without a function call");
            let answer = response.text().to_string();
            transcript.push(response);
            return Ok(outcome(answer, StopReason::Direct, transcript, usage));
        };

        let last = self.stages.len() - 1;
        for (i, stage) in self.stages.iter().enumerate() {
            info!(
                stage = stage.label,
                function = %call.name,
                args = %call.arguments,
                "Function call detected"
            );
            let output = self.dispatch(stage, &call).await?;
            let payload = output.to_payload()?;
            info!(stage = stage.label, result = %payload, "Tool result");

            transcript.push(response);
            transcript.push(Message::Tool {
                response: ToolResponse {
                    name: call.name.clone(),
                    response: json!({ stage.result_key: payload }),
                },
            });
            if i == last {
                break;
            }

            response = self.round(&transcript, Some(&self.tools), &mut usage).await?;

            if let Some(error) = output.error() {
                warn!(stage = stage.label, %error, "Stopping chain after tool error");
                let answer = if response.text().trim().is_empty() {
                    error.to_string()
                } else {
                    response.text().to_string()
                };
                let stop_reason = StopReason::ToolFailed {
                    tool: call.name,
                    error: error.to_string(),
                };
                transcript.push(response);
                return Ok(outcome(answer, stop_reason, transcript, usage));
            }

            match response.first_tool_call().cloned() {
                Some(next) => call = next,
                None => {
                    info!(stage = stage.label, "Model asked for no further function");
                    let answer = response.text().to_string();
                    transcript.push(response);
                    let stop_reason = StopReason::NoFurtherCall {
                        stage: self.stages[i + 1].label,
                    };
                    return Ok(outcome(answer, stop_reason, transcript, usage));
                }
            }
        }

        let final_response = self.round(&transcript, None, &mut usage).await?;
        let answer = final_response.text().to_string();
        info!(%answer, total_tokens = usage.total_tokens, "Final answer");
        transcript.push(final_response);
        Ok(outcome(answer, StopReason::Completed, transcript, usage))
    }

    async fn round(
        &self,
        transcript: &Transcript,
        tools: Option<&ToolSet>,
        usage: &mut TokenUsage,
    ) -> Result<Message, Error> {
        let (message, round_usage) = self.model.send(transcript.messages(), tools).await?;
        usage.accumulate(&round_usage);
        Ok(message)
    }

    /// Runs `call` if it names the stage's tool, otherwise reports it as an error result
    async fn dispatch(&self, stage: &Stage, call: &ToolCall) -> Result<ToolOutput, Error> {
        if call.name != stage.tool {
            warn!(stage = stage.label, function = %call.name, "Unexpected function call");
            return Ok(ToolOutput::failure(format!(
                "unexpected function call during {}: {}",
                stage.label, call.name
            )));
        }
        let tool = self.tools.find_tool(&call.name)?;
        let args = validate_args(tool, &call.arguments)?;
        Ok(tool.call(args).await?)
    }
}

fn outcome(
    answer: String,
    stop_reason: StopReason,
    transcript: Transcript,
    usage: TokenUsage,
) -> ChainOutcome {
    ChainOutcome {
        answer,
        stop_reason,
        transcript,
        usage,
    }
}
