use crate::completion::{CompletionError, CompletionModel, Message, TokenUsage};
use crate::config::{http_client, ApiKey, ConfigError, ModelConfig};
use crate::tools::{ToolCall, ToolSet};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

/// Implementation of the `CompletionModel` trait for Google's Gemini `generateContent` API.
///
/// Owns its HTTP client, so dropping the model releases the connection pool.
pub struct GeminiCompletionModel {
    api_key: ApiKey,
    api_url: String,
    client: reqwest::Client,
    model: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
}

impl GeminiCompletionModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout)?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }

    fn request_body(&self, transcript: &[Message], tools: Option<&ToolSet>) -> Value {
        let contents: Vec<GeminiContent> = transcript.iter().map(Into::into).collect();
        let mut request_body = json!({ "contents": contents });

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            info!(tool_count = tools.len(), "Including tools in request");
            request_body["tools"] = json!([{ "functionDeclarations": tools.declarations() }]);
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = self.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(max) = self.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max));
        }
        if !generation_config.is_empty() {
            request_body["generationConfig"] = Value::Object(generation_config);
        }
        request_body
    }
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
enum GeminiContent {
    /// A model turn exactly as Gemini returned it
    Verbatim(Value),
    Built {
        role: &'static str,
        parts: Vec<Part>,
    },
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    FunctionCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        args: Value,
    },
    FunctionResponse {
        name: String,
        response: Value,
    },
}

impl From<&Message> for GeminiContent {
    fn from(value: &Message) -> Self {
        match value {
            Message::User { content } => Self::Built {
                role: "user",
                parts: vec![Part::Text(content.clone())],
            },
            Message::Assistant { raw: Some(raw), .. } => Self::Verbatim(raw.clone()),
            Message::Assistant {
                content,
                tool_calls,
                raw: None,
            } => {
                let mut parts = Vec::new();
                if !content.is_empty() {
                    parts.push(Part::Text(content.clone()));
                }
                for call in tool_calls.iter().flatten() {
                    parts.push(Part::FunctionCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    });
                }
                Self::Built {
                    role: "model",
                    parts,
                }
            }
            // function responses travel in a user turn
            Message::Tool { response } => Self::Built {
                role: "user",
                parts: vec![Part::FunctionResponse {
                    name: response.name.clone(),
                    response: response.response.clone(),
                }],
            },
        }
    }
}

fn parse_response(response_json: &Value) -> Result<(Message, TokenUsage), CompletionError> {
    let Some(content) = response_json.pointer("/candidates/0/content") else {
        let reason = response_json
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates in response");
        error!(reason, "Gemini returned no candidate");
        return Err(CompletionError::ParseError(format!(
            "Gemini returned no candidate: {reason}"
        )));
    };

    let parts = content["parts"].as_array().map(Vec::as_slice).unwrap_or_default();
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if part["thought"].as_bool() == Some(true) {
            continue;
        }
        if let Some(t) = part["text"].as_str() {
            text.push_str(t);
        }
        if let Some(call) = part.get("functionCall") {
            let name = call["name"]
                .as_str()
                .ok_or_else(|| CompletionError::ParseError("functionCall without a name".to_string()))?;
            tool_calls.push(ToolCall {
                id: call["id"].as_str().map(String::from),
                name: name.to_string(),
                arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }
    if !tool_calls.is_empty() {
        info!(tool_call_count = tool_calls.len(), "Parsed function calls");
    }

    let usage = &response_json["usageMetadata"];
    let token_usage = TokenUsage {
        prompt_tokens: usage["promptTokenCount"].as_u64(),
        completion_tokens: usage["candidatesTokenCount"].as_u64(),
        total_tokens: usage["totalTokenCount"].as_u64(),
    };

    Ok((
        Message::Assistant {
            content: text,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            // a candidate cut short without parts can't be sent back as is
            raw: (!parts.is_empty()).then(|| content.clone()),
        },
        token_usage,
    ))
}

#[async_trait]
impl CompletionModel for GeminiCompletionModel {
    #[instrument(
        skip(self, transcript, tools),
        fields(
            model = %self.model,
            transcript_len = transcript.len(),
            tools = tools.is_some())
    )]
    async fn send(
        &self,
        transcript: &[Message],
        tools: Option<&ToolSet>,
    ) -> Result<(Message, TokenUsage), CompletionError> {
        let request_body = self.request_body(transcript, tools);
        debug!(request_body = ?request_body, "Sending request to Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Request failed");
                CompletionError::RequestError(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, "Received API response");

        if status.is_success() {
            let response_json: Value = response.json().await.map_err(|e| {
                error!(error = ?e, "Failed to parse response JSON");
                CompletionError::ParseError(e.to_string())
            })?;
            let (message, token_usage) = parse_response(&response_json)?;
            info!(
                prompt_tokens = token_usage.prompt_tokens,
                completion_tokens = token_usage.completion_tokens,
                total_tokens = token_usage.total_tokens,
                "Token usage recorded"
            );
            Ok((message, token_usage))
        } else {
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string());

            error!(
                status = %status,
                error = %error_msg,
                "API returned error response"
            );

            Err(CompletionError::ProviderError(status.as_u16(), error_msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::lookup_toolset;
    use crate::tools::ToolResponse;
    use mockito::Matcher;
    use std::time::Duration;

    fn config(url: &str) -> ModelConfig {
        ModelConfig {
            api_key: ApiKey::new("test-key"),
            api_url: url.to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout: Duration::from_secs(5),
            temperature: None,
            max_output_tokens: None,
        }
    }

    fn function_call_body() -> Value {
        json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": { "name": "get_lat_lon_from_city", "args": { "city": "서울" } },
                        "thoughtSignature": "c2lnbmF0dXJl"
                    }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 40, "candidatesTokenCount": 12, "totalTokenCount": 52 }
        })
    }

    #[test]
    fn transcript_maps_to_gemini_contents() {
        let model = GeminiCompletionModel::new(&config("http://localhost")).unwrap();
        let raw = json!({ "role": "model", "parts": [{ "functionCall": { "name": "f", "args": {} } }] });
        let transcript = vec![
            Message::user("서울의 날씨는?"),
            Message::Assistant {
                content: String::new(),
                tool_calls: Some(vec![ToolCall::new("f", json!({}))]),
                raw: Some(raw.clone()),
            },
            Message::Tool {
                response: ToolResponse {
                    name: "f".to_string(),
                    response: json!({ "coords": "{\"lat\":1.0,\"lon\":2.0}" }),
                },
            },
        ];
        let body = model.request_body(&transcript, None);
        assert_eq!(
            body["contents"][0],
            json!({ "role": "user", "parts": [{ "text": "서울의 날씨는?" }] })
        );
        assert_eq!(body["contents"][1], raw);
        assert_eq!(
            body["contents"][2],
            json!({
                "role": "user",
                "parts": [{ "functionResponse": {
                    "name": "f",
                    "response": { "coords": "{\"lat\":1.0,\"lon\":2.0}" }
                } }]
            })
        );
        assert!(body.get("tools").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn model_turns_without_raw_content_are_rebuilt() {
        let message = Message::Assistant {
            content: "checking".to_string(),
            tool_calls: Some(vec![ToolCall::new("f", json!({ "a": 1 }))]),
            raw: None,
        };
        let content = serde_json::to_value(GeminiContent::from(&message)).unwrap();
        assert_eq!(
            content,
            json!({
                "role": "model",
                "parts": [
                    { "text": "checking" },
                    { "functionCall": { "name": "f", "args": { "a": 1 } } }
                ]
            })
        );
    }

    #[test]
    fn tools_and_generation_config_are_attached() {
        let mut cfg = config("http://localhost/");
        cfg.temperature = Some(0.3);
        cfg.max_output_tokens = Some(128);
        let model = GeminiCompletionModel::new(&cfg).unwrap();
        assert_eq!(
            model.endpoint(),
            "http://localhost/models/gemini-2.5-flash:generateContent"
        );

        let tools = lookup_toolset();
        let body = model.request_body(&[Message::user("hi")], Some(&tools));
        let declarations = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        let names: Vec<&str> = declarations
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["get_lat_lon_from_city", "get_weather_by_coords"]);
        assert_eq!(body["generationConfig"]["temperature"], 0.3);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
    }

    #[test]
    fn blocked_prompt_is_a_parse_error() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_response(&body).unwrap_err();
        assert!(matches!(err, CompletionError::ParseError(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn candidate_without_parts_keeps_no_raw_content() {
        let body = json!({
            "candidates": [{ "content": { "role": "model" }, "finishReason": "MAX_TOKENS" }],
            "usageMetadata": { "promptTokenCount": 40, "totalTokenCount": 40 }
        });
        let (message, usage) = parse_response(&body).unwrap();

        assert_eq!(
            message,
            Message::Assistant {
                content: String::new(),
                tool_calls: None,
                raw: None,
            }
        );
        assert_eq!(usage.prompt_tokens, Some(40));
        assert_eq!(
            serde_json::to_value(GeminiContent::from(&message)).unwrap(),
            json!({ "role": "model", "parts": [] })
        );
    }

    #[tokio::test]
    async fn function_call_response_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::Regex("functionDeclarations".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(function_call_body().to_string())
            .create_async()
            .await;

        let model = GeminiCompletionModel::new(&config(&server.url())).unwrap();
        let tools = lookup_toolset();
        let (message, usage) = model
            .send(&[Message::user("서울의 날씨는?")], Some(&tools))
            .await
            .unwrap();

        mock.assert_async().await;
        let call = message.first_tool_call().unwrap();
        assert_eq!(call.name, "get_lat_lon_from_city");
        assert_eq!(call.arguments, json!({ "city": "서울" }));
        assert_eq!(usage.total_tokens, Some(52));
        // the thought signature must survive for the next round
        let Message::Assistant { raw: Some(raw), .. } = message else {
            panic!("expected a model turn with raw content");
        };
        assert_eq!(raw["parts"][0]["thoughtSignature"], "c2lnbmF0dXJl");
    }

    #[tokio::test]
    async fn text_response_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(
                json!({
                    "candidates": [{ "content": { "role": "model", "parts": [{ "text": "맑음, " }, { "text": "21.3도" }] } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let model = GeminiCompletionModel::new(&config(&server.url())).unwrap();
        let (message, usage) = model.send(&[Message::user("hi")], None).await.unwrap();
        assert_eq!(message.text(), "맑음, 21.3도");
        assert!(message.first_tool_call().is_none());
        assert_eq!(usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn error_status_is_a_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let model = GeminiCompletionModel::new(&config(&server.url())).unwrap();
        let err = model.send(&[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, CompletionError::ProviderError(401, ref body) if body.contains("API key not valid")));
    }
}
