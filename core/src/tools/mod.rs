mod geocode;
mod weather;

pub use geocode::{GeocodeTool, GEOCODE_TOOL_NAME};
pub use weather::{WeatherTool, WEATHER_TOOL_NAME};

use async_trait::async_trait;
use schemars::{gen::SchemaSettings, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn args(&self) -> &[ToolArg];

    /// Runs the tool. `args` has already been checked against [`Tool::args`].
    async fn call(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError>;

    /// Function declaration in the shape Gemini expects
    fn default_serializer(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": build_parameters_schema(self.args()),
        })
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("`{tool}` expects its arguments as a json object")]
    ArgumentsNotAnObject { tool: String },
    #[error("`{tool}` got an unknown argument `{arg}`")]
    UnknownArgument { tool: String, arg: String },
    #[error("`{tool}` is missing the required argument `{arg}`")]
    MissingArgument { tool: String, arg: String },
    #[error("`{tool}` argument `{arg}` should be of type {expected}")]
    InvalidArgument {
        tool: String,
        arg: String,
        expected: String,
    },
    #[error("Invalid tool output: {0}")]
    InvalidOutput(String),
    #[error("Json Error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ToolSetError {
    #[error("Failed to find tool `{0}`")]
    ToolNotFound(String),
    #[error("Tool `{0}` is declared more than once")]
    DuplicateTool(String),
}

/// Dispatch table from tool name to handler. Every name maps to exactly one tool.
pub struct ToolSet(Vec<Box<dyn Tool>>);

impl ToolSet {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Result<Self, ToolSetError> {
        for (i, tool) in tools.iter().enumerate() {
            if tools[..i].iter().any(|t| t.name() == tool.name()) {
                return Err(ToolSetError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(Self(tools))
    }

    pub fn find_tool(&self, name: &str) -> Result<&dyn Tool, ToolSetError> {
        self.0
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolSetError::ToolNotFound(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|t| t.name()).collect()
    }

    #[must_use]
    pub fn declarations(&self) -> Vec<Value> {
        self.0.iter().map(|t| t.default_serializer()).collect()
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

pub struct ToolArg {
    name: String,
    description: String,
    schema: Value,
    required: bool,
}

impl ToolArg {
    /// A required argument whose schema is generated from `T`
    #[must_use]
    pub fn new<T: JsonSchema>(name: &str, description: &str) -> Self {
        let settings = SchemaSettings::default().with(|s| {
            s.inline_subschemas = true;
        });
        let generator = settings.into_generator();
        let schema = generator.into_root_schema_for::<T>();
        let mut schema_value = serde_json::to_value(&schema).unwrap_or_default();

        if let Some(obj) = schema_value.as_object_mut() {
            obj.insert("description".to_string(), json!(description));
        }
        process_json_value(&mut schema_value);

        ToolArg {
            name: name.to_string(),
            description: description.to_string(),
            schema: schema_value,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    fn accepts(&self, value: &Value) -> bool {
        match &self.schema["type"] {
            Value::String(t) => json_type_matches(t, value),
            Value::Array(types) => types
                .iter()
                .filter_map(Value::as_str)
                .any(|t| json_type_matches(t, value)),
            _ => true,
        }
    }

    fn expected_type(&self) -> String {
        match &self.schema["type"] {
            Value::String(t) => t.clone(),
            other => other.to_string(),
        }
    }
}

fn json_type_matches(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Checks model supplied arguments against the declared parameters of `tool`.
///
/// Unknown keys, missing required keys and values of the wrong json type are rejected.
pub fn validate_args(tool: &dyn Tool, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
    let args = arguments
        .as_object()
        .ok_or_else(|| ToolError::ArgumentsNotAnObject {
            tool: tool.name().to_string(),
        })?;

    if let Some(unknown) = args
        .keys()
        .find(|k| !tool.args().iter().any(|a| a.name == **k))
    {
        return Err(ToolError::UnknownArgument {
            tool: tool.name().to_string(),
            arg: unknown.clone(),
        });
    }

    for declared in tool.args() {
        match args.get(&declared.name) {
            None if declared.required => {
                return Err(ToolError::MissingArgument {
                    tool: tool.name().to_string(),
                    arg: declared.name.clone(),
                })
            }
            Some(v) if !declared.accepts(v) => {
                return Err(ToolError::InvalidArgument {
                    tool: tool.name().to_string(),
                    arg: declared.name.clone(),
                    expected: declared.expected_type(),
                })
            }
            _ => {}
        }
    }

    Ok(args.clone())
}

/// Strips what Gemini's schema subset doesn't accept
fn process_json_value(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            let fields_to_remove = ["$schema", "format", "title", "minimum"];
            fields_to_remove.iter().for_each(|&f| {
                if obj.get(f).is_some_and(|v| v.is_string() || v.is_number()) {
                    obj.remove(f);
                }
            });
            obj.remove("additionalProperties");
            obj.remove("definitions");
            if let Some(v) = obj.remove("oneOf") {
                obj.insert("anyOf".to_string(), v);
            };
            for (_, v) in obj.iter_mut() {
                process_json_value(v);
            }
        }
        Value::Array(arr) => {
            for elem in arr.iter_mut() {
                process_json_value(elem);
            }
        }
        _ => {}
    }
}

pub fn build_parameters_schema(args: &[ToolArg]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for arg in args {
        properties.insert(arg.name.clone(), arg.schema.clone());
        if arg.required {
            required.push(json!(arg.name));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }
}

/// The serialized result of a tool, as it's reported back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub name: String,
    pub response: Value,
}

/// What a tool produced: either its result fields or an error, never both.
///
/// Serializes flat, e.g. `{"lat":37.57,"lon":126.98}` or `{"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Failure { error: String },
    Success(Map<String, Value>),
}

impl ToolOutput {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Builds a successful output from anything that serializes to a json object
    pub fn success<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        match serde_json::to_value(value)? {
            Value::Object(map) if map.contains_key("error") => Err(ToolError::InvalidOutput(
                "`error` is reserved for failed tool results".to_string(),
            )),
            Value::Object(map) => Ok(Self::Success(map)),
            other => Err(ToolError::InvalidOutput(format!(
                "expected a json object, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        match self {
            Self::Failure { .. } => true,
            Self::Success(map) => map.contains_key("error"),
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Success(map) => map.get("error").and_then(Value::as_str),
        }
    }

    /// The json text handed back to the model. Non-ascii text is kept as is.
    pub fn to_payload(&self) -> Result<String, ToolError> {
        serde_json::to_string(self).map_err(ToolError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        args: Vec<ToolArg>,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                args: vec![
                    ToolArg::new::<String>("text", "text to echo"),
                    ToolArg::new::<u32>("times", "how often to repeat it").optional(),
                ],
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes the given text"
        }
        fn args(&self) -> &[ToolArg] {
            &self.args
        }
        async fn call(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
            #[derive(Deserialize)]
            struct Params {
                text: String,
            }
            let params: Params = serde_json::from_value(Value::Object(args))?;
            ToolOutput::success(&json!({ "echo": params.text }))
        }
    }

    #[test]
    fn declaration_matches_gemini_shape() {
        let decl = EchoTool::new().default_serializer();
        assert_eq!(decl["name"], "echo");
        assert_eq!(decl["parameters"]["type"], "object");
        assert_eq!(decl["parameters"]["properties"]["text"]["type"], "string");
        assert_eq!(
            decl["parameters"]["properties"]["text"]["description"],
            "text to echo"
        );
        assert_eq!(decl["parameters"]["required"], json!(["text"]));
        let times = &decl["parameters"]["properties"]["times"];
        assert!(times.get("format").is_none());
        assert!(times.get("title").is_none());
        assert!(times.get("$schema").is_none());
    }

    #[test]
    fn float_args_are_plain_numbers() {
        let arg = ToolArg::new::<f64>("lat", "latitude");
        assert_eq!(arg.schema, json!({ "type": "number", "description": "latitude" }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = ToolSet::new(vec![Box::new(EchoTool::new()), Box::new(EchoTool::new())]);
        assert!(matches!(result, Err(ToolSetError::DuplicateTool(ref n)) if n == "echo"));
    }

    #[test]
    fn unknown_tools_are_not_found() {
        let set = ToolSet::new(vec![Box::new(EchoTool::new())]).unwrap();
        assert!(set.find_tool("echo").is_ok());
        assert!(matches!(
            set.find_tool("shout"),
            Err(ToolSetError::ToolNotFound(ref n)) if n == "shout"
        ));
        assert_eq!(set.names(), vec!["echo"]);
        assert_eq!(set.declarations().len(), 1);
    }

    #[test]
    fn validation_rejects_bad_arguments() {
        let tool = EchoTool::new();
        assert!(validate_args(&tool, &json!({ "text": "hi" })).is_ok());
        assert!(validate_args(&tool, &json!({ "text": "hi", "times": 2 })).is_ok());

        assert!(matches!(
            validate_args(&tool, &json!({ "text": "hi", "loud": true })),
            Err(ToolError::UnknownArgument { ref arg, .. }) if arg == "loud"
        ));
        assert!(matches!(
            validate_args(&tool, &json!({ "times": 2 })),
            Err(ToolError::MissingArgument { ref arg, .. }) if arg == "text"
        ));
        assert!(matches!(
            validate_args(&tool, &json!({ "text": 42 })),
            Err(ToolError::InvalidArgument { ref expected, .. }) if expected == "string"
        ));
        assert!(matches!(
            validate_args(&tool, &json!(["hi"])),
            Err(ToolError::ArgumentsNotAnObject { .. })
        ));
    }

    #[tokio::test]
    async fn validated_args_reach_the_tool() {
        let tool = EchoTool::new();
        let args = validate_args(&tool, &json!({ "text": "서울" })).unwrap();
        let output = tool.call(args).await.unwrap();
        assert_eq!(output.to_payload().unwrap(), r#"{"echo":"서울"}"#);
        assert!(!output.is_error());
    }

    #[test]
    fn outputs_are_success_or_error() {
        let failed = ToolOutput::failure("boom");
        assert!(failed.is_error());
        assert_eq!(failed.error(), Some("boom"));
        assert_eq!(failed.to_payload().unwrap(), r#"{"error":"boom"}"#);

        assert!(ToolOutput::success(&json!({ "error": "sneaky" })).is_err());
        assert!(ToolOutput::success(&json!(3)).is_err());

        let parsed: ToolOutput = serde_json::from_str(r#"{"error":"x"}"#).unwrap();
        assert_eq!(parsed, ToolOutput::failure("x"));
    }
}
