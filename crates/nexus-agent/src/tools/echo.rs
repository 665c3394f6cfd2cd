use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolResult, ToolSpec};

/// Echoes its `text` argument back verbatim. Used by the multi-step ReAct
/// scenario to exercise tool dispatch without external side effects.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Echo the given text back unchanged.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            }),
        }
    }

    async fn run(&self, args: Value) -> ToolResult {
        match args.get("text").and_then(Value::as_str) {
            Some(text) => ToolResult::ok(text.to_string()),
            None => ToolResult::error("text is required"),
        }
    }
}
