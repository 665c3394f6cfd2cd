//! Tool system: a small `Tool` trait plus a name-keyed registry, returning
//! the richer [`ToolResult`] shape described in
//! `examples/original_source/nexus/tools/base.py`.

pub mod echo;
pub mod filesystem;
pub mod scheduler_tool;

use std::collections::HashMap;

use async_trait::async_trait;
use nexus_protocol::pending_action::RiskLevel;
use serde_json::Value;

/// Outcome of a tool run. `requires_confirmation` short-circuits the
/// orchestrator into the human-in-the-loop policy flow instead of sending
/// `content` directly.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub ok: bool,
    pub content: String,
    pub artifacts: Vec<Value>,
    pub requires_confirmation: bool,
    pub risk_level: RiskLevel,
    pub proposed_action: Option<Value>,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
            artifacts: Vec::new(),
            requires_confirmation: false,
            risk_level: RiskLevel::Low,
            proposed_action: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
            artifacts: Vec::new(),
            requires_confirmation: false,
            risk_level: RiskLevel::Low,
            proposed_action: None,
        }
    }

    pub fn needs_confirmation(risk_level: RiskLevel, proposed_action: Value) -> Self {
        Self {
            ok: true,
            content: String::new(),
            artifacts: Vec::new(),
            requires_confirmation: true,
            risk_level,
            proposed_action: Some(proposed_action),
        }
    }
}

/// JSON-schema tool specification exposed to the model/`/tools` listing.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    async fn run(&self, args: Value) -> ToolResult;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub async fn execute(&self, tool_name: &str, args: Value) -> ToolResult {
        match self.tools.get(tool_name) {
            Some(tool) => tool.run(args).await,
            None => ToolResult::error(format!("Unknown tool '{tool_name}'")),
        }
    }
}
