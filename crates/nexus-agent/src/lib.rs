pub mod context;
pub mod decision;
pub mod policy;
pub mod provider;
pub mod router;
pub mod skills;
pub mod tools;

pub use context::{ContextBuilder, ContextError};
pub use decision::{parse_agent_decision, AgentDecision, DecisionAction, DecisionCall, DecisionParseError};
pub use policy::PolicyEngine;
pub use provider::{AnthropicProvider, ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};
pub use router::ProviderRouter;
pub use skills::{load_skill_documents, SkillDocument};
pub use tools::{Tool, ToolRegistry, ToolResult, ToolSpec};
