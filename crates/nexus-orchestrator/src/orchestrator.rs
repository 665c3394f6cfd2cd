//! The conversation orchestrator: `handle_inbound`'s 7-step algorithm
//! (channel filter, claim, empty-payload guard, persist, confirmation
//! resolution, direct command parse, ReAct loop) plus `emit_scheduled`.
//! Ported step-for-step from
//! `examples/original_source/nexus/core/loop.py`'s `NexusLoop`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use nexus_agent::{
    parse_agent_decision, AgentDecision, ContextBuilder, DecisionAction, Message, PolicyEngine,
    ProviderRouter, ToolRegistry, ToolResult,
};
use nexus_core::{ChatId, Redactor};
use nexus_memory::{JournalStore, MemoryStore};
use nexus_protocol::{
    Attachment, InboundMessage, MediaKind, OutboundMessage, PendingAction, PendingActionStatus,
    RiskLevel,
};
use nexus_store::{LedgerDirection, MessageRole, PersistedMessage, Store};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::command::{parse_tool_command, DirectCommand};
use crate::error::Result;
use crate::format::format_whatsapp_text;
use crate::identity::is_same_identity;

/// Tokens in `RunReactLoop`'s `complexTaskHint` detection (SPEC_FULL.md §4.7).
const COMPLEX_TASK_TOKENS: &[&str] = &["research", "analyze", "complex", "compare", "plan"];

const MAX_STEP_ECHO_CHARS: usize = 2000;

/// Binds every core component into the single inbound-handling algorithm.
/// Owns no channel transport directly — outbound delivery is routed through
/// an optional bridge sender and/or console sink, set at construction.
pub struct Orchestrator {
    store: Store,
    memory: Arc<MemoryStore>,
    journal: Arc<JournalStore>,
    policy: PolicyEngine,
    registry: Arc<ToolRegistry>,
    router: Arc<ProviderRouter>,
    context: ContextBuilder,
    redactor: Arc<Redactor>,
    agent_max_steps: u32,
    observation_max_chars: usize,
    redacted_log_path: PathBuf,
    bridge_tx: Option<mpsc::Sender<OutboundMessage>>,
    console: Option<Arc<nexus_channels::ConsoleChannel>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        memory: Arc<MemoryStore>,
        journal: Arc<JournalStore>,
        registry: Arc<ToolRegistry>,
        router: Arc<ProviderRouter>,
        context: ContextBuilder,
        redactor: Arc<Redactor>,
        agent_max_steps: u32,
        observation_max_chars: usize,
        redacted_log_path: PathBuf,
    ) -> Self {
        let policy = PolicyEngine::new(store.clone());
        Self {
            store,
            memory,
            journal,
            policy,
            registry,
            router,
            context,
            redactor,
            agent_max_steps,
            observation_max_chars,
            redacted_log_path,
            bridge_tx: None,
            console: None,
        }
    }

    pub fn with_bridge(mut self, bridge_tx: mpsc::Sender<OutboundMessage>) -> Self {
        self.bridge_tx = Some(bridge_tx);
        self
    }

    pub fn with_console(mut self, console: Arc<nexus_channels::ConsoleChannel>) -> Self {
        self.console = Some(console);
        self
    }

    /// Top-level entry point. Never lets a `Result::Err` escape: any
    /// failure during handling is audited as `inbound.error`, answered with
    /// a generic best-effort reply, and swallowed so the channel loop stays
    /// alive (SPEC_FULL.md §4.7 "Orchestrator-fault").
    #[instrument(skip(self, msg), fields(chat_id = %msg.chat_id, trace_id = %trace_id))]
    pub async fn handle_inbound(&self, msg: InboundMessage, trace_id: String) {
        if let Err(e) = self.try_handle_inbound(&msg, &trace_id).await {
            tracing::error!(error = %e, code = e.code(), "inbound handling failed");
            let _ = self
                .store
                .insert_audit(&trace_id, "inbound.error", &json!({ "error": e.to_string() }));
            let _ = self
                .send_reply(
                    &msg,
                    &trace_id,
                    "I hit an internal processing error while handling that request. Please try again.",
                )
                .await;
        }
    }

    async fn try_handle_inbound(&self, msg: &InboundMessage, trace_id: &str) -> Result<()> {
        // Step 1: channel filter (WhatsApp only).
        if msg.channel == "whatsapp" {
            if !msg.is_self_chat {
                info!(reason = "not_self_chat", "dropping inbound");
                return Ok(());
            }
            if !msg.is_from_me && !is_same_identity(&msg.sender_id, &msg.chat_id) {
                info!(reason = "identity_mismatch", "dropping inbound");
                return Ok(());
            }
        }

        // Step 2: claim. MUST be the first mutation on the path.
        let owned = self
            .store
            .claim_ledger(&msg.id, LedgerDirection::Inbound, &msg.chat_id)?;
        if !owned {
            let existing = self.store.ledger_direction(&msg.id)?;
            let reason = match existing {
                Some(LedgerDirection::Outbound) => "outbound_echo",
                _ => "duplicate_inbound",
            };
            info!(reason, "dropping inbound: ledger claim lost");
            return Ok(());
        }

        // Step 3: empty-payload guard (WhatsApp protocol receipts).
        if msg.channel == "whatsapp" && msg.is_empty_payload() {
            info!("dropping empty-payload whatsapp message");
            return Ok(());
        }

        // Step 4: persist user turn.
        let effective_text = build_effective_text(msg);
        let masked_text = self.redactor.mask(&effective_text);
        let persisted = PersistedMessage {
            id: msg.id.clone(),
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
            sender_id: msg.sender_id.clone(),
            role: MessageRole::User,
            text: masked_text.clone(),
            trace_id: trace_id.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_message(&persisted)?;
        self.append_redacted_log("inbound", &msg.chat_id, &masked_text).await?;
        self.memory.append_turn(&msg.chat_id, "user", &masked_text);

        let text = msg.text.as_deref().unwrap_or("").trim();

        // Step 5: confirmation resolution.
        if !text.is_empty() {
            if let Some(resolved) = self.policy.resolve_pending_action_from_text(&msg.chat_id, text)? {
                return self.handle_confirmation_resolution(msg, trace_id, resolved).await;
            }
        }

        // Step 6: direct command parse.
        if !text.is_empty() {
            if let Some(cmd) = parse_tool_command(text) {
                return self.handle_direct_command(msg, trace_id, cmd).await;
            }
        }

        // Step 7: ReAct loop.
        self.run_react_loop(msg, trace_id).await
    }

    async fn handle_confirmation_resolution(
        &self,
        msg: &InboundMessage,
        trace_id: &str,
        resolved: PendingAction,
    ) -> Result<()> {
        match resolved.status {
            PendingActionStatus::Approved => {
                let (tool_name, inner_args) = extract_proposed(&resolved.proposed_args);
                let result = self.dispatch_tool(&tool_name, inner_args, &msg.chat_id, true).await;
                self.store.insert_audit(
                    trace_id,
                    "tool.execute",
                    &json!({ "tool": tool_name, "ok": result.ok, "resumed": true }),
                )?;
                self.send_reply(msg, trace_id, &result.content).await
            }
            PendingActionStatus::Denied => {
                self.send_reply(msg, trace_id, "Cancelled pending action.").await
            }
            PendingActionStatus::Pending | PendingActionStatus::Expired => Ok(()),
        }
    }

    async fn handle_direct_command(
        &self,
        msg: &InboundMessage,
        trace_id: &str,
        cmd: DirectCommand,
    ) -> Result<()> {
        match cmd {
            DirectCommand::Response(hint) => self.send_reply(msg, trace_id, &hint).await,
            DirectCommand::Tool { tool, args } => self.dispatch_and_respond(msg, trace_id, &tool, args).await,
        }
    }

    /// Execute a fresh (not-yet-confirmed) tool call: either it runs and
    /// replies, or it requires confirmation and a pending action is
    /// created. Used by the direct-command path.
    async fn dispatch_and_respond(
        &self,
        msg: &InboundMessage,
        trace_id: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<()> {
        let result = self.dispatch_tool(tool_name, args.clone(), &msg.chat_id, false).await;
        if result.requires_confirmation {
            return self
                .request_confirmation(msg, trace_id, tool_name, &args, &result)
                .await;
        }
        self.store
            .insert_audit(trace_id, "tool.execute", &json!({ "tool": tool_name, "ok": result.ok }))?;
        self.send_reply(msg, trace_id, &result.content).await
    }

    async fn request_confirmation(
        &self,
        msg: &InboundMessage,
        trace_id: &str,
        tool_name: &str,
        args: &Value,
        result: &ToolResult,
    ) -> Result<()> {
        let proposed = result
            .proposed_action
            .clone()
            .unwrap_or_else(|| json!({ "tool": tool_name, "args": args }));
        let pending = self
            .policy
            .create_pending_action(&msg.chat_id, tool_name, result.risk_level, proposed)?;
        self.store.insert_audit(
            trace_id,
            "tool.requires_confirmation",
            &json!({ "tool": tool_name, "action_id": pending.action_id }),
        )?;
        self.send_reply(msg, trace_id, &confirmation_prompt(&pending)).await
    }

    /// The bounded ReAct loop: LLM decision ↔ tool observation, up to
    /// `agent_max_steps` round trips.
    async fn run_react_loop(&self, msg: &InboundMessage, trace_id: &str) -> Result<()> {
        let user_text = msg.text.clone().unwrap_or_default();
        let lowered = user_text.to_lowercase();
        let complex_task_hint = COMPLEX_TASK_TOKENS.iter().any(|t| lowered.contains(t));

        let mut step_messages: Vec<Message> = Vec::new();

        for _step in 1..=self.agent_max_steps {
            let messages = self
                .context
                .build_messages(&self.memory, &self.registry, &msg.chat_id, &user_text, &step_messages)
                .await?;
            let (system, rest) = split_system(messages);

            match self.router.complete(system, rest, complex_task_hint).await {
                Err(e) => {
                    self.store
                        .insert_audit(trace_id, "loop.step", &json!({ "ok": false, "error": e.to_string() }))?;
                    let echo = clip(&format!("[router error] {e}"), MAX_STEP_ECHO_CHARS);
                    step_messages.push(Message::assistant(echo));
                    step_messages.push(Message::user(format!(
                        "Your previous model call failed: {e}. Return a single valid decision JSON object: \
                         {{\"thought\": <string>, \"call\": {{\"name\": <string>, \"arguments\": {{}}}} }} \
                         or {{\"thought\": <string>, \"response\": <string>}}."
                    )));
                    continue;
                }
                Ok(response) => match parse_agent_decision(&response.content) {
                    Err(e) => {
                        self.store
                            .insert_audit(trace_id, "loop.step", &json!({ "ok": false, "error": e.to_string() }))?;
                        let echo = clip(&response.content, MAX_STEP_ECHO_CHARS);
                        step_messages.push(Message::assistant(echo));
                        step_messages.push(Message::user(format!(
                            "{e}. Return a single valid decision JSON object: \
                             {{\"thought\": <string>, \"call\": {{\"name\": <string>, \"arguments\": {{}}}} }} \
                             or {{\"thought\": <string>, \"response\": <string>}}."
                        )));
                        continue;
                    }
                    Ok(decision) => {
                        if let Some(outcome) = self.advance_react_step(msg, trace_id, decision, &mut step_messages).await? {
                            return outcome;
                        }
                    }
                },
            }
        }

        self.store
            .insert_audit(trace_id, "loop.max_steps_reached", &json!({ "max_steps": self.agent_max_steps }))?;
        self.send_reply(
            msg,
            trace_id,
            "I reached the maximum reasoning steps without a final answer. Please try again with a more specific request.",
        )
        .await
    }

    /// Runs one ReAct decision. Returns `Ok(Some(_))` when the loop must
    /// return to its caller (a final response or a pending confirmation);
    /// `Ok(None)` when `step_messages` was extended and the loop should
    /// continue.
    async fn advance_react_step(
        &self,
        msg: &InboundMessage,
        trace_id: &str,
        decision: AgentDecision,
        step_messages: &mut Vec<Message>,
    ) -> Result<Option<Result<()>>> {
        match decision.action {
            DecisionAction::Response(text) => {
                self.store.insert_audit(trace_id, "loop.step", &json!({ "action": "response" }))?;
                self.send_reply(msg, trace_id, &text).await?;
                let _ = self.journal.append_event(&format!("{}: {}", msg.chat_id, text)).await;
                Ok(Some(Ok(())))
            }
            DecisionAction::Call(call) => {
                self.store
                    .insert_audit(trace_id, "loop.step", &json!({ "action": "call", "tool": call.name }))?;
                let result = self
                    .dispatch_tool(&call.name, call.arguments.clone(), &msg.chat_id, false)
                    .await;

                if result.requires_confirmation {
                    self.request_confirmation(msg, trace_id, &call.name, &call.arguments, &result)
                        .await?;
                    return Ok(Some(Ok(())));
                }

                self.store.insert_audit(
                    trace_id,
                    "tool.execute",
                    &json!({ "tool": call.name, "ok": result.ok }),
                )?;

                if !result.artifacts.is_empty() {
                    let attachments = artifacts_to_attachments(&result.artifacts);
                    if !attachments.is_empty() {
                        let mut interim = OutboundMessage::text_reply(&msg.channel, &msg.chat_id, "");
                        interim.text = None;
                        interim.attachments = attachments;
                        self.dispatch_outbound(interim).await;
                    }
                }

                let observation = format_observation(&result, self.observation_max_chars);
                let assistant_turn = serde_json::to_string(&json!({
                    "thought": decision.thought,
                    "call": { "name": call.name, "arguments": call.arguments },
                }))
                .unwrap_or_default();
                step_messages.push(Message::assistant(assistant_turn));
                step_messages.push(Message::user(format!("TOOL_OBSERVATION:\n{observation}")));
                Ok(None)
            }
        }
    }

    /// Injects `chat_id` (always) and `confirmed` (when resuming an
    /// approved pending action) before dispatch, per SPEC_FULL.md §4.6.
    async fn dispatch_tool(&self, tool_name: &str, mut args: Value, chat_id: &str, confirmed: bool) -> ToolResult {
        if !args.is_object() {
            args = json!({});
        }
        if let Value::Object(map) = &mut args {
            map.insert("chat_id".to_string(), Value::String(chat_id.to_string()));
            if confirmed {
                map.insert("confirmed".to_string(), Value::Bool(true));
            }
        }
        self.registry.execute(tool_name, args).await
    }

    /// Called by the scheduler on fire. Builds and sends `"[Reminder] <text>"`
    /// on the chat's channel (console chat id → console, else WhatsApp).
    pub async fn emit_scheduled(&self, chat_id: &str, text: &str) {
        let channel = if chat_id == ChatId::CONSOLE { "console" } else { "whatsapp" };
        let trace_id = Uuid::new_v4().to_string();
        let body = format!("[Reminder] {text}");
        if let Err(e) = self.send_text(channel, chat_id, &trace_id, &body).await {
            warn!(error = %e, "failed to emit scheduled reminder");
        }
    }

    async fn send_reply(&self, msg: &InboundMessage, trace_id: &str, text: &str) -> Result<()> {
        self.send_text(&msg.channel, &msg.chat_id, trace_id, text).await
    }

    /// Shared send path: format → redact → hand to the channel → persist →
    /// redacted-log → session window. Redaction and persistence happen
    /// regardless of whether the channel actually delivered the message
    /// (SPEC_FULL.md §5 ordering guarantees).
    async fn send_text(&self, channel: &str, chat_id: &str, trace_id: &str, text: &str) -> Result<()> {
        let formatted = if channel == "whatsapp" { format_whatsapp_text(text) } else { text.to_string() };
        let masked = self.redactor.mask(&formatted);

        let outbound = OutboundMessage::text_reply(channel, chat_id, masked.clone());
        self.dispatch_outbound(outbound.clone()).await;

        let persisted = PersistedMessage {
            id: outbound.id,
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            sender_id: "nexus".to_string(),
            role: MessageRole::Assistant,
            text: masked.clone(),
            trace_id: trace_id.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_message(&persisted)?;
        self.append_redacted_log("outbound", chat_id, &masked).await?;
        self.memory.append_turn(chat_id, "assistant", &masked);
        Ok(())
    }

    async fn dispatch_outbound(&self, outbound: OutboundMessage) {
        if outbound.channel == "console" {
            if let Some(console) = &self.console {
                if let Some(text) = &outbound.text {
                    console.send(text);
                }
            } else {
                warn!("no console channel configured; outbound message dropped");
            }
            return;
        }

        match &self.bridge_tx {
            Some(tx) if tx.send(outbound).await.is_ok() => {}
            Some(_) => warn!("bridge outbound channel closed; message dropped"),
            None => warn!("no bridge configured; outbound message dropped"),
        }
    }

    async fn append_redacted_log(&self, direction: &str, chat_id: &str, masked_text: &str) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        let line = json!({
            "ts": Utc::now().to_rfc3339(),
            "direction": direction,
            "chat_id": chat_id,
            "text": masked_text,
        });
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.redacted_log_path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        Ok(())
    }
}

fn split_system(mut messages: Vec<Message>) -> (String, Vec<Message>) {
    if messages.is_empty() {
        return (String::new(), Vec::new());
    }
    let system = messages.remove(0).content;
    (system, messages)
}

fn build_effective_text(msg: &InboundMessage) -> String {
    let mut out = msg.text.clone().unwrap_or_default();
    if msg.media.is_empty() {
        return out;
    }
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str("[MEDIA_CONTEXT]\n");
    for item in &msg.media {
        let kind = match item.kind {
            MediaKind::Image => "image",
            MediaKind::Document => "document",
        };
        let mime = item.mime_type.as_deref().unwrap_or("unknown");
        let name = item.file_name.as_deref().unwrap_or("unnamed");
        match &item.caption {
            Some(caption) if !caption.is_empty() => {
                out.push_str(&format!("- {kind} ({mime}) {name}: {caption}\n"));
            }
            _ => out.push_str(&format!("- {kind} ({mime}) {name}\n")),
        }
    }
    out.push_str("[/MEDIA_CONTEXT]");
    out
}

fn extract_proposed(proposed: &Value) -> (String, Value) {
    let tool = proposed.get("tool").and_then(Value::as_str).unwrap_or_default().to_string();
    let args = proposed.get("args").cloned().unwrap_or_else(|| json!({}));
    (tool, args)
}

fn confirmation_prompt(pending: &PendingAction) -> String {
    let risk = match pending.risk_level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    };
    format!(
        "I'd like to run `{}` (risk: {risk}). Action id: {}. Reply YES to proceed or NO to cancel.",
        pending.tool_name, pending.action_id
    )
}

fn artifacts_to_attachments(artifacts: &[Value]) -> Vec<Attachment> {
    artifacts
        .iter()
        .filter_map(|a| serde_json::from_value::<Attachment>(a.clone()).ok())
        .collect()
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...(truncated)")
}

fn format_observation(result: &ToolResult, max_chars: usize) -> String {
    let status = if result.ok { "ok" } else { "error" };
    let content = clip(&result.content, max_chars);
    let mut out = format!("status={status}\ncontent={content}");
    if !result.artifacts.is_empty() {
        let names: Vec<String> = result.artifacts.iter().map(|a| a.to_string()).collect();
        out.push_str(&format!("\nartifacts={}", names.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use nexus_agent::tools::echo::EchoTool;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// A scripted provider that replays canned responses per call, used to
    /// drive the ReAct loop deterministically in tests.
    struct ScriptedProvider {
        responses: StdMutex<std::collections::VecDeque<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: StdMutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(Ok(content)) => Ok(ChatResponse { content, model: "scripted".to_string(), tokens_in: 0, tokens_out: 0 }),
                Some(Err(e)) => Err(ProviderError::Unavailable(e)),
                None => Ok(ChatResponse {
                    content: r#"{"thought":"give up","response":"no more script"}"#.to_string(),
                    model: "scripted".to_string(),
                    tokens_in: 0,
                    tokens_out: 0,
                }),
            }
        }
    }

    async fn test_orchestrator(responses: Vec<Result<&str, &str>>, max_steps: u32) -> (Orchestrator, Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let prompts_dir = dir.path().join("prompts");
        nexus_agent::context::ensure_prompt_scaffold(&prompts_dir).unwrap();
        let memories_dir = dir.path().join("memories");
        let memory = Arc::new(MemoryStore::new(&memories_dir, 20).await.unwrap());
        let journal = Arc::new(JournalStore::new(&memories_dir).await.unwrap());
        let store = Store::open_in_memory().unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let registry = Arc::new(registry);

        let provider: Box<dyn LlmProvider> = Box::new(ScriptedProvider::new(responses));
        let router = Arc::new(ProviderRouter::new(provider, "primary", "complex", "fallback", 1024, 30));

        let context = ContextBuilder::new(&prompts_dir, 3, 5, 4000);
        let redactor = Arc::new(Redactor::new());
        let log_path = dir.path().join("redacted.log");

        let orchestrator = Orchestrator::new(
            store.clone(),
            memory,
            journal,
            registry,
            router,
            context,
            redactor,
            max_steps,
            4000,
            log_path,
        );
        (orchestrator, store, dir)
    }

    fn inbound(id: &str, chat_id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: id.to_string(),
            channel: "whatsapp".to_string(),
            chat_id: chat_id.to_string(),
            sender_id: chat_id.to_string(),
            is_self_chat: true,
            is_from_me: true,
            text: Some(text.to_string()),
            media: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_drops_second_inbound() {
        let (orchestrator, store, _dir) =
            test_orchestrator(vec![Ok(r#"{"thought":"hi","response":"hello there"}"#)], 10).await;
        let msg = inbound("dup-1", "self@lid", "hello");
        orchestrator.handle_inbound(msg.clone(), "t1".to_string()).await;
        orchestrator.handle_inbound(msg, "t2".to_string()).await;
        // only the first delivery's audit trail exists
        let rows = store.list_audit_for_trace("t1").unwrap();
        assert!(!rows.is_empty());
        assert!(store.list_audit_for_trace("t2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_chat_identity_mismatch_is_dropped() {
        let (orchestrator, store, _dir) = test_orchestrator(vec![], 10).await;
        let mut msg = inbound("m-1", "15551234567@lid", "hi");
        msg.is_from_me = false;
        msg.sender_id = "15559876543@s.whatsapp.net".to_string();
        orchestrator.handle_inbound(msg, "t1".to_string()).await;
        assert!(store.list_audit_for_trace("t1").unwrap().is_empty());
        assert!(!store.ledger_contains("m-1").unwrap());
    }

    #[tokio::test]
    async fn self_chat_identity_match_is_admitted() {
        let (orchestrator, store, _dir) =
            test_orchestrator(vec![Ok(r#"{"thought":"hi","response":"hello"}"#)], 10).await;
        let mut msg = inbound("m-2", "15551234567@lid", "hi");
        msg.is_from_me = false;
        msg.sender_id = "15551234567@s.whatsapp.net".to_string();
        orchestrator.handle_inbound(msg, "t1".to_string()).await;
        assert!(store.ledger_contains("m-2").unwrap());
    }

    #[tokio::test]
    async fn multi_step_react_loop_ends_in_one_reply() {
        let (orchestrator, store, _dir) = test_orchestrator(
            vec![
                Ok(r#"{"thought":"step1","call":{"name":"echo","arguments":{"text":"a"}}}"#),
                Ok(r#"{"thought":"step2","call":{"name":"echo","arguments":{"text":"b"}}}"#),
                Ok(r#"{"thought":"step3","response":"final"}"#),
            ],
            10,
        )
        .await;
        let msg = inbound("m-3", "self@lid", "go");
        orchestrator.handle_inbound(msg, "t1".to_string()).await;
        let rows = store.list_audit_for_trace("t1").unwrap();
        let step_rows = rows.iter().filter(|r| r.event == "loop.step").count();
        assert_eq!(step_rows, 3);
    }

    #[tokio::test]
    async fn invalid_decision_recovers_on_next_step() {
        let (orchestrator, store, _dir) = test_orchestrator(
            vec![Ok("not json"), Ok(r#"{"thought":"ok","response":"recovered"}"#)],
            10,
        )
        .await;
        let msg = inbound("m-4", "self@lid", "go");
        orchestrator.handle_inbound(msg, "t1".to_string()).await;
        let rows = store.list_audit_for_trace("t1").unwrap();
        let failures = rows
            .iter()
            .filter(|r| r.event == "loop.step" && r.payload.get("ok").and_then(Value::as_bool) == Some(false))
            .count();
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn max_steps_exhausted_sends_boilerplate() {
        let scripted: Vec<Result<&str, &str>> = (0..5)
            .map(|_| Ok(r#"{"thought":"keep going","call":{"name":"echo","arguments":{"text":"x"}}}"#))
            .collect();
        let (orchestrator, store, _dir) = test_orchestrator(scripted, 3).await;
        let msg = inbound("m-5", "self@lid", "go");
        orchestrator.handle_inbound(msg, "t1".to_string()).await;
        let rows = store.list_audit_for_trace("t1").unwrap();
        assert!(rows.iter().any(|r| r.event == "loop.max_steps_reached"));
        let step_rows = rows.iter().filter(|r| r.event == "loop.step").count();
        assert_eq!(step_rows, 3);
    }
}
