//! Assembles the per-turn system prompt + message list. Section ordering
//! (`system.md` required → optional SOUL/IDENTITY/AGENTS → Tools → Skills →
//! Long-Term Memory → Recent Daily Notes) and message layout
//! (`[system, …last-12 session turns, user, …step messages]`) are ported
//! from `examples/original_source/nexus/llm/context.py`'s `ContextBuilder`.
//! Each section is loaded from its own file and clipped independently,
//! so a missing optional file just drops its section.

use std::path::{Path, PathBuf};

use nexus_memory::MemoryStore;
use thiserror::Error;

use crate::provider::{Message, Role};
use crate::skills::load_skill_documents;
use crate::tools::ToolRegistry;

const SESSION_HISTORY_TURNS: usize = 12;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("required prompt file missing: {0}")]
    MissingPromptFile(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ContextBuilder {
    prompts_dir: PathBuf,
    skills_dir: PathBuf,
    max_memory_sections: usize,
    memory_recent_days: usize,
    observation_max_chars: usize,
}

impl ContextBuilder {
    pub fn new(
        prompts_dir: impl Into<PathBuf>,
        max_memory_sections: usize,
        memory_recent_days: usize,
        observation_max_chars: usize,
    ) -> Self {
        let prompts_dir = prompts_dir.into();
        let skills_dir = prompts_dir.join("skills");
        Self {
            prompts_dir,
            skills_dir,
            max_memory_sections,
            memory_recent_days,
            observation_max_chars,
        }
    }

    /// Override the default `<prompts_dir>/skills` location skills are
    /// loaded from.
    pub fn with_skills_dir(mut self, skills_dir: impl Into<PathBuf>) -> Self {
        self.skills_dir = skills_dir.into();
        self
    }

    fn read_prompt_file(&self, name: &str) -> Option<String> {
        let path = self.prompts_dir.join(name);
        let text = std::fs::read_to_string(&path).ok()?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn clip(text: &str, max_chars: usize) -> String {
        if max_chars == 0 || text.chars().count() <= max_chars {
            return text.to_string();
        }
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...(truncated)")
    }

    async fn build_prompt_sections(
        &self,
        memory: &MemoryStore,
        tools: &ToolRegistry,
        query: &str,
    ) -> Result<String, ContextError> {
        let mut sections: Vec<String> = Vec::new();

        let system_text = self
            .read_prompt_file("system.md")
            .ok_or_else(|| ContextError::MissingPromptFile(self.prompts_dir.join("system.md").display().to_string()))?;
        sections.push(system_text);

        for name in ["SOUL.md", "IDENTITY.md", "AGENTS.md"] {
            if let Some(text) = self.read_prompt_file(name) {
                sections.push(text);
            }
        }

        let tool_specs: Vec<serde_json::Value> = tools
            .specs()
            .into_iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "description": s.description,
                    "input_schema": s.input_schema,
                })
            })
            .collect();
        let tools_json = serde_json::to_string_pretty(&tool_specs).unwrap_or_default();
        sections.push(format!("## Tools\nAvailable tool specs (JSON schema):\n{tools_json}"));

        let skills = load_skill_documents(&self.skills_dir);
        if !skills.is_empty() {
            let mut skill_lines = vec!["## Skills".to_string()];
            for skill in &skills {
                skill_lines.push(format!("### {}\n{}", skill.name, skill.content));
            }
            sections.push(skill_lines.join("\n\n"));
        }

        let long_term = memory.relevant_memory(query, self.max_memory_sections).await?;
        if !long_term.is_empty() {
            let lt_text: Vec<String> = long_term
                .iter()
                .enumerate()
                .map(|(idx, snippet)| format!("### Memory Snippet {}\n{}", idx + 1, snippet))
                .collect();
            sections.push(format!("## Long-Term Memory\n{}", lt_text.join("\n\n")));
        }

        let recent_notes = memory.recent_daily_notes(self.memory_recent_days).await;
        if !recent_notes.is_empty() {
            let per_note_limit = (self.observation_max_chars / 2).max(1000);
            let note_parts: Vec<String> = recent_notes
                .iter()
                .map(|(day, text)| format!("### {day}\n{}", Self::clip(text, per_note_limit)))
                .collect();
            sections.push(format!("## Recent Daily Notes\n{}", note_parts.join("\n\n")));
        }

        Ok(sections
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Build the full message list for a ReAct step.
    pub async fn build_messages(
        &self,
        memory: &MemoryStore,
        tools: &ToolRegistry,
        chat_id: &str,
        user_text: &str,
        step_messages: &[Message],
    ) -> Result<Vec<Message>, ContextError> {
        let system_prompt = self.build_prompt_sections(memory, tools, user_text).await?;

        let mut messages = Vec::new();
        let history = memory.session_history(chat_id);
        let start = history.len().saturating_sub(SESSION_HISTORY_TURNS);
        for turn in &history[start..] {
            let msg = if turn.role == "assistant" {
                Message::assistant(turn.content.clone())
            } else {
                Message::user(turn.content.clone())
            };
            messages.push(msg);
        }
        messages.push(Message::user(user_text.to_string()));
        messages.extend_from_slice(step_messages);

        let mut full = vec![Message { role: Role::System, content: system_prompt }];
        full.extend(messages);
        Ok(full)
    }
}

/// Ensures `system.md`/`SOUL.md`/`IDENTITY.md`/`AGENTS.md` exist with a
/// minimal scaffold, the way `ensure_prompt_scaffold` does on first boot.
pub fn ensure_prompt_scaffold(prompts_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(prompts_dir)?;
    let defaults: &[(&str, &str)] = &[
        ("system.md", "# Nexus System Prompt\n"),
        ("SOUL.md", "# Soul\n"),
        ("IDENTITY.md", "# Identity\n"),
        ("AGENTS.md", "# Agent Notes\n"),
    ];
    for (name, fallback) in defaults {
        let path = prompts_dir.join(name);
        if !path.exists() {
            std::fs::write(path, fallback)?;
        }
    }
    Ok(())
}
