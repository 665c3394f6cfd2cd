//! Direct command grammar: `/tool <name> <json>`, `/schedule <when> |
//! <text>`, `/jobs`. Ported from
//! `examples/original_source/nexus/core/loop.py`'s `_parse_tool_command`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectCommand {
    Tool { tool: String, args: Value },
    Response(String),
}

pub fn parse_tool_command(text: &str) -> Option<DirectCommand> {
    let text = text.trim();

    if let Some(_rest) = text.strip_prefix("/tool ") {
        let parts: Vec<&str> = text.splitn(3, ' ').collect();
        if parts.len() < 3 {
            return None;
        }
        let tool_name = parts[1].to_string();
        return match serde_json::from_str::<Value>(parts[2]) {
            Ok(args) => Some(DirectCommand::Tool { tool: tool_name, args }),
            Err(_) => Some(DirectCommand::Response("Invalid JSON. Use /tool <name> <json>.".to_string())),
        };
    }

    if let Some(rest) = text.strip_prefix("/schedule ") {
        let payload = rest.trim();
        let Some((when, reminder)) = payload.split_once('|') else {
            return Some(DirectCommand::Response(
                "Use /schedule <when> | <text>. Example: /schedule every monday at 9am | Weekly check-in".to_string(),
            ));
        };
        let when = when.trim().to_string();
        let reminder = reminder.trim().to_string();
        return Some(DirectCommand::Tool {
            tool: "scheduler".to_string(),
            args: serde_json::json!({ "action": "schedule", "when": when, "text": reminder }),
        });
    }

    if text.starts_with("/jobs") {
        return Some(DirectCommand::Tool {
            tool: "scheduler".to_string(),
            args: serde_json::json!({ "action": "list" }),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_command() {
        let cmd = parse_tool_command(r#"/tool echo {"text": "hi"}"#).unwrap();
        assert_eq!(
            cmd,
            DirectCommand::Tool { tool: "echo".to_string(), args: serde_json::json!({"text": "hi"}) }
        );
    }

    #[test]
    fn rejects_malformed_tool_json() {
        let cmd = parse_tool_command("/tool echo not-json").unwrap();
        assert!(matches!(cmd, DirectCommand::Response(_)));
    }

    #[test]
    fn tool_command_needs_three_parts() {
        assert!(parse_tool_command("/tool echo").is_none());
    }

    #[test]
    fn parses_schedule_command() {
        let cmd = parse_tool_command("/schedule every monday at 9am | Weekly check-in").unwrap();
        assert_eq!(
            cmd,
            DirectCommand::Tool {
                tool: "scheduler".to_string(),
                args: serde_json::json!({"action": "schedule", "when": "every monday at 9am", "text": "Weekly check-in"}),
            }
        );
    }

    #[test]
    fn schedule_without_pipe_is_a_usage_hint() {
        let cmd = parse_tool_command("/schedule every monday at 9am").unwrap();
        assert!(matches!(cmd, DirectCommand::Response(_)));
    }

    #[test]
    fn parses_jobs_command() {
        let cmd = parse_tool_command("/jobs").unwrap();
        assert_eq!(
            cmd,
            DirectCommand::Tool { tool: "scheduler".to_string(), args: serde_json::json!({"action": "list"}) }
        );
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(parse_tool_command("hello there").is_none());
    }
}
