use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nexus_protocol::pending_action::RiskLevel;
use serde_json::Value;

use super::{Tool, ToolResult, ToolSpec};

/// Minimal sandboxed filesystem tool: `read_file` is low-risk and runs
/// immediately; `write_file`/`delete_file` are high-risk and require
/// confirmation unless the orchestrator has already set `confirmed: true`
/// (i.e. this is a resumed, approved pending action). Scoped to a single
/// workspace root — no path may escape it via `..`.
pub struct FilesystemTool {
    root: PathBuf,
}

impl FilesystemTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, rel: &str) -> Option<PathBuf> {
        if rel.is_empty() {
            return None;
        }
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() || rel_path.components().any(|c| c.as_os_str() == "..") {
            return None;
        }
        Some(self.root.join(rel_path))
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Read, write, or delete a file inside the sandboxed workspace root.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["read_file", "write_file", "delete_file"] },
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                },
                "required": ["action", "path"],
            }),
        }
    }

    async fn run(&self, args: Value) -> ToolResult {
        let action = args.get("action").and_then(Value::as_str).unwrap_or("");
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");

        let Some(resolved) = self.resolve(path) else {
            return ToolResult::error("path is required and must stay inside the workspace root");
        };

        match action {
            "read_file" => match tokio::fs::read_to_string(&resolved).await {
                Ok(content) => ToolResult::ok(content),
                Err(e) => ToolResult::error(format!("failed to read {path}: {e}")),
            },
            "write_file" | "delete_file" => {
                let confirmed = args.get("confirmed").and_then(Value::as_bool).unwrap_or(false);
                if !confirmed {
                    return ToolResult::needs_confirmation(
                        RiskLevel::High,
                        serde_json::json!({ "tool": "filesystem", "args": args }),
                    );
                }
                if action == "write_file" {
                    let content = args.get("content").and_then(Value::as_str).unwrap_or("");
                    match resolved
                        .parent()
                        .map(tokio::fs::create_dir_all)
                    {
                        Some(fut) => {
                            if let Err(e) = fut.await {
                                return ToolResult::error(format!("failed to create parent directories: {e}"));
                            }
                        }
                        None => {}
                    }
                    match tokio::fs::write(&resolved, content).await {
                        Ok(()) => ToolResult::ok(format!("wrote {path}")),
                        Err(e) => ToolResult::error(format!("failed to write {path}: {e}")),
                    }
                } else {
                    match tokio::fs::remove_file(&resolved).await {
                        Ok(()) => ToolResult::ok(format!("deleted {path}")),
                        Err(e) => ToolResult::error(format!("failed to delete {path}: {e}")),
                    }
                }
            }
            other => ToolResult::error(format!("Unsupported action: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_file_returns_error_result_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new(dir.path());
        let result = tool
            .run(serde_json::json!({"action": "read_file", "path": "missing.txt"}))
            .await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn write_file_requires_confirmation_first() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new(dir.path());
        let result = tool
            .run(serde_json::json!({"action": "write_file", "path": "note.txt", "content": "hi"}))
            .await;
        assert!(result.requires_confirmation);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn write_file_succeeds_once_confirmed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new(dir.path());
        let result = tool
            .run(serde_json::json!({"action": "write_file", "path": "note.txt", "content": "hi", "confirmed": true}))
            .await;
        assert!(result.ok);
        assert_eq!(std::fs::read_to_string(dir.path().join("note.txt")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new(dir.path());
        let result = tool
            .run(serde_json::json!({"action": "read_file", "path": "../escape.txt"}))
            .await;
        assert!(!result.ok);
    }
}
