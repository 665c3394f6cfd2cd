use std::sync::Arc;

use async_trait::async_trait;
use nexus_scheduler::SchedulerEngine;
use serde_json::Value;

use super::{Tool, ToolResult, ToolSpec};

/// Wraps a [`SchedulerEngine`] with `schedule`/`list`/`cancel`/`update`
/// actions, matching `examples/original_source/nexus/tools/scheduler.py`'s
/// `SchedulerTool.run` dispatch.
pub struct SchedulerTool {
    engine: Arc<SchedulerEngine>,
}

impl SchedulerTool {
    pub fn new(engine: Arc<SchedulerEngine>) -> Self {
        Self { engine }
    }
}

fn str_arg(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl Tool for SchedulerTool {
    fn name(&self) -> &str {
        "scheduler"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Schedule reminders and recurring jobs with list/cancel/update support.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["schedule", "list", "cancel", "update"] },
                    "chat_id": { "type": "string" },
                    "job_id": { "type": "string" },
                    "text": { "type": "string" },
                    "when": { "type": "string" },
                },
                "required": ["action"],
            }),
        }
    }

    async fn run(&self, args: Value) -> ToolResult {
        let action = args.get("action").and_then(Value::as_str).unwrap_or("");
        let chat_id = str_arg(&args, "chat_id");

        match action {
            "list" => {
                if chat_id.is_empty() {
                    return ToolResult::error("chat_id is required");
                }
                match self.engine.list_jobs(Some(&chat_id)) {
                    Ok(jobs) if jobs.is_empty() => ToolResult::ok("No scheduled jobs"),
                    Ok(jobs) => {
                        let lines: Vec<String> = jobs
                            .iter()
                            .map(|j| {
                                format!(
                                    "- {} next={} when={}",
                                    j.job_id,
                                    j.next_run_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "none".to_string()),
                                    j.when_spec
                                )
                            })
                            .collect();
                        ToolResult::ok(lines.join("\n"))
                    }
                    Err(e) => ToolResult::error(format!("failed to list jobs: {e}")),
                }
            }
            "schedule" => {
                if chat_id.is_empty() {
                    return ToolResult::error("chat_id is required");
                }
                let when = str_arg(&args, "when");
                if when.is_empty() {
                    return ToolResult::error("when is required");
                }
                let text = {
                    let t = str_arg(&args, "text");
                    if t.is_empty() { "Reminder".to_string() } else { t }
                };
                match self.engine.schedule(&chat_id, &when, &text) {
                    Ok(job) => ToolResult::ok(format!("Scheduled job {} ({})", job.job_id, when)),
                    Err(e) => ToolResult::error(format!("failed to parse schedule: {e}")),
                }
            }
            "cancel" => {
                let job_id = str_arg(&args, "job_id");
                if job_id.is_empty() {
                    return ToolResult::error("job_id is required");
                }
                match self.engine.cancel(&job_id) {
                    Ok(()) => ToolResult::ok(format!("Cancelled job {job_id}")),
                    Err(e) => ToolResult::error(format!("failed to cancel job: {e}")),
                }
            }
            "update" => {
                let job_id = str_arg(&args, "job_id");
                if job_id.is_empty() {
                    return ToolResult::error("job_id is required");
                }
                let when = str_arg(&args, "when");
                if when.is_empty() {
                    return ToolResult::error("when is required");
                }
                let text = {
                    let t = str_arg(&args, "text");
                    if t.is_empty() { "Reminder".to_string() } else { t }
                };
                match self.engine.update(&job_id, &when, &text) {
                    Ok(job) => ToolResult::ok(format!("Updated job {} ({})", job.job_id, when)),
                    Err(e) => ToolResult::error(format!("failed to update job: {e}")),
                }
            }
            other => ToolResult::error(format!("Unsupported action: {other}")),
        }
    }
}
