//! Parser for the agent's per-step JSON decision: `{thought, call|response}`.
//!
//! Ported from `examples/original_source/nexus/core/decision.py`. Modeled as
//! a tagged enum with a hand-written, permissive parse path rather than
//! `#[serde(untagged)]` — the exclusivity check and the JSON-candidate
//! recovery scan (string content, bracket-scanning fallback, array → first
//! element) need logic a derive can't express.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionAction {
    Call(DecisionCall),
    Response(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDecision {
    pub thought: String,
    pub action: DecisionAction,
}

#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
pub struct DecisionParseError(pub String);

fn err(loc: &str, msg: &str) -> DecisionParseError {
    if loc.is_empty() {
        DecisionParseError(format!("invalid decision: {msg}"))
    } else {
        DecisionParseError(format!("invalid decision at {loc}: {msg}"))
    }
}

/// Try `text` as JSON outright, then scan for the first `{`/`[` and attempt
/// a prefix decode from there. Mirrors `_extract_json_candidate`.
fn extract_json_candidate(text: &str) -> Option<Value> {
    let stripped = text.trim();
    if stripped.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(stripped) {
        return Some(v);
    }

    let mut starts: Vec<usize> = Vec::new();
    if let Some(i) = stripped.find('{') {
        starts.push(i);
    }
    if let Some(i) = stripped.find('[') {
        starts.push(i);
    }
    starts.sort_unstable();
    starts.dedup();

    for start in starts {
        let slice = &stripped[start..];
        let mut stream = serde_json::Deserializer::from_str(slice).into_iter::<Value>();
        if let Some(Ok(v)) = stream.next() {
            return Some(v);
        }
    }
    None
}

/// Mirrors `_coerce_payload`: unwrap a JSON-encoded string, take the first
/// element of a non-empty array, and require the result be a JSON object.
fn coerce_payload(text: &str) -> Result<serde_json::Map<String, Value>, DecisionParseError> {
    let mut payload = extract_json_candidate(text)
        .ok_or_else(|| DecisionParseError("decision must be valid JSON object".to_string()))?;

    if let Value::Array(items) = payload {
        if items.is_empty() {
            return Err(DecisionParseError("decision array is empty".to_string()));
        }
        payload = items.into_iter().next().unwrap();
    }

    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(DecisionParseError("decision must be a JSON object".to_string())),
    }
}

/// Parse the raw text returned by the LLM for a single ReAct step.
pub fn parse_agent_decision(text: &str) -> Result<AgentDecision, DecisionParseError> {
    let map = coerce_payload(text)?;

    let thought = match map.get("thought") {
        None => return Err(err("thought", "field required")),
        Some(v) => match v.as_str() {
            None => return Err(err("thought", "Input should be a valid string")),
            Some(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(err("thought", "thought must not be empty"));
                }
                trimmed.to_string()
            }
        },
    };

    let call_val = map.get("call").filter(|v| !v.is_null());
    let response_val = map.get("response").filter(|v| !v.is_null());

    let call = match call_val {
        None => None,
        Some(v) => {
            let obj = v
                .as_object()
                .ok_or_else(|| err("call", "Input should be a valid dictionary"))?;
            let name = match obj.get("name") {
                None => return Err(err("call.name", "field required")),
                Some(v) => match v.as_str() {
                    None => return Err(err("call.name", "Input should be a valid string")),
                    Some(s) => {
                        let trimmed = s.trim();
                        if trimmed.is_empty() {
                            return Err(err("call.name", "call.name must not be empty"));
                        }
                        trimmed.to_string()
                    }
                },
            };
            let arguments = match obj.get("arguments") {
                None => Value::Object(serde_json::Map::new()),
                Some(v) if v.is_object() => v.clone(),
                Some(_) => return Err(err("call.arguments", "Input should be a valid dictionary")),
            };
            Some(DecisionCall { name, arguments })
        }
    };

    let response = match response_val {
        None => None,
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| err("response", "Input should be a valid string"))?;
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(err("response", "response must not be empty"));
            }
            Some(trimmed.to_string())
        }
    };

    let action = match (call, response) {
        (Some(c), None) => DecisionAction::Call(c),
        (None, Some(r)) => DecisionAction::Response(r),
        _ => return Err(err("", "exactly one of call or response is required")),
    };

    Ok(AgentDecision { thought, action })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_response_decision() {
        let d = parse_agent_decision(r#"{"thought":"just say hi","response":"hello there"}"#).unwrap();
        assert_eq!(d.thought, "just say hi");
        assert_eq!(d.action, DecisionAction::Response("hello there".to_string()));
    }

    #[test]
    fn parses_a_call_decision_with_default_arguments() {
        let d = parse_agent_decision(r#"{"thought":"need the time","call":{"name":"clock"}}"#).unwrap();
        match d.action {
            DecisionAction::Call(c) => {
                assert_eq!(c.name, "clock");
                assert_eq!(c.arguments, Value::Object(Default::default()));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn recovers_json_embedded_in_prose() {
        let text = "Sure thing! {\"thought\":\"ok\",\"response\":\"done\"} (trailing notes)";
        let d = parse_agent_decision(text).unwrap();
        assert_eq!(d.action, DecisionAction::Response("done".to_string()));
    }

    #[test]
    fn rejects_both_call_and_response() {
        let text = r#"{"thought":"x","response":"a","call":{"name":"b"}}"#;
        let e = parse_agent_decision(text).unwrap_err();
        assert_eq!(e.0, "invalid decision: exactly one of call or response is required");
    }

    #[test]
    fn rejects_neither_call_nor_response() {
        let e = parse_agent_decision(r#"{"thought":"x"}"#).unwrap_err();
        assert_eq!(e.0, "invalid decision: exactly one of call or response is required");
    }

    #[test]
    fn rejects_empty_thought() {
        let e = parse_agent_decision(r#"{"thought":"  ","response":"ok"}"#).unwrap_err();
        assert_eq!(e.0, "invalid decision at thought: thought must not be empty");
    }

    #[test]
    fn takes_first_element_of_a_json_array() {
        let d = parse_agent_decision(r#"[{"thought":"a","response":"first"}, {"thought":"b","response":"second"}]"#).unwrap();
        assert_eq!(d.action, DecisionAction::Response("first".to_string()));
    }

    #[test]
    fn rejects_unparseable_text() {
        let e = parse_agent_decision("not json at all").unwrap_err();
        assert_eq!(e.0, "decision must be valid JSON object");
    }
}
