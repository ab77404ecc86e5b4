//! Turns a model reply into a [`CommandResult`].
//!
//! Every path ends in a value: a reply that cannot be read becomes a failure
//! result with an empty command, so nothing runs because of a bad reply.

use crate::types::CommandResult;
use serde::Deserialize;
use serde_json::Value;

const FENCE: &str = "```";

#[derive(Debug, Deserialize)]
struct CommandReply {
    command_nlp: String,
    command_shell: String,
    explanation: String,
    is_safe: bool,
}

/// Parse `reply` into a command result. `request` is echoed as the
/// description when the reply cannot be used.
pub fn parse_reply(reply: &str, request: &str) -> CommandResult {
    match decode(reply) {
        Ok(parsed) => {
            if parsed.command_shell.trim().is_empty() {
                tracing::debug!("model returned no command for {:?}", request);
            }
            CommandResult::new(
                parsed.command_nlp,
                parsed.command_shell,
                parsed.explanation,
                parsed.is_safe,
            )
        }
        Err(e) => {
            tracing::warn!("could not parse model reply: {}", e);
            tracing::debug!("reply: {}", reply.chars().take(300).collect::<String>());
            CommandResult::failure(request, format!("Error parsing command: {}", e))
        }
    }
}

fn decode(reply: &str) -> Result<CommandReply, String> {
    let body = extract_json(strip_code_fence(reply));
    if body.is_empty() {
        return Err("empty reply".to_string());
    }

    let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err(format!("expected a JSON object, got {}", kind_of(&value)));
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Remove one fenced block marker pair, with or without a language tag.
/// Text without a fence is returned trimmed.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find(FENCE) else {
        return text;
    };

    let after_open = &text[open + FENCE.len()..];
    let inner = match after_open.find('\n') {
        // the rest of the opening line is a language tag unless it already holds JSON
        Some(newline) if !after_open[..newline].contains('{') => &after_open[newline + 1..],
        _ => after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    match inner.find(FENCE) {
        Some(close) => inner[..close].trim(),
        None => inner.trim(),
    }
}

/// Narrow surrounding prose down to the outermost `{...}` span.
fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
