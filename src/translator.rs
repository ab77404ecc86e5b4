use crate::llm::Completion;
use crate::parser::parse_reply;
use crate::types::{CommandRequest, CommandResult};
use std::env;

fn build_prompt(request: &str, os: &str, cwd: &str) -> String {
    format!(
        r#"You are a terminal assistant. Convert the user's request into a single {os} shell command.

RULES:
1. Output one command. Chain steps with && or pipes if needed.
2. Use standard utilities that ship with {os}.
3. Use relative paths from the current directory where possible.
4. "is_safe" is false if the command deletes files, changes permissions or system settings, kills processes, or is otherwise destructive. It is true for read-only commands such as ls, cat, grep.
5. If the request cannot be done with a shell command, leave "command_shell" empty and say why in "explanation".

Current directory: {cwd}

REQUEST: {request}

Respond with ONLY this JSON, no other text:
{{"command_nlp": "the request in a few words", "command_shell": "the command", "explanation": "what it does", "is_safe": true}}"#,
        os = os,
        cwd = cwd,
        request = request
    )
}

fn host_os() -> &'static str {
    match env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        other => other,
    }
}

/// Ask the backend for a command. Never fails: transport errors come back as
/// a failure result with an empty command.
pub async fn translate<C>(client: &C, request: &CommandRequest, cwd: &str) -> CommandResult
where
    C: Completion + ?Sized,
{
    if request.is_empty() {
        return CommandResult::failure("", "Nothing to translate: the request is empty.");
    }

    let prompt = build_prompt(request.text(), host_os(), cwd);
    match client.generate(&prompt).await {
        Ok(reply) => parse_reply(&reply, request.text()),
        Err(e) => {
            tracing::warn!("model request failed: {}", e);
            CommandResult::failure(request.text(), format!("Error generating command: {}", e))
        }
    }
}
