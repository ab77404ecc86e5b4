use serde::{Deserialize, Serialize};
use std::fmt;

/// A natural-language request as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    text: String,
}

impl CommandRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

const NO_COMMAND_EXPLANATION: &str = "No command was generated for this request.";

/// A typed command suggestion.
///
/// An empty `shell_command` marks a failure; such a value always carries a
/// non-empty explanation and is never executed. Fields are read-only once
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    natural_language_description: String,
    shell_command: String,
    explanation: String,
    is_safe: bool,
}

impl CommandResult {
    pub fn new(
        description: impl Into<String>,
        shell_command: impl Into<String>,
        explanation: impl Into<String>,
        is_safe: bool,
    ) -> Self {
        let shell_command = shell_command.into().trim().to_string();
        let mut explanation = explanation.into();
        if shell_command.is_empty() && explanation.trim().is_empty() {
            explanation = NO_COMMAND_EXPLANATION.to_string();
        }

        Self {
            natural_language_description: description.into(),
            shell_command,
            explanation,
            is_safe,
        }
    }

    /// A result that carries no command. `is_safe` is true because nothing
    /// will run.
    pub fn failure(description: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self::new(description, "", explanation, true)
    }

    pub fn description(&self) -> &str {
        &self.natural_language_description
    }

    pub fn shell_command(&self) -> &str {
        &self.shell_command
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn is_safe(&self) -> bool {
        self.is_safe
    }

    pub fn is_failure(&self) -> bool {
        self.shell_command.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Safe,
    Risky,
    Dangerous,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Safe => "safe",
            RiskTier::Risky => "risky",
            RiskTier::Dangerous => "dangerous",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub nlp: String,
    #[serde(alias = "shell")]
    pub command: String,
    #[serde(default)]
    pub success: bool,
}
