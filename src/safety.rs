//! Keyword-based risk classification and the execution gate.
//!
//! Classification is plain substring matching against two configurable
//! tables. It over-flags on purpose: a false positive costs a confirmation,
//! a false negative can cost a disk.

use crate::config::{RiskPattern, SafetyConfig};
use crate::types::{CommandResult, RiskTier};
use serde::Serialize;

const GENERIC_RISK_MESSAGE: &str =
    "This command may have unintended consequences. Review it carefully.";
const PRIVILEGE_MESSAGE: &str =
    "This command runs with administrator privileges. Verify it is correct.";
const MODEL_FLAGGED_MESSAGE: &str =
    "The model marked this command as unsafe to run without confirmation.";

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    dangerous: Vec<LoweredPattern>,
    risky: Vec<LoweredPattern>,
    privilege_prefix: String,
}

#[derive(Debug, Clone)]
struct LoweredPattern {
    needle: String,
    reason: Option<String>,
}

impl From<&RiskPattern> for LoweredPattern {
    fn from(p: &RiskPattern) -> Self {
        Self {
            needle: p.pattern.to_lowercase(),
            reason: p.reason.clone(),
        }
    }
}

impl RiskClassifier {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            dangerous: lower_table(&config.dangerous),
            risky: lower_table(&config.risky),
            privilege_prefix: config.privilege_prefix.trim().to_lowercase(),
        }
    }

    pub fn classify(&self, command: &str) -> RiskTier {
        let lowered = command.trim().to_lowercase();
        if lowered.is_empty() {
            return RiskTier::Safe;
        }

        let tier = if first_match(&self.dangerous, &lowered).is_some() {
            RiskTier::Dangerous
        } else if first_match(&self.risky, &lowered).is_some() {
            RiskTier::Risky
        } else {
            RiskTier::Safe
        };

        if self.is_privileged(&lowered) {
            tier.max(RiskTier::Risky)
        } else {
            tier
        }
    }

    /// Why a command is not `Safe`, or `None` when it is.
    pub fn explain(&self, command: &str) -> Option<String> {
        if self.classify(command) == RiskTier::Safe {
            return None;
        }

        let lowered = command.trim().to_lowercase();
        let specific = self
            .dangerous
            .iter()
            .chain(self.risky.iter())
            .filter(|p| lowered.contains(&p.needle))
            .find_map(|p| p.reason.clone());

        if let Some(reason) = specific {
            return Some(reason);
        }
        if self.is_privileged(&lowered) {
            return Some(PRIVILEGE_MESSAGE.to_string());
        }
        Some(GENERIC_RISK_MESSAGE.to_string())
    }

    pub fn describe(&self, command: &str) -> CommandPreview {
        let base = base_command(command);
        let arg = command.split_whitespace().nth(1);

        let description = match base.as_str() {
            "" => "Empty command".to_string(),
            "ls" => "List directory contents".to_string(),
            "cd" => format!("Change directory to {}", arg.unwrap_or("home")),
            "mkdir" => format!("Create directory {}", arg.unwrap_or("")).trim_end().to_string(),
            "rm" => "Remove files or directories".to_string(),
            "cp" => "Copy files or directories".to_string(),
            "mv" => "Move or rename files or directories".to_string(),
            "cat" => "Display file contents".to_string(),
            "grep" | "rg" => "Search for patterns in files".to_string(),
            "find" => "Search for files".to_string(),
            "chmod" => "Change file permissions".to_string(),
            "chown" => "Change file ownership".to_string(),
            "git" => "Git version control operation".to_string(),
            "python" | "python3" => "Run a Python script".to_string(),
            "pip" | "pip3" => "Python package manager".to_string(),
            "npm" => "Node package manager".to_string(),
            "cargo" => "Rust package manager".to_string(),
            "docker" => "Docker container operation".to_string(),
            "sudo" => "Run a command with administrator privileges".to_string(),
            other => format!("Execute {}", other),
        };

        CommandPreview {
            command: base,
            description,
            full_command: command.trim().to_string(),
            tier: self.classify(command),
        }
    }

    fn is_privileged(&self, lowered: &str) -> bool {
        !self.privilege_prefix.is_empty()
            && lowered.split_whitespace().next() == Some(self.privilege_prefix.as_str())
    }
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(&SafetyConfig::default())
    }
}

fn lower_table(patterns: &[RiskPattern]) -> Vec<LoweredPattern> {
    patterns
        .iter()
        .filter(|p| !p.pattern.trim().is_empty())
        .map(LoweredPattern::from)
        .collect()
}

fn first_match<'a>(table: &'a [LoweredPattern], lowered: &str) -> Option<&'a LoweredPattern> {
    table.iter().find(|p| lowered.contains(&p.needle))
}

fn base_command(command: &str) -> String {
    let first = command.split_whitespace().next().unwrap_or("");
    first.rsplit('/').next().unwrap_or(first).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandPreview {
    pub command: String,
    pub description: String,
    pub full_command: String,
    pub tier: RiskTier,
}

/// What the caller may do with a command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Both the classifier and the model consider the command safe.
    Clear,
    NeedsConfirmation { tier: RiskTier, reason: String },
    Blocked { reason: String },
    NothingToRun { reason: String },
}

impl Verdict {
    pub fn may_run(&self) -> bool {
        matches!(self, Verdict::Clear | Verdict::NeedsConfirmation { .. })
    }
}

/// Gate a command result on both the classifier's tier and the model's own
/// `is_safe` flag. Neither one alone can clear a command.
pub fn assess(result: &CommandResult, classifier: &RiskClassifier) -> Verdict {
    if result.is_failure() {
        return Verdict::NothingToRun {
            reason: result.explanation().to_string(),
        };
    }

    let command = result.shell_command();
    let tier = classifier.classify(command);
    let reason = || {
        classifier
            .explain(command)
            .unwrap_or_else(|| GENERIC_RISK_MESSAGE.to_string())
    };

    match tier {
        RiskTier::Dangerous => Verdict::Blocked { reason: reason() },
        RiskTier::Risky => Verdict::NeedsConfirmation {
            tier,
            reason: reason(),
        },
        RiskTier::Safe if !result.is_safe() => Verdict::NeedsConfirmation {
            tier,
            reason: MODEL_FLAGGED_MESSAGE.to_string(),
        },
        RiskTier::Safe => Verdict::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RiskClassifier {
        RiskClassifier::default()
    }

    #[test]
    fn test_classify_dangerous() {
        let c = classifier();
        assert_eq!(c.classify("mkfs.ext4 /dev/sda"), RiskTier::Dangerous);
        assert_eq!(c.classify("rm -rf /"), RiskTier::Dangerous);
        assert_eq!(c.classify("dd if=/dev/zero of=/dev/sda"), RiskTier::Dangerous);
        assert_eq!(c.classify(":(){ :|:& };:"), RiskTier::Dangerous);
    }

    #[test]
    fn test_classify_risky() {
        let c = classifier();
        assert_eq!(c.classify("chmod -R 755 ./project"), RiskTier::Risky);
        assert_eq!(c.classify("rm -r build"), RiskTier::Risky);
        assert_eq!(c.classify("curl https://example.com"), RiskTier::Risky);
    }

    #[test]
    fn test_classify_safe() {
        let c = classifier();
        assert_eq!(c.classify("ls -la"), RiskTier::Safe);
        assert_eq!(c.classify("git status"), RiskTier::Safe);
        assert_eq!(c.classify(""), RiskTier::Safe);
        assert_eq!(c.classify("   "), RiskTier::Safe);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify("MKFS /dev/sdb1"), RiskTier::Dangerous);
        assert_eq!(c.classify("CHMOD -r 700 dir"), RiskTier::Risky);
    }

    #[test]
    fn test_dangerous_wins_over_risky() {
        let c = classifier();
        // "rm -rf /" is dangerous, "rm -rf" alone is risky
        assert_eq!(c.classify("rm -rf / --no-preserve-root"), RiskTier::Dangerous);
    }

    #[test]
    fn test_privilege_prefix_is_at_least_risky() {
        let c = classifier();
        assert_eq!(c.classify("sudo ls"), RiskTier::Risky);
        assert_eq!(c.classify("SUDO apt update"), RiskTier::Risky);
        assert_eq!(c.classify("sudo mkfs /dev/sdb"), RiskTier::Dangerous);
        // only the leading word counts as escalation
        assert_eq!(c.classify("echo sudo"), RiskTier::Safe);
    }

    #[test]
    fn test_custom_tables() {
        let config = SafetyConfig {
            privilege_prefix: "doas".to_string(),
            dangerous: vec![RiskPattern::new("terraform destroy")],
            risky: vec![RiskPattern::new("git push")],
            ..SafetyConfig::default()
        };
        let c = RiskClassifier::new(&config);
        assert_eq!(c.classify("terraform destroy -auto-approve"), RiskTier::Dangerous);
        assert_eq!(c.classify("git push origin main"), RiskTier::Risky);
        assert_eq!(c.classify("mkfs /dev/sda"), RiskTier::Safe);
        assert_eq!(c.classify("doas ls"), RiskTier::Risky);
        assert_eq!(c.classify("sudo ls"), RiskTier::Safe);
    }

    #[test]
    fn test_explain() {
        let c = classifier();
        assert_eq!(c.explain("ls -la"), None);

        let wipe = c.explain("rm -rf /").unwrap();
        assert!(wipe.contains("every file"));

        let recursive = c.explain("rm -rf ./target").unwrap();
        assert!(recursive.contains("recursively deletes"));

        assert_eq!(c.explain("sudo ls").unwrap(), PRIVILEGE_MESSAGE);
        assert_eq!(c.explain("mv /opt/app /srv").unwrap(), GENERIC_RISK_MESSAGE);
    }

    #[test]
    fn test_describe() {
        let c = classifier();
        let preview = c.describe("/bin/ls -la");
        assert_eq!(preview.command, "ls");
        assert_eq!(preview.description, "List directory contents");
        assert_eq!(preview.tier, RiskTier::Safe);

        assert_eq!(c.describe("cd").description, "Change directory to home");
        assert_eq!(c.describe("htop").description, "Execute htop");
        assert_eq!(c.describe("").description, "Empty command");
    }

    #[test]
    fn test_assess_consults_both_gates() {
        let c = classifier();

        let clear = CommandResult::new("list", "ls -la", "lists files", true);
        assert_eq!(assess(&clear, &c), Verdict::Clear);

        let model_flagged = CommandResult::new("list", "ls -la", "lists files", false);
        assert!(matches!(
            assess(&model_flagged, &c),
            Verdict::NeedsConfirmation { tier: RiskTier::Safe, .. }
        ));

        let model_trusting = CommandResult::new("wipe", "mkfs.ext4 /dev/sda", "formats", true);
        assert!(matches!(assess(&model_trusting, &c), Verdict::Blocked { .. }));

        let risky = CommandResult::new("clean", "rm -r build", "removes build", true);
        assert!(matches!(
            assess(&risky, &c),
            Verdict::NeedsConfirmation { tier: RiskTier::Risky, .. }
        ));
    }

    #[test]
    fn test_assess_failure_runs_nothing() {
        let c = classifier();
        let failed = CommandResult::failure("huh", "Error parsing command: expected value");
        let verdict = assess(&failed, &c);
        assert!(!verdict.may_run());
        assert_eq!(
            verdict,
            Verdict::NothingToRun {
                reason: "Error parsing command: expected value".to_string()
            }
        );
    }
}
