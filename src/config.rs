use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const APP_NAME: &str = "promptshell";
const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            request_timeout_secs: 60,
        }
    }
}

/// One entry of a risk table: a literal, case-insensitive substring and an
/// optional message shown when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPattern {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RiskPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: None,
        }
    }

    pub fn with_reason(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub privilege_prefix: String,
    pub command_timeout_secs: u64,
    pub dangerous: Vec<RiskPattern>,
    pub risky: Vec<RiskPattern>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            privilege_prefix: "sudo".to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            dangerous: default_dangerous_patterns(),
            risky: default_risky_patterns(),
        }
    }
}

fn default_dangerous_patterns() -> Vec<RiskPattern> {
    const WIPES_SYSTEM: &str = "This command deletes every file on the system.";
    const FORK_BOMB: &str = "This is a fork bomb; it exhausts the process table and hangs the machine.";
    const PIPE_TO_SHELL: &str = "This command runs downloaded content directly in a shell.";

    vec![
        RiskPattern::with_reason("rm -rf /", WIPES_SYSTEM),
        RiskPattern::with_reason("rm -rf /*", WIPES_SYSTEM),
        RiskPattern::with_reason("rm -rf ~", "This command deletes your entire home directory."),
        RiskPattern::with_reason("mkfs", "This command formats a disk, destroying all data on it."),
        RiskPattern::with_reason("dd if=", "This command can overwrite raw disk data. Check every parameter."),
        RiskPattern::with_reason(":(){:|:&};:", FORK_BOMB),
        RiskPattern::with_reason(":(){ :|:& };:", FORK_BOMB),
        RiskPattern::with_reason(
            "chmod -R 777 /",
            "This command makes every file world-writable, which is a security risk.",
        ),
        RiskPattern::with_reason("> /dev/sd", "This command writes directly to a block device."),
        RiskPattern::with_reason("curl | sh", PIPE_TO_SHELL),
        RiskPattern::with_reason("wget | sh", PIPE_TO_SHELL),
        RiskPattern::with_reason("| bash", PIPE_TO_SHELL),
        RiskPattern::with_reason("| sudo sh", PIPE_TO_SHELL),
    ]
}

fn default_risky_patterns() -> Vec<RiskPattern> {
    const RECURSIVE_DELETE: &str =
        "This command recursively deletes files. Make sure the path is the one you mean.";

    vec![
        RiskPattern::with_reason("rm -rf", RECURSIVE_DELETE),
        RiskPattern::with_reason("rm -r", RECURSIVE_DELETE),
        RiskPattern::new("sudo rm"),
        RiskPattern::with_reason("chmod -R", "This command changes permissions recursively."),
        RiskPattern::with_reason("chown -R", "This command changes ownership recursively."),
        RiskPattern::new("mv /"),
        RiskPattern::with_reason("shutdown", "This command powers off the machine."),
        RiskPattern::with_reason("reboot", "This command restarts the machine."),
        RiskPattern::with_reason("kill", "This command terminates running processes."),
        RiskPattern::with_reason("curl http", "This command downloads content from the network."),
        RiskPattern::with_reason("wget http", "This command downloads content from the network."),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Run commands the gate clears without asking first.
    pub auto_run: bool,
    pub history_limit: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            auto_run: false,
            history_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub max_output_lines: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_output_lines: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub safety: SafetyConfig,
    pub behavior: BehaviorConfig,
    pub output: OutputConfig,
}

pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}

pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn get_history_path() -> PathBuf {
    get_data_dir().join("history.json")
}

pub fn get_alias_path() -> PathBuf {
    get_data_dir().join("aliases.json")
}

pub fn load_config() -> Config {
    let path = get_config_path();
    if !path.exists() {
        return Config::default();
    }

    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("ignoring config at {}: {}", path.display(), e);
            Config::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
