use crate::error::{Result, ShellError};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// User-defined shortcuts from a phrase to a literal command, stored as a
/// JSON object.
#[derive(Debug)]
pub struct AliasStore {
    path: PathBuf,
    aliases: BTreeMap<String, String>,
}

impl AliasStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let aliases = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable aliases at {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, aliases }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Case-insensitive exact match on the trimmed input.
    pub fn lookup(&self, input: &str) -> Option<&str> {
        let wanted = input.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.aliases
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, command)| command.as_str())
    }

    pub fn set(&mut self, name: &str, command: &str) -> Result<()> {
        let name = name.trim();
        let command = command.trim();
        if name.is_empty() || command.is_empty() {
            return Err(ShellError::Config(
                "alias name and command must not be empty".to_string(),
            ));
        }

        self.remove_matching(name);
        self.aliases.insert(name.to_string(), command.to_string());
        self.save()
    }

    /// Returns whether an alias was removed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let removed = self.remove_matching(name.trim());
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn remove_matching(&mut self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        let before = self.aliases.len();
        self.aliases.retain(|k, _| k.to_lowercase() != wanted);
        self.aliases.len() != before
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.aliases)?)?;
        Ok(())
    }
}
