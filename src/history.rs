use crate::error::Result;
use crate::types::HistoryEntry;
use chrono::Local;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Append-only command history backed by a JSON array on disk. Holds at
/// most `limit` entries; the oldest go first.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>, limit: usize) -> Self {
        let path = path.into();
        let mut entries = load_entries(&path);
        let limit = limit.max(1);
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Self {
            path,
            limit,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, nlp: &str, command: &str, success: bool) -> Result<()> {
        self.entries.push(HistoryEntry {
            timestamp: Local::now().to_rfc3339(),
            nlp: nlp.to_string(),
            command: command.to_string(),
            success,
        });
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.save()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last_command(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .map(|e| e.command.as_str())
            .find(|c| !c.is_empty())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn load_entries(path: &Path) -> Vec<HistoryEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("ignoring unreadable history at {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
