use crate::{error::Result, models::HistoryEntry};
use serde::Serialize;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Append-only search history kept as a JSON array in a single file.
///
/// Every append rewrites the whole file. Appends within this process are
/// serialized; several processes sharing one file are not supported.
#[derive(Debug)]
pub struct SearchHistoryService {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SearchHistoryService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in insertion order. A missing or unreadable file is empty history.
    pub async fn load(&self) -> Vec<HistoryEntry> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read search history {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        if contents.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Search history {} is corrupted, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Entries newest first, optionally limited.
    pub async fn recent(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let mut entries = self.load().await;
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }

    pub async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await;
        entries.push(entry);

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        entries.serialize(&mut serializer)?;

        // Write next to the target and rename so readers never see a partial file
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &buffer).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(
            "Saved search history ({} entries) to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
