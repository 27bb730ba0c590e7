use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use {fd_lock::RwLock, tracing::warn};

use crate::{
    error::{Error, Result},
    message::Message,
};

/// Append-only JSONL conversation storage with file locking, one file per
/// contact.
pub struct ConversationStore {
    pub base_dir: PathBuf,
}

impl ConversationStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Store rooted at `<data_dir>/conversations`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("conversations"))
    }

    /// Sanitize a contact id for use as a filename.
    pub fn key_to_filename(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.jsonl", Self::key_to_filename(key)))
    }

    /// Append one message as a single line.
    pub async fn append(&self, key: &str, message: &Message) -> Result<()> {
        let path = self.path_for(key);
        let line = serde_json::to_string(message)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock
                .write()
                .map_err(|e| Error::lock_failed(e.to_string()))?;
            writeln!(*guard, "{line}")?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    /// Read the whole conversation log, oldest first.
    pub async fn read(&self, key: &str) -> Result<Vec<Message>> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || read_log(&path)).await?
    }

    /// Read the last `n` messages.
    pub async fn read_last_n(&self, key: &str, n: usize) -> Result<Vec<Message>> {
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || -> Result<Vec<Message>> {
            let mut all = read_log(&path)?;
            let start = all.len().saturating_sub(n);
            Ok(all.split_off(start))
        })
        .await?
    }

    /// Whether a log file exists for `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Replace the entire conversation log with `messages`.
    pub async fn replace_history(&self, key: &str, messages: Vec<Message>) -> Result<()> {
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock
                .write()
                .map_err(|e| Error::lock_failed(e.to_string()))?;
            for msg in &messages {
                let line = serde_json::to_string(msg)?;
                writeln!(*guard, "{line}")?;
            }
            Ok(())
        })
        .await??;

        Ok(())
    }
}

fn read_log(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut messages = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(msg) => messages.push(msg),
            Err(e) => {
                warn!(path = %path.display(), line = idx + 1, "skipping malformed JSONL line: {e}");
            },
        }
    }
    Ok(messages)
}
