//! High-score persistence
//!
//! The game keeps exactly one value between runs: the best score ever
//! reached. Stores implement [`HighScoreStore`]; the session reads the value
//! once at construction and writes it back whenever it is beaten. A store
//! that cannot be read behaves as if it held 0, and a failed write is never
//! surfaced to the player.

use anyhow::{Context, Result};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

/// A key-value style store holding the single persisted high score
pub trait HighScoreStore {
    /// Read the stored high score
    fn load(&self) -> Result<u32>;

    /// Write a new high score
    fn save(&mut self, value: u32) -> Result<()>;
}

/// High score stored as a JSON integer in a file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HighScoreStore for FileStore {
    /// Read the high score, treating a missing file as 0
    fn load(&self) -> Result<u32> {
        if !self.path.exists() {
            return Ok(0);
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read high score from {:?}", self.path))?;
        let value: u32 = serde_json::from_str(contents.trim())
            .with_context(|| format!("Malformed high score in {:?}", self.path))?;

        Ok(value)
    }

    fn save(&mut self, value: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        let json = serde_json::to_string(&value).context("Failed to serialize high score")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write high score to {:?}", self.path))?;

        Ok(())
    }
}

/// In-memory store, shared between clones
///
/// Backs tests; cloning hands out another handle onto the same value, so a
/// test can watch what a session writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Rc<Cell<u32>>,
}

impl MemoryStore {
    pub fn new(initial: u32) -> Self {
        Self {
            value: Rc::new(Cell::new(initial)),
        }
    }

    /// Current stored value
    pub fn value(&self) -> u32 {
        self.value.get()
    }
}

impl HighScoreStore for MemoryStore {
    fn load(&self) -> Result<u32> {
        Ok(self.value.get())
    }

    fn save(&mut self, value: u32) -> Result<()> {
        self.value.set(value);
        Ok(())
    }
}
