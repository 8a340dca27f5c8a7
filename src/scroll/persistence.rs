//! Remembering where the reader was in each document.
//!
//! Offsets are saved a little after scrolling stops and restored a little
//! after a document is opened, once its layout exists. Storage is best
//! effort: failures are logged and otherwise ignored.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::StoreError;
use crate::timer::{earliest, Debounce};

pub const STORE_FILE: &str = "scroll_offsets.bin";

/// Key/value storage for scroll offsets.
pub trait ScrollStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;
    fn set(&mut self, key: &str, offset: u64) -> Result<(), StoreError>;
}

/// All offsets in one bincode file, rewritten on every change.
pub struct FileScrollStore {
    path: PathBuf,
    offsets: HashMap<String, u64>,
}

impl FileScrollStore {
    /// A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let offsets = match fs::File::open(path) {
            Ok(file) => bincode::deserialize_from(BufReader::new(file))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            offsets,
        })
    }

    /// Start from nothing, e.g. after the file turned out to be unreadable.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offsets: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&self.path)?;
        bincode::serialize_into(BufWriter::new(file), &self.offsets)?;
        Ok(())
    }
}

impl ScrollStore for FileScrollStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.offsets.get(key).copied())
    }

    fn set(&mut self, key: &str, offset: u64) -> Result<(), StoreError> {
        if self.offsets.get(key) == Some(&offset) {
            return Ok(());
        }
        self.offsets.insert(key.to_string(), offset);
        self.persist()
    }
}

pub struct ScrollPersistence {
    key: Option<String>,
    pending_offset: Option<u64>,
    save: Debounce,
    restore: Debounce,
    restore_offset: Option<u64>,
}

impl ScrollPersistence {
    pub fn new(save_after: Duration, restore_after: Duration) -> Self {
        Self {
            key: None,
            pending_offset: None,
            save: Debounce::new(save_after),
            restore: Debounce::new(restore_after),
            restore_offset: None,
        }
    }

    /// A document was opened. A save still pending for the previous one is
    /// written first, then the stored offset for `key` is scheduled for
    /// restore.
    pub fn document_loaded(&mut self, key: Option<String>, store: &mut dyn ScrollStore, now: Instant) {
        self.flush(store);
        self.restore.cancel();
        self.restore_offset = None;
        self.key = key;

        let Some(key) = self.key.as_deref() else {
            return;
        };
        match store.get(key) {
            Ok(Some(offset)) => {
                self.restore_offset = Some(offset);
                self.restore.arm(now);
            }
            Ok(None) => {}
            Err(e) => log::warn!("could not read scroll position for {}: {}", key, e),
        }
    }

    /// The preview scrolled to `offset` rows.
    pub fn on_scroll(&mut self, offset: f64, now: Instant) {
        if self.key.is_none() {
            return;
        }
        self.pending_offset = Some(offset.max(0.0).floor() as u64);
        self.save.arm(now);
    }

    /// Writes a due save. Returns the offset to restore when that is due.
    pub fn tick(&mut self, now: Instant, store: &mut dyn ScrollStore) -> Option<u64> {
        if self.save.fire(now) {
            self.write(store);
        }
        if self.restore.fire(now) {
            return self.restore_offset.take();
        }
        None
    }

    /// Write a pending save immediately, e.g. before quitting.
    pub fn flush(&mut self, store: &mut dyn ScrollStore) {
        if self.save.is_armed() {
            self.save.cancel();
            self.write(store);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.save.deadline(), self.restore.deadline()])
    }

    fn write(&mut self, store: &mut dyn ScrollStore) {
        let (Some(key), Some(offset)) = (self.key.as_deref(), self.pending_offset.take()) else {
            return;
        };
        if let Err(e) = store.set(key, offset) {
            log::warn!("could not save scroll position for {}: {}", key, e);
        }
    }
}
