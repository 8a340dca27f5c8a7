use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DocumentError;

/// The document being viewed: its path, the working text, and the text last
/// known to be on disk.
#[derive(Debug, Clone, Default)]
pub struct Document {
    path: Option<PathBuf>,
    raw_text: String,
    saved_text: String,
    changed_on_disk: bool,
}

/// Outcome of an external change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalChange {
    /// The buffer was clean and now holds the new disk text
    Applied,
    /// Local edits are unsaved, the disk text was not taken
    Ignored,
    /// The disk text equals what we already have
    Unchanged,
}

impl Document {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_text(path: Option<PathBuf>, text: String) -> Self {
        Self {
            path,
            saved_text: text.clone(),
            raw_text: text,
            changed_on_disk: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let metadata = fs::metadata(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(DocumentError::NotAFile(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(Some(path.to_path_buf()), text))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn is_dirty(&self) -> bool {
        self.raw_text != self.saved_text
    }

    pub fn changed_on_disk(&self) -> bool {
        self.changed_on_disk
    }

    /// Replace the working text. Returns `false` if nothing changed.
    pub fn edit(&mut self, text: String) -> bool {
        if text == self.raw_text {
            return false;
        }
        self.raw_text = text;
        true
    }

    /// Write the working text to disk. On failure the document stays dirty.
    pub fn save(&mut self) -> Result<(), DocumentError> {
        let path = self.path.as_ref().ok_or(DocumentError::NoPath)?;
        fs::write(path, &self.raw_text).map_err(|source| DocumentError::Write {
            path: path.clone(),
            source,
        })?;
        self.saved_text = self.raw_text.clone();
        self.changed_on_disk = false;
        Ok(())
    }

    /// Unsaved edits win over the disk: a dirty buffer keeps its text and is
    /// flagged so the next save is known to overwrite someone else's change.
    pub fn apply_external_change(&mut self, text: String) -> ExternalChange {
        if text == self.saved_text && !self.changed_on_disk {
            return ExternalChange::Unchanged;
        }
        if self.is_dirty() {
            if text == self.raw_text {
                // Someone else wrote exactly our edits.
                self.saved_text = text;
                self.changed_on_disk = false;
                return ExternalChange::Applied;
            }
            self.changed_on_disk = true;
            return ExternalChange::Ignored;
        }
        self.raw_text = text.clone();
        self.saved_text = text;
        self.changed_on_disk = false;
        ExternalChange::Applied
    }

    /// Key under which this document's scroll offset is persisted.
    pub fn scroll_key(&self) -> Option<String> {
        self.path
            .as_ref()
            .map(|p| format!("scroll-{}", p.display()))
    }

    pub fn file_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn word_count(&self) -> usize {
        self.raw_text
            .split_whitespace()
            .filter(|word| word.chars().any(|c| c.is_alphanumeric()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_marks_dirty() {
        let mut doc = Document::from_text(None, "# Title".into());
        assert!(!doc.is_dirty());
        assert!(doc.edit("# Title!".into()));
        assert!(doc.is_dirty());
        assert!(!doc.edit("# Title!".into()));
        assert!(doc.edit("# Title".into()));
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "hello").unwrap();

        let mut doc = Document::load(&path).unwrap();
        assert_eq!(doc.raw_text(), "hello");
        doc.edit("hello world".into());
        doc.save().unwrap();

        assert!(!doc.is_dirty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn test_load_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Document::load(dir.path()),
            Err(DocumentError::NotAFile(_))
        ));
    }

    #[test]
    fn test_load_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Document::load(&dir.path().join("nope.md")),
            Err(DocumentError::Read { .. })
        ));
    }

    #[test]
    fn test_failed_save_keeps_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("note.md");
        let mut doc = Document::from_text(Some(path), String::new());
        doc.edit("unsaved".into());

        assert!(matches!(doc.save(), Err(DocumentError::Write { .. })));
        assert!(doc.is_dirty());
    }

    #[test]
    fn test_save_without_path() {
        let mut doc = Document::empty();
        assert!(matches!(doc.save(), Err(DocumentError::NoPath)));
    }

    #[test]
    fn test_external_change_on_clean_document() {
        let mut doc = Document::from_text(Some("/doc.md".into()), "one".into());
        assert_eq!(doc.apply_external_change("two".into()), ExternalChange::Applied);
        assert_eq!(doc.raw_text(), "two");
        assert!(!doc.is_dirty());
        assert_eq!(doc.apply_external_change("two".into()), ExternalChange::Unchanged);
    }

    #[test]
    fn test_external_change_while_dirty_is_ignored() {
        let mut doc = Document::from_text(Some("/doc.md".into()), "one".into());
        doc.edit("local".into());

        assert_eq!(doc.apply_external_change("remote".into()), ExternalChange::Ignored);
        assert_eq!(doc.raw_text(), "local");
        assert!(doc.is_dirty());
        assert!(doc.changed_on_disk());
    }

    #[test]
    fn test_scroll_key() {
        let doc = Document::from_text(Some("/doc.md".into()), String::new());
        assert_eq!(doc.scroll_key().as_deref(), Some("scroll-/doc.md"));
        assert_eq!(Document::empty().scroll_key(), None);
    }

    #[test]
    fn test_word_count_skips_markup() {
        let doc = Document::from_text(None, "# Title\n\n- one two --- **three**".into());
        assert_eq!(doc.word_count(), 4);
    }
}
