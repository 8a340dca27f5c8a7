//! Watches the open document for changes made by other programs.
//!
//! The parent directory is watched rather than the file itself, since many
//! editors save by writing a new file and renaming it over the old one.
//! Change events only arm a short settle timer; the file is read once the
//! writes have stopped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::timer::Debounce;

pub const SETTLE: Duration = Duration::from_millis(100);

pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    path: PathBuf,
    settle: Debounce,
}

impl DocumentWatcher {
    pub fn start(path: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        log::debug!("watching {}", path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
            path: path.to_path_buf(),
            settle: Debounce::new(SETTLE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending notifications; a relevant one (re)arms the settle timer.
    pub fn poll(&mut self, now: Instant) {
        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(event) if concerns(&event, &self.path) => self.settle.arm(now),
                Ok(_) => {}
                Err(e) => log::warn!("file watcher error: {}", e),
            }
        }
    }

    /// The new file contents once changes have settled.
    pub fn tick(&mut self, now: Instant) -> Option<io::Result<String>> {
        if !self.settle.fire(now) {
            return None;
        }
        Some(fs::read_to_string(&self.path))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.settle.deadline()
    }
}

/// Whether `event` is a content change to `path`.
fn concerns(event: &Event, path: &Path) -> bool {
    let content_change = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    );
    content_change && event.paths.iter().any(|p| same_file(p, path))
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.file_name(), b.file_name()) {
        (Some(x), Some(y)) if x == y => {
            let canon = |p: &Path| p.parent().and_then(|d| d.canonicalize().ok());
            canon(a).is_some() && canon(a) == canon(b)
        }
        _ => false,
    }
}
