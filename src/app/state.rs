use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};

use super::keys::{view_mode_shortcut, KeySequence, NavCommand};
use super::mode::{Focus, ViewMode};
use super::outline::OutlineState;
use super::preview::PreviewPane;
use crate::config::Config;
use crate::document::{Document, ExternalChange};
use crate::editor::{process_key, Editor};
use crate::error::DocumentError;
use crate::markdown::{LazyHighlighter, Palette};
use crate::pipeline::{ContentPipeline, PipelineEvent};
use crate::scroll::viewport::JUMP_OFFSET;
use crate::scroll::{Pane, ScrollPane, ScrollPersistence, ScrollStore, ScrollSynchronizer, ViewportTracker};
use crate::timer::earliest;
use crate::watch::DocumentWatcher;
use crate::worker::ServiceHost;

const STATUS_TTL: Duration = Duration::from_secs(5);
const MOUSE_SCROLL_ROWS: isize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    shown_at: Instant,
}

pub struct App {
    pub config: Config,
    pub document: Document,
    pub pipeline: ContentPipeline,
    pub editor: Editor,
    pub preview: PreviewPane,
    pub outline: OutlineState,
    pub tracker: ViewportTracker,
    pub sync: ScrollSynchronizer,
    pub persistence: ScrollPersistence,
    pub view_mode: ViewMode,
    pub focus: Focus,
    pub keys: KeySequence,
    pub status: Option<StatusMessage>,
    pub palette: Palette,
    pub should_quit: bool,
    pub preview_area: Rect,
    pub editor_area: Rect,
    pub outline_area: Rect,
    services: Box<dyn ServiceHost>,
    store: Box<dyn ScrollStore>,
    highlighter: LazyHighlighter,
    watcher: Option<DocumentWatcher>,
    /// Scroll offsets last seen for (editor, preview)
    observed: (usize, usize),
    layout_changed: bool,
    /// Saved preview offset waiting for a layout it can land in
    pending_restore: Option<usize>,
}

impl App {
    pub fn new(config: Config, services: Box<dyn ServiceHost>, store: Box<dyn ScrollStore>) -> Self {
        let timing = config.timing;
        let view_mode = config.default_view_mode;
        let focus = if view_mode == ViewMode::Edit {
            Focus::Editor
        } else {
            Focus::Preview
        };
        let mut sync = ScrollSynchronizer::new(timing.sync_release(), timing.split_settle());
        sync.set_enabled(view_mode.syncs_scroll(), Instant::now());

        Self {
            document: Document::empty(),
            pipeline: ContentPipeline::new(),
            editor: Editor::default(),
            preview: PreviewPane::default(),
            outline: OutlineState::new(config.outline_collapsed),
            tracker: ViewportTracker::new(timing.heading_debounce()),
            sync,
            persistence: ScrollPersistence::new(timing.scroll_save(), timing.scroll_restore()),
            view_mode,
            focus,
            keys: KeySequence::new(timing.key_sequence()),
            status: None,
            palette: Palette::default(),
            should_quit: false,
            preview_area: Rect::default(),
            editor_area: Rect::default(),
            outline_area: Rect::default(),
            services,
            store,
            highlighter: LazyHighlighter::new(&config.syntax_theme),
            watcher: None,
            observed: (0, 0),
            layout_changed: false,
            pending_restore: None,
            config,
        }
    }

    pub fn open(&mut self, path: &Path, now: Instant) -> Result<(), DocumentError> {
        let document = Document::load(path)?;
        log::info!("opened {}", path.display());
        self.install(document, now);
        Ok(())
    }

    /// Show `text` as an unsaved, pathless document.
    #[cfg(test)]
    pub fn open_text(&mut self, text: String, now: Instant) {
        self.install(Document::from_text(None, text), now);
    }

    fn install(&mut self, document: Document, now: Instant) {
        self.persistence
            .document_loaded(document.scroll_key(), self.store.as_mut(), now);
        self.editor.set_text(document.raw_text());
        self.editor.scroll_to(0);
        self.preview.scroll_to(0);
        self.observed = (self.editor.scroll_top(), self.preview.scroll_top());
        self.pending_restore = None;
        self.tracker.reset();
        self.outline.list_state.select(None);
        self.keys.reset();

        self.pipeline
            .submit(document.raw_text(), document.path(), self.services.as_mut());
        self.document = document;
        self.restart_watcher();
    }

    /// Drop the document. Pending scroll state is flushed first.
    pub fn close(&mut self, now: Instant) {
        if self.document.is_dirty() {
            self.set_status("unsaved edits, save first", StatusLevel::Warning, now);
            return;
        }
        self.persistence.document_loaded(None, self.store.as_mut(), now);
        self.pipeline.clear();
        self.document = Document::empty();
        self.editor.set_text("");
        self.preview.scroll_to(0);
        self.pending_restore = None;
        self.tracker.reset();
        self.outline.list_state.select(None);
        self.watcher = None;
    }

    fn restart_watcher(&mut self) {
        // Dropping the old watcher stops it before the new one starts.
        self.watcher = None;
        if !self.config.live_reload {
            return;
        }
        let Some(path) = self.document.path() else {
            return;
        };
        match DocumentWatcher::start(path) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => log::warn!("live reload disabled for {}: {}", path.display(), e),
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel, now: Instant) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            shown_at: now,
        });
    }

    pub fn set_view_mode(&mut self, mode: ViewMode, now: Instant) {
        if mode == self.view_mode {
            return;
        }
        log::debug!("view mode {:?} -> {:?}", self.view_mode, mode);
        self.view_mode = mode;
        self.focus = self.focus.settle(mode);
        self.keys.reset();
        self.sync.set_enabled(mode.syncs_scroll(), now);
    }

    pub fn save(&mut self, now: Instant) {
        if !self.document.is_dirty() {
            return;
        }
        match self.document.save() {
            Ok(()) => {
                let name = self.document.file_name().unwrap_or_default();
                log::info!("saved {}", name);
                self.set_status(format!("saved {}", name), StatusLevel::Info, now);
            }
            Err(e) => {
                log::error!("{}", e);
                self.set_status(e.to_string(), StatusLevel::Error, now);
            }
        }
    }

    /// The editor text changed.
    fn on_edit(&mut self) {
        if self.document.edit(self.editor.text()) {
            self.pipeline.submit(
                self.document.raw_text(),
                self.document.path(),
                self.services.as_mut(),
            );
        }
    }

    /// Another program rewrote the open file.
    pub fn on_document_changed(&mut self, text: String, now: Instant) {
        match self.document.apply_external_change(text) {
            ExternalChange::Applied => {
                log::info!("reloaded after external change");
                self.editor.set_text(self.document.raw_text());
                self.pipeline.submit(
                    self.document.raw_text(),
                    self.document.path(),
                    self.services.as_mut(),
                );
            }
            ExternalChange::Ignored => {
                log::warn!("external change ignored, buffer has unsaved edits");
                self.set_status(
                    "file changed on disk (unsaved edits kept)",
                    StatusLevel::Warning,
                    now,
                );
            }
            ExternalChange::Unchanged => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if let Some(mode) = view_mode_shortcut(&key) {
            self.set_view_mode(mode, now);
        } else if ctrl && key.code == KeyCode::Char('q') {
            self.should_quit = true;
        } else if ctrl && key.code == KeyCode::Char('s') {
            self.save(now);
        } else if ctrl && key.code == KeyCode::Char('w') {
            self.close(now);
        } else if ctrl && key.code == KeyCode::Char('o') {
            self.outline.toggle_collapsed();
            if self.outline.collapsed && self.focus == Focus::Outline {
                self.focus = Focus::Preview.settle(self.view_mode);
            }
        } else if key.code == KeyCode::Tab {
            self.focus = self.focus.cycle(self.view_mode, !self.outline.collapsed);
            self.keys.reset();
        } else {
            match self.focus {
                Focus::Editor => self.handle_editor_key(key),
                Focus::Preview => self.handle_preview_key(key, now),
                Focus::Outline => self.handle_outline_key(key),
            }
        }

        self.detect_scrolls(now);
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            if self.view_mode.mounts_preview() {
                self.focus = Focus::Preview;
            }
            return;
        }
        if self.editor.apply(process_key(key)) {
            self.on_edit();
        }
    }

    fn handle_preview_key(&mut self, key: KeyEvent, now: Instant) {
        let half_page = (self.preview.view_height() / 2).max(1) as isize;
        let page = self.preview.view_height().max(1) as isize;
        let command = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Char(c) if self.config.vim_navigation => self.keys.feed(c, now),
            KeyCode::Down => Some(NavCommand::ScrollBy(1)),
            KeyCode::Up => Some(NavCommand::ScrollBy(-1)),
            KeyCode::PageDown => Some(NavCommand::ScrollBy(page)),
            KeyCode::PageUp => Some(NavCommand::ScrollBy(-page)),
            KeyCode::Home => Some(NavCommand::Top),
            KeyCode::End => Some(NavCommand::Bottom),
            _ => None,
        };
        match command {
            Some(NavCommand::ScrollBy(rows)) => self.preview.scroll_by(rows),
            Some(NavCommand::HalfPageDown) => self.preview.scroll_by(half_page),
            Some(NavCommand::HalfPageUp) => self.preview.scroll_by(-half_page),
            Some(NavCommand::Top) => self.preview.scroll_to(0),
            Some(NavCommand::Bottom) => self.preview.scroll_to_bottom(),
            None => {}
        }
    }

    fn handle_outline_key(&mut self, key: KeyEvent) {
        let count = self.outline.visible(self.pipeline.anchors()).len();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.outline.next(count),
            KeyCode::Char('k') | KeyCode::Up => self.outline.previous(count),
            KeyCode::Char('g') | KeyCode::Home => self.outline.first(count),
            KeyCode::Char('G') | KeyCode::End => self.outline.last(count),
            KeyCode::Char(c @ '1'..='6') => {
                let level = c as u8 - b'0';
                self.outline.toggle_level(level);
            }
            KeyCode::Enter => {
                if let Some(id) = self.outline.selected_id(self.pipeline.anchors()) {
                    self.jump_to(&id);
                }
            }
            KeyCode::Esc => self.focus = Focus::Preview.settle(self.view_mode),
            _ => {}
        }
    }

    /// Scroll so the heading `id` sits just below the top of the visible pane.
    pub fn jump_to(&mut self, id: &str) {
        if self.view_mode.mounts_preview() {
            if let Some(row) = self.preview.layout.row_of(id) {
                self.preview.scroll_to(row.saturating_sub(JUMP_OFFSET));
                self.tracker.set_active(id);
            }
        } else if let Some(line) = self.pipeline.heading_line(id) {
            self.editor.scroll_to(line.saturating_sub(JUMP_OFFSET));
            self.tracker.set_active(id);
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let delta = match mouse.kind {
            MouseEventKind::ScrollDown => MOUSE_SCROLL_ROWS,
            MouseEventKind::ScrollUp => -MOUSE_SCROLL_ROWS,
            _ => return,
        };
        let at = Position::new(mouse.column, mouse.row);
        if self.view_mode.mounts_preview() && self.preview_area.contains(at) {
            self.preview.scroll_by(delta);
        } else if self.view_mode.mounts_editor() && self.editor_area.contains(at) {
            self.editor.scroll_by(delta);
        }
        self.detect_scrolls(now);
    }

    /// Lay the preview out for its current area. Called while drawing.
    pub fn layout_preview(&mut self, width: u16, height: u16) {
        self.preview.set_view_height(height as usize);
        if self.preview.refresh(&self.pipeline, width, &self.palette) {
            self.layout_changed = true;
        }
    }

    /// One turn of housekeeping: collect service replies and fire due timers.
    pub fn tick(&mut self, now: Instant) {
        while let Some(reply) = self.services.poll() {
            match self.pipeline.handle(reply, self.services.as_mut()) {
                PipelineEvent::Rendered { .. } => {
                    if self.pipeline.needs_highlighting() {
                        self.highlighter.ensure();
                    }
                    self.clamp_outline();
                }
                PipelineEvent::ConversionFailed(e) => {
                    self.set_status(format!("render failed: {}", e), StatusLevel::Warning, now)
                }
                PipelineEvent::AssetsFailed(e) => {
                    self.set_status(format!("images unavailable: {}", e), StatusLevel::Warning, now)
                }
                PipelineEvent::AssetsResolved | PipelineEvent::Stale => {}
            }
        }

        self.highlighter.poll();
        if let Some(highlighter) = self.highlighter.get() {
            self.pipeline.apply_highlighting(highlighter);
        }

        if let Some(watcher) = self.watcher.as_mut() {
            watcher.poll(now);
            match watcher.tick(now) {
                Some(Ok(text)) => self.on_document_changed(text, now),
                Some(Err(e)) => log::warn!("could not re-read {}: {}", watcher.path().display(), e),
                None => {}
            }
        }

        self.keys.tick(now);

        if std::mem::take(&mut self.layout_changed) {
            self.tracker.content_changed(now);
        }
        if self.tracker.tick(now, &self.preview.layout.anchors) {
            self.update_active();
        }

        self.sync.tick(now, &mut self.editor, &mut self.preview);

        if let Some(offset) = self.persistence.tick(now, self.store.as_mut()) {
            self.pending_restore = Some(offset as usize);
        }
        if self.preview_is_current() {
            if let Some(offset) = self.pending_restore.take() {
                log::debug!("restoring scroll offset {}", offset);
                self.preview.scroll_to(offset);
            }
        }

        if self
            .status
            .as_ref()
            .is_some_and(|s| now.duration_since(s.shown_at) >= STATUS_TTL)
        {
            self.status = None;
        }

        self.detect_scrolls(now);
    }

    /// Turn offset changes since the last look into scroll events. The
    /// focused pane reports first, so the echo of whatever it drove arrives
    /// second and meets the lock.
    fn detect_scrolls(&mut self, now: Instant) {
        let order = if self.focus == Focus::Editor {
            [Pane::Editor, Pane::Preview]
        } else {
            [Pane::Preview, Pane::Editor]
        };
        for pane in order {
            let (current, seen) = match pane {
                Pane::Editor => (self.editor.scroll_top(), &mut self.observed.0),
                Pane::Preview => (self.preview.scroll_top(), &mut self.observed.1),
            };
            if current != *seen {
                *seen = current;
                self.on_pane_scrolled(pane, now);
            }
        }
    }

    fn on_pane_scrolled(&mut self, pane: Pane, now: Instant) {
        self.sync.on_scroll(pane, now, &mut self.editor, &mut self.preview);
        if pane == Pane::Preview {
            self.persistence
                .on_scroll(self.preview.metrics().scroll_top, now);
            self.update_active();
        }
    }

    fn preview_is_current(&self) -> bool {
        self.pipeline.tree().is_some() && self.preview.is_built_from(self.pipeline.revision())
    }

    fn update_active(&mut self) {
        self.tracker
            .observe(self.preview.scroll_top(), self.preview.view_height());
        if self.focus != Focus::Outline {
            if let Some(id) = self.tracker.active() {
                self.outline.select_id(self.pipeline.anchors(), id);
            }
        }
    }

    fn clamp_outline(&mut self) {
        let count = self.outline.visible(self.pipeline.anchors()).len();
        self.outline.clamp(count);
    }

    /// Reading progress through the preview, in percent.
    pub fn progress(&self) -> u16 {
        (self.preview.metrics().fraction() * 100.0).round() as u16
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.tracker.next_deadline(),
            self.sync.next_deadline(),
            self.persistence.next_deadline(),
            self.keys.deadline(),
            self.watcher.as_ref().and_then(DocumentWatcher::next_deadline),
        ])
    }

    /// Whether a background reply may be waiting.
    pub fn is_busy(&self) -> bool {
        self.pipeline.is_converting()
            || self.pipeline.assets().summary().2 > 0
            || self.pipeline.needs_highlighting()
    }

    /// Write what is pending before exit. Unsaved edits stay unsaved.
    pub fn shutdown(&mut self) {
        self.persistence.flush(self.store.as_mut());
    }
}
