use crate::markdown::{layout, Layout, Palette};
use crate::pipeline::ContentPipeline;
use crate::scroll::{ScrollMetrics, ScrollPane};

/// Laid-out rendered document plus its scroll position.
#[derive(Debug, Default)]
pub struct PreviewPane {
    pub layout: Layout,
    scroll_top: usize,
    view_height: usize,
    width: u16,
    /// Pipeline revision the layout was built from
    built_from: Option<u64>,
}

impl PreviewPane {
    /// Rebuild the layout if the content or the width changed. Returns `true`
    /// when it did.
    pub fn refresh(&mut self, pipeline: &ContentPipeline, width: u16, palette: &Palette) -> bool {
        let revision = pipeline.revision();
        if self.built_from == Some(revision) && self.width == width {
            return false;
        }
        self.layout = match pipeline.tree() {
            Some(tree) => layout(tree, pipeline.assets(), width, palette),
            None => Layout::default(),
        };
        self.width = width;
        self.built_from = Some(revision);
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        true
    }

    /// Whether the current layout reflects pipeline revision `revision`.
    pub fn is_built_from(&self, revision: u64) -> bool {
        self.built_from == Some(revision)
    }

    pub fn set_view_height(&mut self, height: usize) {
        self.view_height = height;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    pub fn view_height(&self) -> usize {
        self.view_height
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll_to(self.scroll_top.saturating_add_signed(delta));
    }

    pub fn scroll_to(&mut self, row: usize) {
        self.scroll_top = row.min(self.max_scroll());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll();
    }

    pub fn max_scroll(&self) -> usize {
        self.layout.height().saturating_sub(self.view_height)
    }
}

impl ScrollPane for PreviewPane {
    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics::new(self.scroll_top, self.layout.height(), self.view_height)
    }

    fn scroll_to_fraction(&mut self, fraction: f64) {
        let offset = self.metrics().offset_for_fraction(fraction).round() as usize;
        self.scroll_to(offset);
    }
}
