use ratatui::style::{Color, Modifier, Style as RatatuiStyle};
use ratatui::text::Span;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style, ThemeSet};
use syntect::parsing::SyntaxSet;

use super::tree::{Block, RenderedTree};

const DEFAULT_THEME: &str = "base16-ocean.dark";

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    content_hash: u64,
    lang: String,
}

fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

const MAX_CACHE_ENTRIES: usize = 100;

pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    cache: RefCell<HashMap<CacheKey, Vec<Vec<Span<'static>>>>>,
}

impl Highlighter {
    pub fn new(theme_name: &str) -> Self {
        let theme_set = ThemeSet::load_defaults();
        let valid_theme = if theme_set.themes.contains_key(theme_name) {
            theme_name.to_string()
        } else {
            log::warn!("unknown syntax theme {:?}, using {}", theme_name, DEFAULT_THEME);
            DEFAULT_THEME.to_string()
        };
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set,
            theme_name: valid_theme,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn highlight_block(&self, content: &str, lang: &str) -> Vec<Vec<Span<'static>>> {
        let key = CacheKey {
            content_hash: hash_content(content),
            lang: lang.to_string(),
        };

        if let Some(cached) = self.cache.borrow().get(&key) {
            return cached.clone();
        }

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let Some(theme) = self.theme_set.themes.get(&self.theme_name) else {
            return content
                .lines()
                .map(|line| vec![Span::raw(line.to_string())])
                .collect();
        };
        let mut highlighter = HighlightLines::new(syntax, theme);

        let result: Vec<Vec<Span<'static>>> = content
            .lines()
            .map(|line| match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => ranges
                    .into_iter()
                    .map(|(style, text)| style_to_span(text, style))
                    .collect(),
                Err(_) => vec![Span::raw(line.to_string())],
            })
            .collect();

        let mut cache = self.cache.borrow_mut();
        if cache.len() >= MAX_CACHE_ENTRIES {
            // Simple eviction: clear half the cache
            let keys_to_remove: Vec<_> = cache.keys().take(MAX_CACHE_ENTRIES / 2).cloned().collect();
            for k in keys_to_remove {
                cache.remove(&k);
            }
        }
        cache.insert(key, result.clone());

        result
    }

    /// Fill in highlighted lines for every fenced block with a language.
    /// Touches nothing but the `highlighted` field.
    pub fn highlight_tree(&self, tree: &mut RenderedTree) {
        for block in tree.code_blocks_mut() {
            if let Block::CodeBlock {
                lang: Some(lang),
                code,
                highlighted,
            } = block
            {
                if highlighted.is_none() {
                    *highlighted = Some(self.highlight_block(code, lang));
                }
            }
        }
    }
}

fn style_to_span(text: &str, style: Style) -> Span<'static> {
    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);

    let mut ratatui_style = RatatuiStyle::default().fg(fg);

    if style.font_style.contains(FontStyle::BOLD) {
        ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        ratatui_style = ratatui_style.add_modifier(Modifier::UNDERLINED);
    }

    Span::styled(text.to_string(), ratatui_style)
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

/// Syntect's syntax and theme sets cost tens of megabytes, so they are only
/// loaded, on a helper thread, once a document actually contains code.
pub struct LazyHighlighter {
    theme: String,
    highlighter: Option<Highlighter>,
    loading: bool,
    sender: Sender<Highlighter>,
    receiver: Receiver<Highlighter>,
}

impl LazyHighlighter {
    pub fn new(theme: &str) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            theme: theme.to_string(),
            highlighter: None,
            loading: false,
            sender,
            receiver,
        }
    }

    pub fn ensure(&mut self) {
        if self.highlighter.is_some() || self.loading {
            return;
        }
        self.loading = true;
        let theme = self.theme.clone();
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name("highlighter-load".into())
            .spawn(move || {
                let _ = sender.send(Highlighter::new(&theme));
            });
        if let Err(e) = spawned {
            log::warn!("could not load syntax highlighter: {}", e);
        }
    }

    /// Returns `true` when the highlighter became available during this call.
    pub fn poll(&mut self) -> bool {
        if let Ok(highlighter) = self.receiver.try_recv() {
            self.highlighter = Some(highlighter);
            self.loading = false;
            return true;
        }
        false
    }

    pub fn get(&self) -> Option<&Highlighter> {
        self.highlighter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::anchors::{extract, stamp_anchors};
    use crate::markdown::convert::parse_markdown;

    #[test]
    fn test_highlight_block_one_row_per_line() {
        let highlighter = Highlighter::default();
        let lines = highlighter.highlight_block("fn main() {\n    let x = 1;\n}\n", "rust");
        assert_eq!(lines.len(), 3);
        let first: String = lines[0].iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(first, "fn main() {");
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        let highlighter = Highlighter::new("no-such-theme");
        assert_eq!(highlighter.theme_name, DEFAULT_THEME);
    }

    #[test]
    fn test_highlight_tree_leaves_anchors_alone() {
        let mut tree = parse_markdown("# Code\n\n```rust\nlet a = 1;\n```\n\n```\nplain\n```\n");
        stamp_anchors(&mut tree);
        let before = extract(&tree);

        Highlighter::default().highlight_tree(&mut tree);

        assert_eq!(extract(&tree), before);
        let highlighted: Vec<bool> = tree
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::CodeBlock { highlighted, .. } => Some(highlighted.is_some()),
                _ => None,
            })
            .collect();
        assert_eq!(highlighted, vec![true, false]);
    }
}
