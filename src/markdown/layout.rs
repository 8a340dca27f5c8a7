//! Lays a rendered tree out as terminal rows for the preview pane.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::frontmatter::{FrontmatterEntry, FrontmatterValue};
use super::tree::{plain_text, Block, Inline, ListItem, RenderedTree};
use crate::assets::{is_network_url, AssetState, AssetTable};

#[derive(Debug, Clone)]
pub struct Palette {
    pub heading_colors: [Color; 6],
    pub code_color: Color,
    pub link_color: Color,
    pub blockquote_color: Color,
    pub list_marker_color: Color,
    pub frontmatter_color: Color,
    pub rule_color: Color,
    pub image_color: Color,
    pub missing_color: Color,
    pub muted: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            heading_colors: [
                Color::Blue,
                Color::Green,
                Color::Yellow,
                Color::Magenta,
                Color::Cyan,
                Color::Gray,
            ],
            code_color: Color::Green,
            link_color: Color::Cyan,
            blockquote_color: Color::Cyan,
            list_marker_color: Color::Yellow,
            frontmatter_color: Color::DarkGray,
            rule_color: Color::DarkGray,
            image_color: Color::Magenta,
            missing_color: Color::Red,
            muted: Color::DarkGray,
        }
    }
}

/// Row at which an anchored heading starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRow {
    pub id: String,
    pub row: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub lines: Vec<Line<'static>>,
    pub anchors: Vec<AnchorRow>,
}

impl Layout {
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.anchors.iter().find(|a| a.id == id).map(|a| a.row)
    }

    fn push(&mut self, line: Line<'static>) {
        self.lines.push(line);
    }

    fn blank(&mut self) {
        self.lines.push(Line::default());
    }

    /// Append `other`, prefixing its first row and every following row.
    fn append(&mut self, other: Layout, first: &[Span<'static>], rest: &[Span<'static>]) {
        let offset = self.lines.len();
        self.anchors.extend(other.anchors.into_iter().map(|a| AnchorRow {
            id: a.id,
            row: a.row + offset,
        }));
        for (i, line) in other.lines.into_iter().enumerate() {
            let prefix = if i == 0 { first } else { rest };
            if prefix.is_empty() {
                self.lines.push(line);
                continue;
            }
            let mut spans = prefix.to_vec();
            spans.extend(line.spans);
            self.lines.push(Line::from(spans));
        }
    }
}

pub fn layout(tree: &RenderedTree, assets: &AssetTable, width: u16, palette: &Palette) -> Layout {
    let renderer = Renderer { assets, palette };
    renderer.blocks(&tree.blocks, (width as usize).max(1), true)
}

struct Renderer<'a> {
    assets: &'a AssetTable,
    palette: &'a Palette,
}

impl Renderer<'_> {
    fn blocks(&self, blocks: &[Block], width: usize, spaced: bool) -> Layout {
        let mut out = Layout::default();
        for (i, block) in blocks.iter().enumerate() {
            if spaced && i > 0 {
                out.blank();
            }
            out.append(self.block(block, width), &[], &[]);
        }
        out
    }

    fn block(&self, block: &Block, width: usize) -> Layout {
        let mut out = Layout::default();
        match block {
            Block::Frontmatter(entries) => self.frontmatter(entries, width, &mut out),
            Block::Heading {
                level, id, content, ..
            } => {
                if let Some(id) = id {
                    out.anchors.push(AnchorRow {
                        id: id.clone(),
                        row: 0,
                    });
                }
                let color = self.palette.heading_colors[(*level as usize).clamp(1, 6) - 1];
                let style = Style::default().fg(color).add_modifier(Modifier::BOLD);
                let mut spans = vec![Span::styled(
                    format!("{} ", "#".repeat(*level as usize)),
                    Style::default().fg(color),
                )];
                self.inlines(content, style, &mut spans);
                for line in wrap(spans, width) {
                    out.push(line);
                }
            }
            Block::Paragraph(content) => {
                let mut spans = Vec::new();
                self.inlines(content, Style::default(), &mut spans);
                for line in wrap(spans, width) {
                    out.push(line);
                }
            }
            Block::CodeBlock {
                lang,
                code,
                highlighted,
            } => {
                let bar = Span::styled("│ ", Style::default().fg(self.palette.muted));
                if let Some(lang) = lang {
                    out.push(Line::from(vec![
                        Span::styled("╭ ", Style::default().fg(self.palette.muted)),
                        Span::styled(lang.clone(), Style::default().fg(self.palette.muted)),
                    ]));
                }
                match highlighted {
                    Some(rows) => {
                        for row in rows {
                            let mut spans = vec![bar.clone()];
                            spans.extend(row.iter().cloned());
                            out.push(Line::from(spans));
                        }
                    }
                    None => {
                        for row in code.lines() {
                            out.push(Line::from(vec![
                                bar.clone(),
                                Span::styled(
                                    row.to_string(),
                                    Style::default().fg(self.palette.code_color),
                                ),
                            ]));
                        }
                    }
                }
            }
            Block::Quote(inner) => {
                let bar = [Span::styled("▎ ", Style::default().fg(self.palette.blockquote_color))];
                let inner = self.blocks(inner, width.saturating_sub(2).max(1), true);
                out.append(inner, &bar, &bar);
            }
            Block::List { start, items } => {
                for (i, item) in items.iter().enumerate() {
                    let marker = match start {
                        Some(n) => format!("{}. ", n + i as u64),
                        None => "• ".to_string(),
                    };
                    self.list_item(item, marker, width, &mut out);
                }
            }
            Block::Table { header, rows } => self.table(header, rows, width, &mut out),
            Block::Rule => out.push(Line::from(Span::styled(
                "─".repeat(width),
                Style::default().fg(self.palette.rule_color),
            ))),
            Block::Html(html) => {
                for row in html.lines() {
                    out.push(Line::from(Span::styled(
                        row.to_string(),
                        Style::default().fg(self.palette.muted),
                    )));
                }
            }
            Block::FootnoteDefinition { label, blocks } => {
                let marker = format!("[^{}] ", label);
                let indent = " ".repeat(marker.width());
                let inner = self.blocks(blocks, width.saturating_sub(marker.width()).max(1), false);
                out.append(
                    inner,
                    &[Span::styled(marker, Style::default().fg(self.palette.muted))],
                    &[Span::raw(indent)],
                );
            }
        }
        out
    }

    fn list_item(&self, item: &ListItem, marker: String, width: usize, out: &mut Layout) {
        let mut first = vec![Span::styled(
            marker.clone(),
            Style::default().fg(self.palette.list_marker_color),
        )];
        let mut marker_width = marker.width();
        if let Some(checked) = item.task {
            let check = if checked { "[x] " } else { "[ ] " };
            marker_width += check.width();
            first.push(Span::styled(
                check,
                Style::default().fg(self.palette.list_marker_color),
            ));
        }
        let rest = [Span::raw(" ".repeat(marker_width))];
        let mut inner = self.blocks(&item.blocks, width.saturating_sub(marker_width).max(1), false);
        if inner.lines.is_empty() {
            inner.blank();
        }
        out.append(inner, &first, &rest);
    }

    fn frontmatter(&self, entries: &[FrontmatterEntry], width: usize, out: &mut Layout) {
        let key_style = Style::default()
            .fg(self.palette.frontmatter_color)
            .add_modifier(Modifier::BOLD);
        for entry in entries {
            let mut spans = vec![Span::styled(format!("{}: ", entry.key), key_style)];
            match &entry.value {
                FrontmatterValue::Text(text) => spans.push(Span::raw(text.clone())),
                FrontmatterValue::Tags(tags) => {
                    for (i, tag) in tags.iter().enumerate() {
                        if i > 0 {
                            spans.push(Span::raw(" "));
                        }
                        spans.push(Span::styled(
                            format!("#{}", tag),
                            Style::default().fg(self.palette.link_color),
                        ));
                    }
                }
            }
            for line in wrap(spans, width) {
                out.push(line);
            }
        }
        out.push(Line::from(Span::styled(
            "┄".repeat(width),
            Style::default().fg(self.palette.frontmatter_color),
        )));
    }

    fn table(&self, header: &[Vec<Inline>], rows: &[Vec<Vec<Inline>>], width: usize, out: &mut Layout) {
        let columns = header.len().max(rows.iter().map(Vec::len).max().unwrap_or(0));
        if columns == 0 {
            return;
        }
        let text_rows: Vec<Vec<String>> = std::iter::once(header)
            .chain(rows.iter().map(Vec::as_slice))
            .map(|row| row.iter().map(|cell| plain_text(cell)).collect())
            .collect();

        let separator_width = 3 * (columns - 1);
        let cap = (width.saturating_sub(separator_width) / columns).max(3);
        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                text_rows
                    .iter()
                    .filter_map(|row| row.get(c))
                    .map(|cell| cell.width())
                    .max()
                    .unwrap_or(0)
                    .clamp(1, cap)
            })
            .collect();

        let border = Style::default().fg(self.palette.muted);
        for (r, row) in text_rows.iter().enumerate() {
            let cell_style = if r == 0 {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let mut spans = Vec::new();
            for (c, cell_width) in widths.iter().enumerate() {
                if c > 0 {
                    spans.push(Span::styled(" │ ", border));
                }
                let cell = row.get(c).map(String::as_str).unwrap_or("");
                spans.push(Span::styled(pad(cell, *cell_width), cell_style));
            }
            out.push(Line::from(spans));
            if r == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                out.push(Line::from(Span::styled(rule.join("─┼─"), border)));
            }
        }
    }

    fn inlines(&self, inlines: &[Inline], style: Style, out: &mut Vec<Span<'static>>) {
        for inline in inlines {
            match inline {
                Inline::Text(text) => out.push(Span::styled(text.clone(), style)),
                Inline::Code(code) => out.push(Span::styled(
                    code.clone(),
                    style.fg(self.palette.code_color),
                )),
                Inline::Emphasis(inner) => {
                    self.inlines(inner, style.add_modifier(Modifier::ITALIC), out)
                }
                Inline::Strong(inner) => self.inlines(inner, style.add_modifier(Modifier::BOLD), out),
                Inline::Strikethrough(inner) => {
                    self.inlines(inner, style.add_modifier(Modifier::CROSSED_OUT), out)
                }
                Inline::Link { content, .. } => self.inlines(
                    content,
                    style
                        .fg(self.palette.link_color)
                        .add_modifier(Modifier::UNDERLINED),
                    out,
                ),
                Inline::Image { alt, token } => out.extend(self.image(alt, token)),
                Inline::SoftBreak => out.push(Span::styled(" ", style)),
                Inline::HardBreak => out.push(Span::raw("\n")),
                Inline::FootnoteRef(label) => out.push(Span::styled(
                    format!("[^{}]", label),
                    Style::default().fg(self.palette.muted),
                )),
            }
        }
    }

    /// Images are shown as a placeholder carrying their resolution state.
    fn image(&self, alt: &str, token: &str) -> Vec<Span<'static>> {
        let label = if alt.is_empty() { "image" } else { alt };
        let head = Span::styled(
            format!("[img: {}]", label),
            Style::default().fg(self.palette.image_color),
        );
        let muted = Style::default().fg(self.palette.muted);
        let detail = if is_network_url(token) {
            Span::styled(format!(" {}", token), muted)
        } else {
            match self.assets.get(token) {
                Some(reference) => match (reference.state, &reference.resolved_uri) {
                    (AssetState::Found, Some(uri)) => Span::styled(format!(" {}", uri), muted),
                    (AssetState::Pending, _) => Span::styled(" (resolving)", muted),
                    _ => Span::styled(
                        format!(" (missing: {})", token),
                        Style::default().fg(self.palette.missing_color),
                    ),
                },
                None => Span::styled(format!(" {}", token), muted),
            }
        };
        vec![head, detail]
    }
}

fn pad(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// Greedy word wrap over styled spans. A `"\n"` span forces a break.
pub fn wrap(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    fn finish(lines: &mut Vec<Line<'static>>, current: &mut Vec<Span<'static>>, used: &mut usize) {
        while current
            .last()
            .is_some_and(|s| s.content.chars().all(char::is_whitespace))
        {
            current.pop();
        }
        lines.push(Line::from(std::mem::take(current)));
        *used = 0;
    }

    for span in spans {
        if span.content == "\n" {
            finish(&mut lines, &mut current, &mut used);
            continue;
        }
        for piece in split_words(&span.content) {
            let piece_width = piece.width();
            let is_space = piece.chars().all(char::is_whitespace);

            if is_space {
                if used == 0 {
                    continue;
                }
                if used + piece_width > width {
                    finish(&mut lines, &mut current, &mut used);
                    continue;
                }
                current.push(Span::styled(piece.to_string(), span.style));
                used += piece_width;
                continue;
            }

            if used + piece_width > width && used > 0 {
                finish(&mut lines, &mut current, &mut used);
            }
            if piece_width <= width {
                current.push(Span::styled(piece.to_string(), span.style));
                used += piece_width;
                continue;
            }
            // Longer than a whole row: break inside the word.
            let mut chunk = String::new();
            for c in piece.chars() {
                let w = c.width().unwrap_or(0);
                if used + w > width {
                    current.push(Span::styled(std::mem::take(&mut chunk), span.style));
                    finish(&mut lines, &mut current, &mut used);
                }
                chunk.push(c);
                used += w;
            }
            if !chunk.is_empty() {
                current.push(Span::styled(chunk, span.style));
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        finish(&mut lines, &mut current, &mut used);
    }
    lines
}

/// Split into alternating runs of whitespace and non-whitespace.
fn split_words(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                pieces.push(&text[start..i]);
                start = i;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::convert::parse_markdown;
    use crate::markdown::stamp_anchors;
    use std::collections::HashMap;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render(text: &str, width: u16) -> Layout {
        let mut tree = parse_markdown(text);
        stamp_anchors(&mut tree);
        layout(&tree, &AssetTable::default(), width, &Palette::default())
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        let lines = wrap(vec![Span::raw("the quick brown fox")], 10);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap(vec![Span::raw("abcdefghij")], 4);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_hard_break_and_empty() {
        let lines = wrap(vec![Span::raw("a"), Span::raw("\n"), Span::raw("b")], 10);
        assert_eq!(lines.len(), 2);
        assert_eq!(wrap(Vec::new(), 10).len(), 1);
    }

    #[test]
    fn test_anchor_rows_follow_content() {
        let layout = render("# A\n\npara\n\n## B\n\n> ### C\n", 40);
        assert_eq!(layout.row_of("a"), Some(0));
        assert_eq!(layout.row_of("b"), Some(4));
        assert_eq!(layout.row_of("c"), Some(6));
        assert_eq!(line_text(&layout.lines[6]), "▎ ### C");
    }

    #[test]
    fn test_anchor_rows_shift_with_wrapping() {
        let layout = render("# A\n\none two three four five six\n\n# B\n", 10);
        let b = layout.row_of("b").unwrap();
        assert!(b > 3);
        assert_eq!(line_text(&layout.lines[b]), "# B");
    }

    #[test]
    fn test_list_markers() {
        let layout = render("- [x] done\n- plain\n\n3. three\n", 40);
        let texts: Vec<String> = layout.lines.iter().map(line_text).collect();
        assert_eq!(texts.len(), 4);
        assert!(texts[0].starts_with("• [x] "));
        assert!(texts[0].ends_with("done"));
        assert_eq!(texts[1], "• plain");
        assert_eq!(texts[3], "3. three");
    }

    #[test]
    fn test_image_placeholders_show_state() {
        let mut tree = parse_markdown("![a](a.png) ![b](b.png) ![c](https://x/c.png) ![d](d.png)");
        stamp_anchors(&mut tree);
        let mut assets = AssetTable::default();
        assets.begin(&["a.png".into(), "b.png".into(), "d.png".into()]);
        let mut answer = HashMap::new();
        answer.insert("a.png".to_string(), Some("file:///n/a.png".to_string()));
        answer.insert("b.png".to_string(), None);
        assets.apply(answer);

        let out = layout(&tree, &assets, 200, &Palette::default());
        let text = line_text(&out.lines[0]);
        assert!(text.contains("[img: a] file:///n/a.png"));
        assert!(text.contains("[img: b] (missing: b.png)"));
        assert!(text.contains("[img: c] https://x/c.png"));
        assert!(text.contains("[img: d] (missing: d.png)"));
    }

    #[test]
    fn test_table_columns() {
        let layout = render("| a | bb |\n|---|---|\n| 1 | 2 |\n", 40);
        let texts: Vec<String> = layout.lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["a │ bb", "──┼───", "1 │ 2 "]);
    }
}
