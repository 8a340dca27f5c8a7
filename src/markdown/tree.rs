use ratatui::text::Span;

use super::frontmatter::FrontmatterEntry;

/// Structured form of a document, rebuilt from scratch on every conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedTree {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Frontmatter(Vec<FrontmatterEntry>),
    Heading {
        level: u8,
        /// Anchor id, either written in the source (`{#id}`) or stamped later
        id: Option<String>,
        content: Vec<Inline>,
        /// Zero-based line in the raw text
        source_line: usize,
    },
    Paragraph(Vec<Inline>),
    CodeBlock {
        lang: Option<String>,
        code: String,
        /// Filled in by the highlighter, never by conversion
        highlighted: Option<Vec<Vec<Span<'static>>>>,
    },
    Quote(Vec<Block>),
    List {
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Table {
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Rule,
    Html(String),
    FootnoteDefinition {
        label: String,
        blocks: Vec<Block>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListItem {
    pub task: Option<bool>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { dest: String, content: Vec<Inline> },
    /// `token` is the destination exactly as written in the document
    Image { alt: String, token: String },
    SoftBreak,
    HardBreak,
    FootnoteRef(String),
}

impl RenderedTree {
    /// Headings in document order, descending into quotes, lists and footnotes.
    pub fn headings(&self) -> Vec<&Block> {
        let mut out = Vec::new();
        collect_headings(&self.blocks, &mut out);
        out
    }

    pub fn headings_mut(&mut self) -> Vec<&mut Block> {
        let mut out = Vec::new();
        collect_headings_mut(&mut self.blocks, &mut out);
        out
    }

    /// Image destinations in document order, duplicates included.
    pub fn image_tokens(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for block in &self.blocks {
            block_images(block, &mut out);
        }
        out
    }

    /// Whether any fenced block with a language still lacks highlighting.
    pub fn needs_highlighting(&self) -> bool {
        has_unhighlighted(&self.blocks)
    }

    pub fn code_blocks_mut(&mut self) -> Vec<&mut Block> {
        let mut out = Vec::new();
        collect_code_mut(&mut self.blocks, &mut out);
        out
    }
}

fn collect_headings<'a>(blocks: &'a [Block], out: &mut Vec<&'a Block>) {
    for block in blocks {
        match block {
            Block::Heading { .. } => out.push(block),
            Block::Quote(inner) | Block::FootnoteDefinition { blocks: inner, .. } => {
                collect_headings(inner, out)
            }
            Block::List { items, .. } => {
                for item in items {
                    collect_headings(&item.blocks, out);
                }
            }
            _ => {}
        }
    }
}

fn collect_headings_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut Block>) {
    for block in blocks {
        if matches!(block, Block::Heading { .. }) {
            out.push(block);
            continue;
        }
        match block {
            Block::Quote(inner) | Block::FootnoteDefinition { blocks: inner, .. } => {
                collect_headings_mut(inner, out)
            }
            Block::List { items, .. } => {
                for item in items {
                    collect_headings_mut(&mut item.blocks, out);
                }
            }
            _ => {}
        }
    }
}

fn collect_code_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut Block>) {
    for block in blocks {
        if matches!(block, Block::CodeBlock { .. }) {
            out.push(block);
            continue;
        }
        match block {
            Block::Quote(inner) | Block::FootnoteDefinition { blocks: inner, .. } => {
                collect_code_mut(inner, out)
            }
            Block::List { items, .. } => {
                for item in items {
                    collect_code_mut(&mut item.blocks, out);
                }
            }
            _ => {}
        }
    }
}

fn has_unhighlighted(blocks: &[Block]) -> bool {
    blocks.iter().any(|block| match block {
        Block::CodeBlock {
            lang: Some(_),
            highlighted: None,
            ..
        } => true,
        Block::Quote(inner) | Block::FootnoteDefinition { blocks: inner, .. } => {
            has_unhighlighted(inner)
        }
        Block::List { items, .. } => items.iter().any(|item| has_unhighlighted(&item.blocks)),
        _ => false,
    })
}

fn block_images<'a>(block: &'a Block, out: &mut Vec<&'a str>) {
    match block {
        Block::Heading { content, .. } | Block::Paragraph(content) => inline_images(content, out),
        Block::Quote(inner) | Block::FootnoteDefinition { blocks: inner, .. } => {
            for b in inner {
                block_images(b, out);
            }
        }
        Block::List { items, .. } => {
            for item in items {
                for b in &item.blocks {
                    block_images(b, out);
                }
            }
        }
        Block::Table { header, rows } => {
            for cell in header.iter().chain(rows.iter().flatten()) {
                inline_images(cell, out);
            }
        }
        _ => {}
    }
}

fn inline_images<'a>(inlines: &'a [Inline], out: &mut Vec<&'a str>) {
    for inline in inlines {
        match inline {
            Inline::Image { token, .. } => out.push(token),
            Inline::Emphasis(inner)
            | Inline::Strong(inner)
            | Inline::Strikethrough(inner)
            | Inline::Link { content: inner, .. } => inline_images(inner, out),
            _ => {}
        }
    }
}

/// Visible text of a run of inlines, as a reader would see it.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain(inlines, &mut out);
    out
}

fn push_plain(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Code(t) => out.push_str(t),
            Inline::Emphasis(inner)
            | Inline::Strong(inner)
            | Inline::Strikethrough(inner)
            | Inline::Link { content: inner, .. } => push_plain(inner, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::FootnoteRef(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(text: &str) -> Block {
        Block::Heading {
            level: 2,
            id: None,
            content: vec![Inline::Text(text.into())],
            source_line: 0,
        }
    }

    #[test]
    fn test_headings_nested_in_quotes_and_lists() {
        let tree = RenderedTree {
            blocks: vec![
                heading("top"),
                Block::Quote(vec![heading("quoted")]),
                Block::List {
                    start: None,
                    items: vec![ListItem {
                        task: None,
                        blocks: vec![heading("listed")],
                    }],
                },
            ],
        };
        assert_eq!(tree.headings().len(), 3);
    }

    #[test]
    fn test_image_tokens_in_order_with_duplicates() {
        let tree = RenderedTree {
            blocks: vec![
                Block::Paragraph(vec![
                    Inline::Image { alt: "x".into(), token: "img1.png".into() },
                    Inline::Strong(vec![Inline::Image { alt: "y".into(), token: "img2.png".into() }]),
                ]),
                Block::Table {
                    header: vec![vec![Inline::Image { alt: "z".into(), token: "img1.png".into() }]],
                    rows: vec![],
                },
            ],
        };
        assert_eq!(tree.image_tokens(), vec!["img1.png", "img2.png", "img1.png"]);
    }

    #[test]
    fn test_plain_text() {
        let inlines = vec![
            Inline::Text("Hello ".into()),
            Inline::Emphasis(vec![Inline::Text("big".into())]),
            Inline::Code(" world".into()),
            Inline::FootnoteRef("1".into()),
        ];
        assert_eq!(plain_text(&inlines), "Hello big world");
    }
}
