use std::mem;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use super::frontmatter;
use super::tree::{Block, Inline, ListItem, RenderedTree};
use crate::error::ServiceError;

/// Text to tree conversion, run on the conversion worker.
pub trait Converter: Send + 'static {
    fn convert(&self, text: &str) -> Result<RenderedTree, ServiceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn convert(&self, text: &str) -> Result<RenderedTree, ServiceError> {
        Ok(parse_markdown(text))
    }
}

/// `![[name.png]]` embeds.
static WIKILINK_EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[(.*?)\]\]").expect("valid regex"));

/// `![alt](name with spaces.png)`; stays on one line.
static SPACED_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\]\n]*)\]\(([^<>\s"'()]+(?:[ \t]+[^<>\s"'()]+)+)\)"#).expect("valid regex")
});

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Rewrite embeds that CommonMark would not read as images.
/// Never changes the number of lines.
pub fn preprocess(body: &str) -> String {
    let embedded = WIKILINK_EMBED.replace_all(body, "![$1](<$1>)");
    SPACED_IMAGE
        .replace_all(&embedded, "![$1](<$2>)")
        .into_owned()
}

pub fn parse_markdown(content: &str) -> RenderedTree {
    let (entries, body_line) = frontmatter::parse(content);
    let body_start: usize = content
        .split_inclusive('\n')
        .take(body_line)
        .map(str::len)
        .sum();
    let body = preprocess(&content[body_start.min(content.len())..]);

    let mut builder = TreeBuilder::new();
    if let Some(entries) = entries.filter(|e| !e.is_empty()) {
        builder.push_block(Block::Frontmatter(entries));
    }

    let mut line = body_line;
    let mut consumed = 0;
    for (event, range) in Parser::new_ext(&body, parser_options()).into_offset_iter() {
        if range.start > consumed {
            line += body[consumed..range.start].matches('\n').count();
            consumed = range.start;
        }
        builder.handle(event, line);
    }
    builder.finish()
}

enum FrameKind {
    Root,
    Paragraph,
    Heading {
        level: u8,
        id: Option<String>,
        source_line: usize,
    },
    Quote,
    List {
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Item {
        task: Option<bool>,
    },
    CodeBlock {
        lang: Option<String>,
        code: String,
    },
    HtmlBlock(String),
    Table {
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    TableRow(Vec<Vec<Inline>>),
    TableCell,
    Emphasis,
    Strong,
    Strikethrough,
    Link(String),
    Image(String),
    Footnote(String),
    /// Constructs without their own node; children move to the parent
    Transparent,
}

struct Frame {
    kind: FrameKind,
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
            inlines: Vec::new(),
        }
    }

    /// Loose inlines (tight list items) become a paragraph before the next block.
    fn flush_inlines(&mut self) {
        if !self.inlines.is_empty() {
            let inlines = mem::take(&mut self.inlines);
            self.blocks.push(Block::Paragraph(inlines));
        }
    }

    fn push_block(&mut self, block: Block) {
        self.flush_inlines();
        self.blocks.push(block);
    }

    fn push_inline(&mut self, inline: Inline) {
        if let (Inline::Text(new), Some(Inline::Text(last))) = (&inline, self.inlines.last_mut()) {
            last.push_str(new);
            return;
        }
        self.inlines.push(inline);
    }

    fn into_blocks(self) -> Vec<Block> {
        settle(self.blocks, self.inlines)
    }
}

fn settle(mut blocks: Vec<Block>, inlines: Vec<Inline>) -> Vec<Block> {
    if !inlines.is_empty() {
        blocks.push(Block::Paragraph(inlines));
    }
    blocks
}

struct TreeBuilder {
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::new(FrameKind::Root)],
        }
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push_block(&mut self, block: Block) {
        self.top().push_block(block);
    }

    fn handle(&mut self, event: Event<'_>, line: usize) {
        match event {
            Event::Start(tag) => self.start(tag, line),
            Event::End(end) => self.end(end),
            Event::Text(text) => {
                let top = self.top();
                match &mut top.kind {
                    FrameKind::CodeBlock { code, .. } => code.push_str(&text),
                    FrameKind::HtmlBlock(html) => html.push_str(&text),
                    _ => top.push_inline(Inline::Text(text.into_string())),
                }
            }
            Event::Code(code) => self.top().push_inline(Inline::Code(code.into_string())),
            Event::Html(html) => {
                let top = self.top();
                match &mut top.kind {
                    FrameKind::HtmlBlock(buf) => buf.push_str(&html),
                    _ => top.push_block(Block::Html(html.into_string())),
                }
            }
            Event::InlineHtml(html) => self.top().push_inline(Inline::Text(html.into_string())),
            Event::FootnoteReference(label) => {
                self.top().push_inline(Inline::FootnoteRef(label.into_string()))
            }
            Event::SoftBreak => self.top().push_inline(Inline::SoftBreak),
            Event::HardBreak => self.top().push_inline(Inline::HardBreak),
            Event::Rule => self.push_block(Block::Rule),
            Event::TaskListMarker(checked) => {
                // Loose items carry the marker inside their paragraph.
                let item = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find_map(|frame| match &mut frame.kind {
                        FrameKind::Item { task } => Some(task),
                        _ => None,
                    });
                if let Some(task) = item {
                    *task = Some(checked);
                }
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                self.top().push_inline(Inline::Code(math.into_string()))
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>, line: usize) {
        let kind = match tag {
            Tag::Paragraph => FrameKind::Paragraph,
            Tag::Heading { level, id, .. } => FrameKind::Heading {
                level: level as u8,
                id: id.map(|id| id.into_string()),
                source_line: line,
            },
            Tag::BlockQuote(_) => FrameKind::Quote,
            Tag::CodeBlock(kind) => FrameKind::CodeBlock {
                lang: match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                },
                code: String::new(),
            },
            Tag::HtmlBlock => FrameKind::HtmlBlock(String::new()),
            Tag::List(start) => FrameKind::List {
                start,
                items: Vec::new(),
            },
            Tag::Item => FrameKind::Item { task: None },
            Tag::FootnoteDefinition(label) => FrameKind::Footnote(label.into_string()),
            Tag::Table(_) => FrameKind::Table {
                header: Vec::new(),
                rows: Vec::new(),
            },
            Tag::TableHead | Tag::TableRow => FrameKind::TableRow(Vec::new()),
            Tag::TableCell => FrameKind::TableCell,
            Tag::Emphasis => FrameKind::Emphasis,
            Tag::Strong => FrameKind::Strong,
            Tag::Strikethrough => FrameKind::Strikethrough,
            Tag::Link { dest_url, .. } => FrameKind::Link(dest_url.into_string()),
            Tag::Image { dest_url, .. } => FrameKind::Image(dest_url.into_string()),
            _ => FrameKind::Transparent,
        };
        self.stack.push(Frame::new(kind));
    }

    fn end(&mut self, end: TagEnd) {
        // The root frame is never popped.
        if self.stack.len() < 2 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let parent = self.top();

        match frame.kind {
            FrameKind::Paragraph => parent.push_block(Block::Paragraph(frame.inlines)),
            FrameKind::Heading {
                level,
                id,
                source_line,
            } => parent.push_block(Block::Heading {
                level,
                id,
                content: frame.inlines,
                source_line,
            }),
            FrameKind::Quote => {
                parent.push_block(Block::Quote(settle(frame.blocks, frame.inlines)))
            }
            FrameKind::List { start, items } => parent.push_block(Block::List { start, items }),
            FrameKind::Item { task } => {
                let blocks = settle(frame.blocks, frame.inlines);
                match &mut parent.kind {
                    FrameKind::List { items, .. } => items.push(ListItem { task, blocks }),
                    _ => parent.blocks.extend(blocks),
                }
            }
            FrameKind::CodeBlock { lang, code } => parent.push_block(Block::CodeBlock {
                lang,
                code,
                highlighted: None,
            }),
            FrameKind::HtmlBlock(html) => parent.push_block(Block::Html(html)),
            FrameKind::Table { header, rows } => parent.push_block(Block::Table { header, rows }),
            FrameKind::TableRow(cells) => {
                if let FrameKind::Table { header, rows } = &mut parent.kind {
                    if end == TagEnd::TableHead {
                        *header = cells;
                    } else {
                        rows.push(cells);
                    }
                }
            }
            FrameKind::TableCell => {
                if let FrameKind::TableRow(cells) = &mut parent.kind {
                    cells.push(frame.inlines);
                }
            }
            FrameKind::Emphasis => parent.push_inline(Inline::Emphasis(frame.inlines)),
            FrameKind::Strong => parent.push_inline(Inline::Strong(frame.inlines)),
            FrameKind::Strikethrough => parent.push_inline(Inline::Strikethrough(frame.inlines)),
            FrameKind::Link(dest) => parent.push_inline(Inline::Link {
                dest,
                content: frame.inlines,
            }),
            FrameKind::Image(token) => parent.push_inline(Inline::Image {
                alt: super::tree::plain_text(&frame.inlines),
                token,
            }),
            FrameKind::Footnote(label) => {
                let blocks = settle(frame.blocks, frame.inlines);
                parent.push_block(Block::FootnoteDefinition { label, blocks });
            }
            FrameKind::Root | FrameKind::Transparent => {
                for block in frame.blocks {
                    parent.push_block(block);
                }
                for inline in frame.inlines {
                    parent.push_inline(inline);
                }
            }
        }
    }

    fn finish(mut self) -> RenderedTree {
        while self.stack.len() > 1 {
            if let Some(frame) = self.stack.pop() {
                self.top().blocks.extend(frame.into_blocks());
            }
        }
        let blocks = self
            .stack
            .pop()
            .map(Frame::into_blocks)
            .unwrap_or_default();
        RenderedTree { blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::frontmatter::FrontmatterValue;
    use crate::markdown::tree::plain_text;

    fn heading_texts(tree: &RenderedTree) -> Vec<(u8, String, usize)> {
        tree.headings()
            .into_iter()
            .filter_map(|b| match b {
                Block::Heading {
                    level,
                    content,
                    source_line,
                    ..
                } => Some((*level, plain_text(content), *source_line)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_headings_with_levels_and_lines() {
        let tree = parse_markdown("# A\n\ntext\n\n## B\n### C\n");
        assert_eq!(
            heading_texts(&tree),
            vec![
                (1, "A".to_string(), 0),
                (2, "B".to_string(), 4),
                (3, "C".to_string(), 5),
            ]
        );
    }

    #[test]
    fn test_frontmatter_becomes_first_block() {
        let tree = parse_markdown("---\ntitle: Hello\nstatus: done\n---\n# Body\n");
        match &tree.blocks[0] {
            Block::Frontmatter(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].value, FrontmatterValue::Text("Hello".into()));
            }
            other => panic!("unexpected block {:?}", other),
        }
        assert_eq!(heading_texts(&tree), vec![(1, "Body".to_string(), 4)]);
    }

    #[test]
    fn test_wikilink_embed_is_an_image() {
        let tree = parse_markdown("![[my shot.png]]");
        assert_eq!(tree.image_tokens(), vec!["my shot.png"]);
    }

    #[test]
    fn test_image_with_spaces_is_an_image() {
        let tree = parse_markdown("![test](Kwin effect glass.png)\n\n![plain](image.png)");
        assert_eq!(tree.image_tokens(), vec!["Kwin effect glass.png", "image.png"]);
    }

    #[test]
    fn test_spaced_image_stops_at_its_own_paren() {
        let tree = parse_markdown("![a](a.png) ![b](b c.png) (note)");
        assert_eq!(tree.image_tokens(), vec!["a.png", "b c.png"]);
        assert_eq!(preprocess("![a](a.png) (x y)"), "![a](a.png) (x y)");
    }

    #[test]
    fn test_preprocess_keeps_line_count() {
        let body = "![[a b.png]]\n![x](c d.png)\n![y](e.png \"title\")\n";
        assert_eq!(preprocess(body).lines().count(), body.lines().count());
        assert!(preprocess(body).contains("![y](e.png \"title\")"));
    }

    #[test]
    fn test_explicit_heading_id_is_kept() {
        let tree = parse_markdown("# Title {#custom}\n");
        match &tree.blocks[0] {
            Block::Heading { id, content, .. } => {
                assert_eq!(id.as_deref(), Some("custom"));
                assert_eq!(plain_text(content), "Title");
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_tight_and_task_lists() {
        let tree = parse_markdown("- [x] done\n- [ ] open\n- plain\n");
        match &tree.blocks[0] {
            Block::List { start, items } => {
                assert_eq!(*start, None);
                let tasks: Vec<_> = items.iter().map(|i| i.task).collect();
                assert_eq!(tasks, vec![Some(true), Some(false), None]);
                assert!(matches!(items[2].blocks[0], Block::Paragraph(_)));
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_fenced_code_and_table() {
        let tree = parse_markdown("```rust extra\nfn main() {}\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        match &tree.blocks[0] {
            Block::CodeBlock { lang, code, highlighted } => {
                assert_eq!(lang.as_deref(), Some("rust"));
                assert_eq!(code, "fn main() {}\n");
                assert!(highlighted.is_none());
            }
            other => panic!("unexpected block {:?}", other),
        }
        match &tree.blocks[1] {
            Block::Table { header, rows } => {
                assert_eq!(header.len(), 2);
                assert_eq!(rows.len(), 1);
                assert_eq!(plain_text(&rows[0][1]), "2");
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_markdown("").blocks.is_empty());
    }
}
