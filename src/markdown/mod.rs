pub mod anchors;
pub mod convert;
pub mod frontmatter;
pub mod highlight;
pub mod layout;
mod tree;

pub use anchors::{extract, stamp_anchors, Anchor};
pub use convert::{Converter, MarkdownConverter};
pub use highlight::{Highlighter, LazyHighlighter};
pub use layout::{layout, AnchorRow, Layout, Palette};
pub use tree::{Block, RenderedTree};
