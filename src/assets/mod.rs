//! Embedded image references and their resolution state.

mod index;

pub use index::LocalAssetResolver;

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::markdown::RenderedTree;

/// Batched lookup of image tokens relative to a document.
///
/// Callers pass distinct tokens. A token missing from the result was not
/// requested; a `None` value means it was requested and not found. Found
/// values are display URIs, already percent-encoded.
pub trait AssetLookup: Send + 'static {
    fn resolve(&mut self, document_path: &Path, tokens: &[String]) -> HashMap<String, Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Found,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub original_token: String,
    pub resolved_uri: Option<String>,
    pub state: AssetState,
}

/// Resolution state for every local image token of the current tree.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    order: Vec<String>,
    refs: HashMap<String, AssetReference>,
}

impl AssetTable {
    /// Start a new pass: every token becomes `Pending`.
    pub fn begin(&mut self, tokens: &[String]) {
        self.clear();
        for token in tokens {
            if self.refs.contains_key(token) {
                continue;
            }
            self.order.push(token.clone());
            self.refs.insert(
                token.clone(),
                AssetReference {
                    original_token: token.clone(),
                    resolved_uri: None,
                    state: AssetState::Pending,
                },
            );
        }
    }

    /// Record a resolver answer. Requested tokens the answer skips are missing.
    pub fn apply(&mut self, mut resolved: HashMap<String, Option<String>>) {
        for (token, reference) in self.refs.iter_mut() {
            match resolved.remove(token).flatten() {
                Some(uri) => {
                    reference.resolved_uri = Some(uri);
                    reference.state = AssetState::Found;
                }
                None => {
                    reference.resolved_uri = None;
                    reference.state = AssetState::Missing;
                }
            }
        }
    }

    /// The resolver failed as a whole: degrade whatever is still pending.
    pub fn fail_all(&mut self) {
        for reference in self.refs.values_mut() {
            if reference.state == AssetState::Pending {
                reference.state = AssetState::Missing;
            }
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.refs.clear();
    }

    pub fn get(&self, token: &str) -> Option<&AssetReference> {
        self.refs.get(token)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetReference> {
        self.order.iter().filter_map(|token| self.refs.get(token))
    }

    /// (found, missing, pending)
    pub fn summary(&self) -> (usize, usize, usize) {
        self.iter().fold((0, 0, 0), |(f, m, p), r| match r.state {
            AssetState::Found => (f + 1, m, p),
            AssetState::Missing => (f, m + 1, p),
            AssetState::Pending => (f, m, p + 1),
        })
    }
}

/// Absolute network-style references are displayed as written.
pub fn is_network_url(token: &str) -> bool {
    let lower = token.trim_start().to_ascii_lowercase();
    ["http://", "https://", "//", "data:"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Distinct local image tokens in document order.
pub fn collect_tokens(tree: &RenderedTree) -> Vec<String> {
    let mut seen = HashSet::new();
    tree.image_tokens()
        .into_iter()
        .filter(|token| !token.is_empty() && !is_network_url(token))
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// Percent-encode the characters that may not appear raw in a URI path.
pub fn encode_display_uri(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            _ => out.push(c),
        }
    }
    out
}

/// Tokens may arrive percent-encoded (`my%20shot.png`).
pub fn decode_token(token: &str) -> Cow<'_, str> {
    urlencoding::decode(token).unwrap_or(Cow::Borrowed(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::convert::parse_markdown;

    #[test]
    fn test_collect_tokens_dedupes_and_skips_urls() {
        let tree = parse_markdown(
            "![x](img1.png)\n\n![y](img1.png)\n\n![z](https://example.com/a.png)\n\n![w](sub/b.png)",
        );
        assert_eq!(collect_tokens(&tree), vec!["img1.png", "sub/b.png"]);
    }

    #[test]
    fn test_no_images_no_tokens() {
        let tree = parse_markdown("# Title\n\n[link](a.png)");
        assert!(collect_tokens(&tree).is_empty());
    }

    #[test]
    fn test_is_network_url() {
        assert!(is_network_url("https://x/y.png"));
        assert!(is_network_url("HTTP://x/y.png"));
        assert!(is_network_url("//cdn/y.png"));
        assert!(is_network_url("data:image/png;base64,AAAA"));
        assert!(!is_network_url("./y.png"));
        assert!(!is_network_url("/abs/y.png"));
    }

    #[test]
    fn test_encode_display_uri() {
        assert_eq!(
            encode_display_uri("file:///notes/my shot [1].png"),
            "file:///notes/my%20shot%20%5B1%5D.png"
        );
    }

    #[test]
    fn test_decode_token() {
        assert_eq!(decode_token("my%20shot.png"), "my shot.png");
        assert_eq!(decode_token("plain.png"), "plain.png");
    }

    #[test]
    fn test_table_lifecycle() {
        let mut table = AssetTable::default();
        table.begin(&["a.png".into(), "b.png".into(), "c.png".into()]);
        assert_eq!(table.summary(), (0, 0, 3));

        let mut answer = HashMap::new();
        answer.insert("a.png".to_string(), Some("file:///a.png".to_string()));
        answer.insert("b.png".to_string(), None);
        table.apply(answer);

        assert_eq!(table.get("a.png").map(|r| r.state), Some(AssetState::Found));
        assert_eq!(table.get("b.png").map(|r| r.state), Some(AssetState::Missing));
        assert_eq!(table.get("c.png").map(|r| r.state), Some(AssetState::Missing));
        assert_eq!(table.summary(), (1, 2, 0));

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_fail_all_degrades_pending() {
        let mut table = AssetTable::default();
        table.begin(&["a.png".into()]);
        table.fail_all();
        assert_eq!(table.get("a.png").map(|r| r.state), Some(AssetState::Missing));
    }
}
