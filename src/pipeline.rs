//! Raw text to displayable tree: convert, resolve assets, stamp anchors,
//! highlight.
//!
//! Every submission gets a new generation number. Replies carry the
//! generation they were issued for and anything older than the current one
//! is dropped on arrival.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::assets::{collect_tokens, AssetTable};
use crate::error::ServiceError;
use crate::markdown::{extract, stamp_anchors, Anchor, Block, Highlighter, RenderedTree};
use crate::worker::{ServiceHost, ServiceReply};

#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub generation: u64,
    pub text: String,
}

#[derive(Debug)]
pub struct ConvertResponse {
    pub generation: u64,
    pub result: Result<RenderedTree, ServiceError>,
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub generation: u64,
    pub document_path: PathBuf,
    /// Distinct tokens, in document order
    pub tokens: Vec<String>,
}

#[derive(Debug)]
pub struct ResolveResponse {
    pub generation: u64,
    pub result: Result<HashMap<String, Option<String>>, ServiceError>,
}

/// What a reply did to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Reply for a superseded generation, ignored
    Stale,
    /// Conversion failed; the previous tree stays on screen
    ConversionFailed(ServiceError),
    /// A new tree is in place; `resolving` if an asset request went out
    Rendered { resolving: bool },
    AssetsResolved,
    /// The resolver failed; every pending asset is now missing
    AssetsFailed(ServiceError),
}

#[derive(Default)]
pub struct ContentPipeline {
    generation: u64,
    tree_generation: Option<u64>,
    tree: Option<RenderedTree>,
    anchors: Vec<Anchor>,
    assets: AssetTable,
    document_path: Option<PathBuf>,
    revision: u64,
    last_error: Option<ServiceError>,
}

impl ContentPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `text` off for conversion. Supersedes anything in flight.
    pub fn submit(&mut self, text: &str, path: Option<&Path>, services: &mut dyn ServiceHost) {
        self.generation += 1;
        self.document_path = path.map(Path::to_path_buf);
        services.convert(ConvertRequest {
            generation: self.generation,
            text: text.to_string(),
        });
    }

    pub fn handle(&mut self, reply: ServiceReply, services: &mut dyn ServiceHost) -> PipelineEvent {
        match reply {
            ServiceReply::Converted(response) => self.on_converted(response, services),
            ServiceReply::Resolved(response) => self.on_resolved(response),
        }
    }

    fn on_converted(&mut self, response: ConvertResponse, services: &mut dyn ServiceHost) -> PipelineEvent {
        if response.generation != self.generation {
            log::debug!(
                "dropping conversion for generation {} (current {})",
                response.generation,
                self.generation
            );
            return PipelineEvent::Stale;
        }

        let mut tree = match response.result {
            Ok(tree) => tree,
            Err(e) => {
                log::warn!("{}; keeping the last rendered document", e);
                self.last_error = Some(e.clone());
                return PipelineEvent::ConversionFailed(e);
            }
        };

        stamp_anchors(&mut tree);
        self.anchors = extract(&tree);

        let tokens = collect_tokens(&tree);
        self.assets.begin(&tokens);
        let mut resolving = false;
        if !tokens.is_empty() {
            match &self.document_path {
                Some(path) => {
                    services.resolve(ResolveRequest {
                        generation: response.generation,
                        document_path: path.clone(),
                        tokens,
                    });
                    resolving = true;
                }
                // Relative references mean nothing without a location.
                None => self.assets.fail_all(),
            }
        }

        self.tree = Some(tree);
        self.tree_generation = Some(response.generation);
        self.last_error = None;
        self.revision += 1;
        PipelineEvent::Rendered { resolving }
    }

    fn on_resolved(&mut self, response: ResolveResponse) -> PipelineEvent {
        if self.tree_generation != Some(response.generation) {
            log::debug!("dropping asset resolution for generation {}", response.generation);
            return PipelineEvent::Stale;
        }
        self.revision += 1;
        match response.result {
            Ok(resolved) => {
                self.assets.apply(resolved);
                PipelineEvent::AssetsResolved
            }
            Err(e) => {
                log::warn!("{}; images shown as missing", e);
                self.assets.fail_all();
                PipelineEvent::AssetsFailed(e)
            }
        }
    }

    /// Whether the current tree has code that is not highlighted yet.
    pub fn needs_highlighting(&self) -> bool {
        self.tree.as_ref().is_some_and(RenderedTree::needs_highlighting)
    }

    /// Presentation only: anchors and asset state are untouched.
    pub fn apply_highlighting(&mut self, highlighter: &Highlighter) -> bool {
        if !self.needs_highlighting() {
            return false;
        }
        if let Some(tree) = self.tree.as_mut() {
            highlighter.highlight_tree(tree);
            self.revision += 1;
            return true;
        }
        false
    }

    /// No document: drop the tree and invalidate anything in flight.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.tree = None;
        self.tree_generation = None;
        self.anchors.clear();
        self.assets.clear();
        self.document_path = None;
        self.last_error = None;
        self.revision += 1;
    }

    pub fn tree(&self) -> Option<&RenderedTree> {
        self.tree.as_ref()
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    /// Source line of the heading carrying `id`.
    pub fn heading_line(&self, id: &str) -> Option<usize> {
        self.tree.as_ref()?.headings().into_iter().find_map(|block| match block {
            Block::Heading {
                id: Some(heading_id),
                source_line,
                ..
            } if heading_id == id => Some(*source_line),
            _ => None,
        })
    }

    /// Changes whenever the displayed output must be laid out again.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_converting(&self) -> bool {
        self.tree_generation != Some(self.generation)
    }

    pub fn last_error(&self) -> Option<&ServiceError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetLookup, AssetState};
    use crate::markdown::{Converter, MarkdownConverter};
    use crate::worker::InlineServices;

    /// Finds every token whose name starts with "found".
    struct PrefixLookup;

    impl AssetLookup for PrefixLookup {
        fn resolve(&mut self, _: &Path, tokens: &[String]) -> HashMap<String, Option<String>> {
            tokens
                .iter()
                .map(|t| {
                    let uri = t.starts_with("found").then(|| format!("file:///doc/{}", t));
                    (t.clone(), uri)
                })
                .collect()
        }
    }

    struct FailingLookup;

    impl AssetLookup for FailingLookup {
        fn resolve(&mut self, _: &Path, _: &[String]) -> HashMap<String, Option<String>> {
            panic!("lookup unavailable")
        }
    }

    /// Fails whenever the text contains "FAIL".
    struct FlakyConverter;

    impl Converter for FlakyConverter {
        fn convert(&self, text: &str) -> Result<RenderedTree, ServiceError> {
            if text.contains("FAIL") {
                return Err(ServiceError::Panicked {
                    service: "conversion",
                    message: "bad input".into(),
                });
            }
            MarkdownConverter.convert(text)
        }
    }

    fn drain<C: Converter, L: AssetLookup>(
        pipeline: &mut ContentPipeline,
        services: &mut InlineServices<C, L>,
    ) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(reply) = services.poll() {
            events.push(pipeline.handle(reply, services));
        }
        events
    }

    fn ids(pipeline: &ContentPipeline) -> Vec<String> {
        pipeline.anchors().iter().map(|a| a.id.clone()).collect()
    }

    const DOC: &str = "/doc.md";

    #[test]
    fn test_scenario_headings() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# A\n## B\n### C\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);

        let levels: Vec<(u8, String)> = pipeline
            .anchors()
            .iter()
            .map(|a| (a.level, a.id.clone()))
            .collect();
        assert_eq!(
            levels,
            vec![(1, "a".into()), (2, "b".into()), (3, "c".into())]
        );
    }

    #[test]
    fn test_one_resolution_call_for_many_assets() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        let text: String = (0..20).map(|i| format!("![i](found{}.png)\n\n", i)).collect();
        pipeline.submit(&text, Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);

        assert_eq!(services.resolve_calls.len(), 1);
        assert_eq!(services.resolve_calls[0].len(), 20);
        assert_eq!(pipeline.assets().summary(), (20, 0, 0));
    }

    #[test]
    fn test_duplicate_tokens_are_requested_once() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("![x](img1.png)\n\n![y](img1.png)\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);

        assert_eq!(services.resolve_calls, vec![vec!["img1.png".to_string()]]);
        assert_eq!(
            pipeline.assets().get("img1.png").map(|r| r.state),
            Some(AssetState::Missing)
        );
    }

    #[test]
    fn test_images_sharing_a_line_resolve_separately() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("![x](img1.png) ![y](img1.png)\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        assert_eq!(services.resolve_calls, vec![vec!["img1.png".to_string()]]);

        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("![x](img1.png) see (note)\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        assert_eq!(services.resolve_calls, vec![vec!["img1.png".to_string()]]);
    }

    #[test]
    fn test_no_assets_no_resolution_call() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit(
            "# Title\n\n![remote](https://example.com/a.png)\n",
            Some(Path::new(DOC)),
            &mut services,
        );
        let events = drain(&mut pipeline, &mut services);

        assert!(services.resolve_calls.is_empty());
        assert_eq!(events, vec![PipelineEvent::Rendered { resolving: false }]);
    }

    #[test]
    fn test_same_text_same_anchors() {
        let text = "# Intro\n# Intro\n## Setup\n![a](found.png)\n";
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();

        pipeline.submit(text, Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        let first = ids(&pipeline);

        pipeline.submit(text, Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);

        assert_eq!(ids(&pipeline), first);
        assert_eq!(first, vec!["intro", "intro-1", "setup"]);
    }

    #[test]
    fn test_superseded_conversion_is_dropped() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# Old\n", Some(Path::new(DOC)), &mut services);
        pipeline.submit("# New\n", Some(Path::new(DOC)), &mut services);
        let events = drain(&mut pipeline, &mut services);

        assert_eq!(events[0], PipelineEvent::Stale);
        assert_eq!(ids(&pipeline), vec!["new"]);
        assert!(!pipeline.is_converting());
    }

    #[test]
    fn test_resolution_for_replaced_tree_is_dropped() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();

        pipeline.submit("![a](found-a.png)", Some(Path::new(DOC)), &mut services);
        let converted = services.poll().unwrap();
        pipeline.handle(converted, &mut services);
        let first_resolution = services.poll().unwrap();

        pipeline.submit("![b](found-b.png)", Some(Path::new(DOC)), &mut services);
        let converted = services.poll().unwrap();
        pipeline.handle(converted, &mut services);

        assert_eq!(pipeline.handle(first_resolution, &mut services), PipelineEvent::Stale);
        assert_eq!(
            pipeline.assets().get("found-b.png").map(|r| r.state),
            Some(AssetState::Pending)
        );
        assert!(pipeline.assets().get("found-a.png").is_none());

        drain(&mut pipeline, &mut services);
        assert_eq!(
            pipeline.assets().get("found-b.png").map(|r| r.state),
            Some(AssetState::Found)
        );
    }

    #[test]
    fn test_conversion_failure_keeps_last_tree() {
        let mut services = InlineServices::new(FlakyConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# Good\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        let revision = pipeline.revision();

        pipeline.submit("# FAIL\n", Some(Path::new(DOC)), &mut services);
        let events = drain(&mut pipeline, &mut services);

        assert!(matches!(events[0], PipelineEvent::ConversionFailed(_)));
        assert_eq!(ids(&pipeline), vec!["good"]);
        assert_eq!(pipeline.revision(), revision);
        assert!(pipeline.last_error().is_some());

        pipeline.submit("# Fixed\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        assert_eq!(ids(&pipeline), vec!["fixed"]);
        assert!(pipeline.last_error().is_none());
    }

    #[test]
    fn test_resolution_failure_degrades_to_missing() {
        let mut services = InlineServices::new(MarkdownConverter, FailingLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# T\n\n![a](a.png)\n", Some(Path::new(DOC)), &mut services);
        let events = drain(&mut pipeline, &mut services);

        assert!(matches!(events[1], PipelineEvent::AssetsFailed(_)));
        assert_eq!(pipeline.assets().summary(), (0, 1, 0));
        assert_eq!(ids(&pipeline), vec!["t"]);
    }

    #[test]
    fn test_unsaved_document_marks_assets_missing_without_call() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("![a](found.png)", None, &mut services);
        drain(&mut pipeline, &mut services);

        assert!(services.resolve_calls.is_empty());
        assert_eq!(pipeline.assets().summary(), (0, 1, 0));
    }

    #[test]
    fn test_highlighting_keeps_anchors_and_assets() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# Code\n\n```rust\nlet a = 1;\n```\n\n![a](found.png)\n", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        let anchors = pipeline.anchors().to_vec();
        let summary = pipeline.assets().summary();

        assert!(pipeline.needs_highlighting());
        assert!(pipeline.apply_highlighting(&Highlighter::default()));
        assert!(!pipeline.needs_highlighting());
        assert!(!pipeline.apply_highlighting(&Highlighter::default()));

        assert_eq!(pipeline.anchors(), anchors.as_slice());
        assert_eq!(pipeline.assets().summary(), summary);
    }

    #[test]
    fn test_heading_line() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# Top

text

## Below
", Some(Path::new(DOC)), &mut services);
        drain(&mut pipeline, &mut services);
        assert_eq!(pipeline.heading_line("top"), Some(0));
        assert_eq!(pipeline.heading_line("below"), Some(4));
        assert_eq!(pipeline.heading_line("nope"), None);
    }

    #[test]
    fn test_clear_invalidates_in_flight() {
        let mut services = InlineServices::new(MarkdownConverter, PrefixLookup);
        let mut pipeline = ContentPipeline::new();
        pipeline.submit("# A\n", Some(Path::new(DOC)), &mut services);
        pipeline.clear();
        let events = drain(&mut pipeline, &mut services);

        assert_eq!(events, vec![PipelineEvent::Stale]);
        assert!(pipeline.tree().is_none());
        assert!(pipeline.assets().is_empty());
    }
}
