//! Heading anchors: slugs, uniqueness and stamping onto a tree.

use std::collections::HashSet;

use super::tree::{plain_text, Block, RenderedTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub id: String,
    pub level: u8,
    pub text: String,
}

/// Lowercase and trim, drop everything but ASCII word characters, whitespace
/// and hyphens, then turn whitespace runs into single hyphens.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept = lowered
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace());

    let mut slug = String::with_capacity(lowered.len());
    for c in kept {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

/// Assign an id to every heading that lacks one.
///
/// Ids already present are kept (the first holder of a duplicate keeps it).
/// New ids are slugs, suffixed `-1`, `-2`, ... on collision, with
/// `heading-<index>` for headings whose slug is empty.
pub fn stamp_anchors(tree: &mut RenderedTree) {
    let mut headings = tree.headings_mut();

    let mut taken: HashSet<String> = HashSet::new();
    for heading in headings.iter_mut() {
        if let Block::Heading { id, .. } = &mut **heading {
            if let Some(existing) = id.as_ref() {
                if !taken.insert(existing.clone()) {
                    *id = None;
                }
            }
        }
    }

    for (index, heading) in headings.into_iter().enumerate() {
        if let Block::Heading { id, content, .. } = heading {
            if id.is_some() {
                continue;
            }
            let mut base = slugify(&plain_text(content));
            if base.is_empty() {
                base = format!("heading-{}", index);
            }
            let unique = unique_id(&base, &taken);
            taken.insert(unique.clone());
            *id = Some(unique);
        }
    }
}

fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Anchors of a stamped tree in document order. Unstamped headings are skipped.
pub fn extract(tree: &RenderedTree) -> Vec<Anchor> {
    tree.headings()
        .into_iter()
        .filter_map(|heading| match heading {
            Block::Heading {
                level,
                id: Some(id),
                content,
                ..
            } => Some(Anchor {
                id: id.clone(),
                level: *level,
                text: plain_text(content),
            }),
            _ => None,
        })
        .collect()
}
