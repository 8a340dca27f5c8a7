use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{decode_token, encode_display_uri, AssetLookup};

const INDEX_VERSION: u32 = 1;
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"];

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
struct RootIndex {
    /// Modification time of the root directory when it was scanned
    mtime: u64,
    /// File name -> full path, first match wins
    files: HashMap<String, String>,
}

/// Image files under the configured search paths, looked up by file name.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct ImageIndex {
    version: u32,
    roots: Vec<(String, RootIndex)>,
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn dir_mtime(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(
        modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    )
}

fn scan_root(root: &Path) -> HashMap<String, String> {
    let mut files = HashMap::new();
    let images = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()));

    for entry in images {
        let name = entry.file_name().to_string_lossy().into_owned();
        files
            .entry(name)
            .or_insert_with(|| entry.path().to_string_lossy().into_owned());
    }
    files
}

impl ImageIndex {
    /// Build or refresh the index; roots whose directory mtime is unchanged
    /// since the previous scan are reused as-is.
    pub fn build(roots: &[PathBuf], previous: Option<ImageIndex>) -> Self {
        let mut previous: HashMap<String, RootIndex> = previous
            .map(|index| index.roots.into_iter().collect())
            .unwrap_or_default();

        let mut fresh = Vec::with_capacity(roots.len());
        for root in roots {
            let key = root.to_string_lossy().into_owned();
            let Some(mtime) = dir_mtime(root) else {
                log::debug!("image search path {} is not accessible", root.display());
                continue;
            };
            let entry = match previous.remove(&key) {
                Some(cached) if cached.mtime >= mtime => cached,
                _ => {
                    log::debug!("indexing images under {}", root.display());
                    RootIndex {
                        mtime,
                        files: scan_root(root),
                    }
                }
            };
            fresh.push((key, entry));
        }

        Self {
            version: INDEX_VERSION,
            roots: fresh,
        }
    }

    /// Full path of an image called `file_name`, searching roots in order.
    pub fn find(&self, file_name: &str) -> Option<&str> {
        self.roots
            .iter()
            .find_map(|(_, root)| root.files.get(file_name))
            .map(String::as_str)
    }

    pub fn file_count(&self) -> usize {
        self.roots.iter().map(|(_, root)| root.files.len()).sum()
    }

    pub fn load(path: &Path) -> Option<Self> {
        let file = fs::File::open(path).ok()?;
        let index: ImageIndex = bincode::deserialize_from(BufReader::new(file)).ok()?;
        if index.version != INDEX_VERSION {
            return None;
        }
        Some(index)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self).map_err(std::io::Error::other)
    }
}

/// Resolves image tokens on the local filesystem: absolute and `~` paths,
/// then paths relative to the document, then the search-path index by name.
pub struct LocalAssetResolver {
    roots: Vec<PathBuf>,
    index_path: Option<PathBuf>,
    index: Option<ImageIndex>,
    /// Whether the index was refreshed during the current batch
    refreshed: bool,
}

impl LocalAssetResolver {
    pub fn new(roots: Vec<PathBuf>, index_path: Option<PathBuf>) -> Self {
        Self {
            roots,
            index_path,
            index: None,
            refreshed: false,
        }
    }

    /// Refreshed at most once per batch, and only when a lookup needs it.
    fn index(&mut self) -> &ImageIndex {
        if !self.refreshed {
            self.refreshed = true;
            let previous = self
                .index
                .take()
                .or_else(|| self.index_path.as_deref().and_then(ImageIndex::load));
            let index = ImageIndex::build(&self.roots, previous);
            if let Some(path) = &self.index_path {
                if let Err(e) = index.save(path) {
                    log::warn!("could not save image index: {}", e);
                }
            }
            log::debug!("image index ready: {} files", index.file_count());
            self.index = Some(index);
        }
        self.index.get_or_insert_with(ImageIndex::default)
    }

    fn resolve_one(&mut self, document_dir: Option<&Path>, token: &str) -> Option<PathBuf> {
        let decoded = decode_token(token);
        let candidates = [token, decoded.as_ref()];

        for candidate in candidates {
            let expanded = PathBuf::from(shellexpand::tilde(candidate).as_ref());
            if expanded.is_absolute() {
                if expanded.exists() {
                    return Some(expanded);
                }
                continue;
            }
            if let Some(dir) = document_dir {
                let joined = dir.join(&expanded);
                if joined.exists() {
                    return Some(joined);
                }
            }
        }

        if self.roots.is_empty() {
            return None;
        }
        let file_name = Path::new(decoded.as_ref())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())?;
        self.index().find(&file_name).map(PathBuf::from)
    }
}

/// `file://` URI for a local path, with reserved characters encoded once.
pub fn file_uri(path: &Path) -> String {
    encode_display_uri(&format!("file://{}", path.display()))
}

impl AssetLookup for LocalAssetResolver {
    fn resolve(&mut self, document_path: &Path, tokens: &[String]) -> HashMap<String, Option<String>> {
        self.refreshed = false;
        let document_dir = document_path.parent();
        tokens
            .iter()
            .map(|token| {
                let uri = self
                    .resolve_one(document_dir, token)
                    .map(|path| file_uri(&path));
                (token.clone(), uri)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"img").unwrap();
    }

    #[test]
    fn test_relative_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("notes").join("doc.md");
        touch(&dir.path().join("notes").join("img").join("a b.png"));

        let mut resolver = LocalAssetResolver::new(Vec::new(), None);
        let tokens = vec!["img/a b.png".to_string(), "img/a%20b.png".to_string(), "nope.png".to_string()];
        let resolved = resolver.resolve(&doc, &tokens);

        let expected = file_uri(&dir.path().join("notes").join("img").join("a b.png"));
        assert!(expected.ends_with("img/a%20b.png"));
        assert_eq!(resolved["img/a b.png"].as_deref(), Some(expected.as_str()));
        assert_eq!(resolved["img/a%20b.png"].as_deref(), Some(expected.as_str()));
        assert_eq!(resolved["nope.png"], None);
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn test_falls_back_to_search_paths_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let attachments = dir.path().join("attachments");
        touch(&attachments.join("deep").join("Shot.PNG"));
        touch(&attachments.join("notes.txt"));
        let doc = dir.path().join("elsewhere").join("doc.md");

        let mut resolver = LocalAssetResolver::new(vec![attachments.clone()], None);
        let resolved = resolver.resolve(&doc, &["Shot.PNG".to_string(), "notes.txt".to_string()]);

        assert_eq!(
            resolved["Shot.PNG"].as_deref(),
            Some(file_uri(&attachments.join("deep").join("Shot.PNG")).as_str())
        );
        assert_eq!(resolved["notes.txt"], None);
    }

    #[test]
    fn test_index_persists_and_reuses_unchanged_roots() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pics");
        touch(&root.join("a.png"));
        let index_path = dir.path().join("cache").join("image_index.bin");

        let index = ImageIndex::build(&[root.clone()], None);
        index.save(&index_path).unwrap();
        let loaded = ImageIndex::load(&index_path).unwrap();
        assert_eq!(loaded.file_count(), 1);

        let rebuilt = ImageIndex::build(&[root.clone()], Some(loaded));
        assert!(rebuilt.find("a.png").is_some());
        assert!(rebuilt.find("b.png").is_none());
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let index = ImageIndex::build(&[dir.path().join("absent")], None);
        assert_eq!(index.file_count(), 0);
    }
}
