//! Filesystem [`DocumentSource`].
//!
//! Enumerates files under `[source] root` whose extension is accepted,
//! skipping hidden files and anything matching `exclude_globs`. Only the
//! top level is scanned unless `recursive = true`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use docsync_core::models::{Document, DocumentInfo};
use docsync_core::source::{doc_id_from_path, fingerprint_bytes, DocumentSource};
use docsync_core::{Result, SyncError};

use crate::config::SourceConfig;
use crate::frontmatter::split_front_matter;

/// Decides which paths are documents. Shared by the scanner and the watcher.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    excludes: GlobSet,
}

impl DocumentFilter {
    pub fn new(root: &Path, extensions: &[String], exclude_globs: &[String]) -> anyhow::Result<Self> {
        let mut roots = vec![root.to_path_buf()];
        if let Ok(canonical) = root.canonicalize() {
            if canonical != root {
                roots.push(canonical);
            }
        }
        Ok(Self {
            roots,
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excludes: build_globset(exclude_globs)?,
        })
    }

    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        Self::new(&config.root, &config.extensions, &config.exclude_globs)
    }

    /// Whether `path` names a document. Only the name is inspected; the
    /// file need not exist.
    pub fn accepts(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return false;
        }

        let ext_ok = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|accepted| *accepted == ext)
            })
            .unwrap_or(false);
        if !ext_ok {
            return false;
        }

        let file_name_excluded = path
            .file_name()
            .map(|name| self.excludes.is_match(Path::new(name)))
            .unwrap_or(false);
        !(file_name_excluded || self.excludes.is_match(&relative))
    }

    /// `path` relative to the root, or `path` itself outside it.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// SHA-256 of the file at `path`.
pub async fn fingerprint_path(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SyncError::io(path, e))?;
    Ok(fingerprint_bytes(&bytes))
}

/// Documents stored as files under one root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
    extensions: Vec<String>,
    recursive: bool,
    follow_symlinks: bool,
    filter: DocumentFilter,
}

impl FsDocumentSource {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        if !config.root.is_dir() {
            bail!(
                "Document root does not exist or is not a directory: {}",
                config.root.display()
            );
        }
        Ok(Self {
            root: config.root.clone(),
            extensions: config.extensions.clone(),
            recursive: config.recursive,
            follow_symlinks: config.follow_symlinks,
            filter: DocumentFilter::from_config(config)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &DocumentFilter {
        &self.filter
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Accepted document paths, sorted. Per-entry walk errors are kept in
    /// place so one unreadable directory does not hide the rest.
    fn candidates(&self) -> Result<Vec<Result<PathBuf>>> {
        let mut walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .min_depth(1)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut out = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.filter.accepts(entry.path()) {
                        out.push(Ok(entry.into_path()));
                    }
                }
                Err(e) if e.depth() == 0 => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    return Err(SyncError::io(path, e.into()));
                }
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    out.push(Err(SyncError::io(path, e.into())));
                }
            }
        }
        Ok(out)
    }

    /// Path of the document with id `id`.
    async fn resolve(&self, id: &str) -> Result<PathBuf> {
        for ext in &self.extensions {
            let candidate = self
                .root
                .join(format!("{}.{}", id, ext.trim_start_matches('.')));
            if tokio::fs::metadata(&candidate)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
                && self.filter.accepts(&candidate)
            {
                return Ok(candidate);
            }
        }

        if self.recursive {
            for path in self.candidates()?.into_iter().flatten() {
                if doc_id_from_path(&path).ok().as_deref() == Some(id) {
                    return Ok(path);
                }
            }
        }

        Err(SyncError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn list_document_info(&self) -> Result<Vec<Result<DocumentInfo>>> {
        let candidates = self.candidates()?;

        let mut per_id: HashMap<String, usize> = HashMap::new();
        for path in candidates.iter().flatten() {
            if let Ok(id) = doc_id_from_path(path) {
                *per_id.entry(id).or_default() += 1;
            }
        }

        let mut owners: HashMap<String, PathBuf> = HashMap::new();
        let mut infos = Vec::new();
        for candidate in candidates {
            let path = match candidate {
                Ok(path) => path,
                Err(e) => {
                    infos.push(Err(e));
                    continue;
                }
            };
            let shared = doc_id_from_path(&path)
                .ok()
                .filter(|id| per_id.get(id).copied().unwrap_or(0) > 1);
            if let Some(id) = shared {
                let owner = match owners.get(&id) {
                    Some(owner) => owner.clone(),
                    None => match self.resolve(&id).await {
                        Ok(owner) => {
                            owners.insert(id.clone(), owner.clone());
                            owner
                        }
                        Err(e) => {
                            infos.push(Err(e));
                            continue;
                        }
                    },
                };
                if owner != path {
                    tracing::warn!(
                        id = %id,
                        path = %path.display(),
                        owner = %owner.display(),
                        "file shares its document id with another file; skipping"
                    );
                    infos.push(Err(SyncError::DuplicateId { id, path, owner }));
                    continue;
                }
            }
            infos.push(describe(&path).await);
        }
        Ok(infos)
    }

    async fn load_document(&self, id: &str) -> Result<Document> {
        let path = self.resolve(id).await?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SyncError::io(&path, e))?;
        let (front, body) = split_front_matter(id, &raw)?;

        let title = front.title.unwrap_or_else(|| file_name(&path));
        Ok(Document {
            id: id.to_string(),
            title,
            content: body.trim().to_string(),
            metadata: front.metadata,
        })
    }

    async fn fingerprint(&self, id: &str) -> Result<String> {
        let path = self.resolve(id).await?;
        fingerprint_path(&path).await
    }

    async fn id_for_path(&self, path: &Path) -> Result<String> {
        let id = doc_id_from_path(path)?;
        match self.resolve(&id).await {
            Ok(owner) if self.filter.relative(&owner) != self.filter.relative(path) => {
                Err(SyncError::DuplicateId {
                    id,
                    path: path.to_path_buf(),
                    owner,
                })
            }
            _ => Ok(id),
        }
    }
}

async fn describe(path: &Path) -> Result<DocumentInfo> {
    Ok(DocumentInfo {
        id: doc_id_from_path(path)?,
        filename: file_name(path),
        fingerprint: fingerprint_path(path).await?,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(root: &Path, recursive: bool) -> SourceConfig {
        SourceConfig {
            root: root.to_path_buf(),
            extensions: vec!["md".to_string()],
            exclude_globs: vec!["draft-*".to_string()],
            recursive,
            follow_symlinks: false,
        }
    }

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.md"), "---\ntitle: Hello\n---\nHi there.").unwrap();
        fs::write(dir.path().join("plain.md"), "  no front matter  \n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join(".hidden.md"), "ignored").unwrap();
        fs::write(dir.path().join("draft-wip.md"), "ignored").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("deep.md"), "deep body").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let dir = corpus();
        let source = FsDocumentSource::new(&config(dir.path(), false)).unwrap();
        let infos: Vec<DocumentInfo> = source
            .list_document_info()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let ids: Vec<&str> = infos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["hello", "plain"]);
        assert_eq!(infos[0].filename, "hello.md");
        assert_eq!(infos[0].fingerprint.len(), 64);
    }

    #[tokio::test]
    async fn test_recursive_listing_and_resolution() {
        let dir = corpus();
        let source = FsDocumentSource::new(&config(dir.path(), true)).unwrap();
        let infos = source.list_document_info().await.unwrap();
        assert_eq!(infos.len(), 3);

        let doc = source.load_document("deep").await.unwrap();
        assert_eq!(doc.content, "deep body");
    }

    #[tokio::test]
    async fn test_shared_file_stem_indexed_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a").join("index.md"), "---\ntitle: First\n---\nfirst body").unwrap();
        fs::write(dir.path().join("b").join("index.md"), "---\ntitle: Second\n---\nsecond body").unwrap();
        let source = FsDocumentSource::new(&config(dir.path(), true)).unwrap();

        let infos = source.list_document_info().await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].as_ref().unwrap().id, "index");
        match &infos[1] {
            Err(SyncError::DuplicateId { id, path, owner }) => {
                assert_eq!(id, "index");
                assert!(path.ends_with("b/index.md"));
                assert!(owner.ends_with("a/index.md"));
            }
            other => panic!("expected DuplicateId, got {:?}", other),
        }

        let owner = dir.path().join("a").join("index.md");
        assert_eq!(source.id_for_path(&owner).await.unwrap(), "index");
        let shadowed = dir.path().join("b").join("index.md");
        assert!(matches!(
            source.id_for_path(&shadowed).await,
            Err(SyncError::DuplicateId { .. })
        ));
    }

    #[tokio::test]
    async fn test_id_for_removed_path() {
        let dir = corpus();
        let source = FsDocumentSource::new(&config(dir.path(), false)).unwrap();
        let gone = dir.path().join("gone.md");
        assert_eq!(source.id_for_path(&gone).await.unwrap(), "gone");
    }

    #[tokio::test]
    async fn test_load_document_title_and_fallback() {
        let dir = corpus();
        let source = FsDocumentSource::new(&config(dir.path(), false)).unwrap();

        let hello = source.load_document("hello").await.unwrap();
        assert_eq!(hello.title, "Hello");
        assert_eq!(hello.content, "Hi there.");

        let plain = source.load_document("plain").await.unwrap();
        assert_eq!(plain.title, "plain.md");
        assert_eq!(plain.content, "no front matter");
    }

    #[tokio::test]
    async fn test_missing_document_not_found() {
        let dir = corpus();
        let source = FsDocumentSource::new(&config(dir.path(), false)).unwrap();
        assert!(matches!(
            source.load_document("nope").await,
            Err(SyncError::NotFound(_))
        ));
        assert!(matches!(
            source.fingerprint("draft-wip").await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_content() {
        let dir = corpus();
        let source = FsDocumentSource::new(&config(dir.path(), false)).unwrap();
        let first = source.fingerprint("hello").await.unwrap();
        assert_eq!(first, source.fingerprint("hello").await.unwrap());

        fs::write(dir.path().join("hello.md"), "changed").unwrap();
        assert_ne!(first, source.fingerprint("hello").await.unwrap());
    }

    #[test]
    fn test_filter_accepts() {
        let root = Path::new("/blog/posts");
        let filter =
            DocumentFilter::new(root, &["md".to_string(), ".markdown".to_string()], &["*.tmp.md".to_string()])
                .unwrap();
        assert!(filter.accepts(Path::new("/blog/posts/a.md")));
        assert!(filter.accepts(Path::new("/blog/posts/b.MD")));
        assert!(filter.accepts(Path::new("/blog/posts/c.markdown")));
        assert!(!filter.accepts(Path::new("/blog/posts/d.txt")));
        assert!(!filter.accepts(Path::new("/blog/posts/.e.md")));
        assert!(!filter.accepts(Path::new("/blog/posts/.git/f.md")));
        assert!(!filter.accepts(Path::new("/blog/posts/g.tmp.md")));
        assert!(!filter.accepts(Path::new("/blog/posts/noext")));
    }

    #[test]
    fn test_missing_root_rejected() {
        let cfg = config(Path::new("/definitely/not/here"), false);
        assert!(FsDocumentSource::new(&cfg).is_err());
    }
}
