//! Incremental build cache.
//!
//! Tracks file fingerprints, dependency graphs, taxonomy indexes, parsed
//! content, and validation results across builds.
//!
//! PERSISTENCE CONTRACT: the cache never holds live object references —
//! only paths, strings, numbers, and containers of those. Object
//! relationships are rebuilt from paths by the orchestrator each build.
//!
//! Loading is tolerant: a missing, unreadable, unparsable, or
//! wrong-version file yields an empty cache with a logged warning, never a
//! failed build. Saving combines an exclusive advisory lock with an
//! atomic temp-file-and-rename write so concurrent processes cannot
//! observe torn state. A `.zst` sidecar is preferred on load when present
//! and written when compression is enabled.

pub mod ast_cache;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::ast::utils::TocItem;
use crate::ast::Document;
use crate::error::Result;
use crate::parser::Metadata;
use crate::utils::atomic_write::write_atomic;
use crate::utils::file_lock::{file_lock, DEFAULT_LOCK_TIMEOUT};

/// Current on-disk schema version.
pub const CACHE_VERSION: u32 = 4;

/// Fingerprint of one tracked file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFingerprint {
    /// Full SHA-256 hex digest of the file contents.
    pub hash: String,
    /// Modification time in seconds since the epoch, for diagnostics.
    pub mtime: f64,
    /// Size in bytes.
    pub size: u64,
}

/// Cached parse output for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedContentEntry {
    /// Rendered HTML (post-markdown, pre-template).
    pub html: String,
    /// Table-of-contents HTML.
    pub toc: String,
    /// Structured TOC items.
    pub toc_items: Vec<TocItem>,
    /// Parsed AST, when AST caching is enabled for the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ast: Option<Document>,
    /// SHA-256 of the sorted-key JSON of the page metadata.
    pub metadata_hash: String,
    /// Template name the page rendered with.
    pub template: String,
    /// Parser version string at store time.
    pub parser_version: String,
    /// ISO-8601 store timestamp.
    pub timestamp: String,
    /// Approximate entry size for cache accounting.
    pub size_bytes: u64,
}

/// One cached validator check outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckResult {
    /// `success`, `warning`, or `error`.
    pub status: String,
    /// Human-readable finding.
    pub message: String,
    /// Suggested fix, when the validator offers one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// AST sidecar entry, keyed separately by relative source path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AstCacheEntry {
    /// Truncated (16 hex chars) SHA-256 of the source content.
    pub content_hash: String,
    /// The cached tree.
    pub ast: Document,
}

/// Persistent incremental-build state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildCache {
    /// Schema version; see [`CACHE_VERSION`].
    pub version: u32,
    /// Relative path → content fingerprint.
    pub file_fingerprints: BTreeMap<String, FileFingerprint>,
    /// Source path → files it depends on (templates, includes, data).
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Taxonomy term key → affected pages.
    pub taxonomy_deps: BTreeMap<String, BTreeSet<String>>,
    /// Page path → tags (original case).
    pub page_tags: BTreeMap<String, BTreeSet<String>>,
    /// Tag slug → page paths (inverted index).
    pub tag_to_pages: BTreeMap<String, BTreeSet<String>>,
    /// Every tag slug seen in the previous build.
    pub known_tags: BTreeSet<String>,
    /// Page path → cached parse output.
    pub parsed_content: BTreeMap<String, ParsedContentEntry>,
    /// File path → validator name → results.
    pub validation_results: BTreeMap<String, BTreeMap<String, Vec<CheckResult>>>,
    /// Autodoc source file → generated pages.
    pub autodoc_dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Synthetic (autodoc-generated) page payloads.
    pub synthetic_pages: BTreeMap<String, serde_json::Value>,
    /// AST sidecar store.
    pub ast_cache: BTreeMap<String, AstCacheEntry>,
    /// Hash of the resolved configuration, for auto-invalidation.
    pub config_hash: Option<String>,
    /// ISO-8601 timestamp of the last successful save.
    pub last_build: Option<String>,
    /// Write a `.zst` sidecar on save. Not persisted.
    #[serde(skip)]
    pub compress: bool,
}

fn zst_sidecar(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".zst");
    std::path::PathBuf::from(os)
}

impl BuildCache {
    /// Load the cache from disk under a shared lock.
    ///
    /// Tolerant by contract: every failure (missing file, lock timeout,
    /// bad JSON, schema drift) logs a warning and yields an empty cache so
    /// the build proceeds without incremental benefit.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, true)
    }

    /// Load with explicit lock control (tests disable locking).
    #[must_use]
    pub fn load_with(path: &Path, use_lock: bool) -> Self {
        let sidecar = zst_sidecar(path);
        if !path.exists() && !sidecar.exists() {
            return Self::default();
        }
        let guard = if use_lock {
            match file_lock(path, false, DEFAULT_LOCK_TIMEOUT) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    warn!(
                        cache_path = %path.display(),
                        error = %e,
                        "could not lock cache for reading; using fresh cache"
                    );
                    return Self::default();
                }
            }
        } else {
            None
        };
        let cache = Self::load_from_file(path);
        drop(guard);
        cache
    }

    fn load_from_file(path: &Path) -> Self {
        let bytes = match Self::read_cache_bytes(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    cache_path = %path.display(),
                    error = %e,
                    "failed to read cache file; using fresh cache"
                );
                return Self::default();
            }
        };
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(mut cache) => {
                match cache.version {
                    0 => {
                        // Pre-versioned file: best-effort load already done.
                        warn!(
                            cache_path = %path.display(),
                            "cache has no version field; loaded best-effort"
                        );
                        cache.version = CACHE_VERSION;
                    }
                    v if v != CACHE_VERSION => {
                        warn!(
                            expected = CACHE_VERSION,
                            found = v,
                            "cache version mismatch; loaded known fields best-effort"
                        );
                        cache.version = CACHE_VERSION;
                    }
                    _ => {}
                }
                cache
            }
            Err(e) => {
                warn!(
                    cache_path = %path.display(),
                    error = %e,
                    "failed to parse cache file; using fresh cache"
                );
                Self::default()
            }
        }
    }

    /// Raw cache bytes, preferring the compressed sidecar when present.
    fn read_cache_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
        let sidecar = zst_sidecar(path);
        if sidecar.exists() {
            let file = std::fs::File::open(&sidecar)?;
            let mut decoder = zstd::Decoder::new(file)?;
            let mut bytes = Vec::new();
            decoder.read_to_end(&mut bytes)?;
            return Ok(bytes);
        }
        std::fs::read(path)
    }

    /// Save the cache under an exclusive lock with an atomic write.
    ///
    /// Lock and write failures propagate; the previous on-disk cache is
    /// left untouched on any error.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.save_with(path, true)
    }

    /// Save with explicit lock control (tests disable locking).
    pub fn save_with(&self, path: &Path, use_lock: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let guard = if use_lock {
            Some(file_lock(path, true, DEFAULT_LOCK_TIMEOUT)?)
        } else {
            None
        };
        let result = self.save_to_file(path);
        drop(guard);
        result
    }

    fn save_to_file(&self, path: &Path) -> Result<()> {
        let mut on_disk = self.clone();
        on_disk.version = CACHE_VERSION;
        on_disk.last_build = Some(chrono::Utc::now().to_rfc3339());
        let json = serde_json::to_vec_pretty(&on_disk)?;
        write_atomic(path, &json)?;
        if self.compress {
            let compressed = zstd::encode_all(json.as_slice(), 0)
                .map_err(crate::error::Error::Io)?;
            write_atomic(&zst_sidecar(path), &compressed)?;
        }
        debug!(
            cache_path = %path.display(),
            tracked_files = self.file_fingerprints.len(),
            dependencies = self.dependencies.len(),
            cached_content = self.parsed_content.len(),
            "cache saved"
        );
        Ok(())
    }

    /// SHA-256 of a file's bytes, read in 8 KiB chunks.
    ///
    /// Returns an empty string (logged) when the file cannot be read, so
    /// hashing never aborts a build.
    #[must_use]
    pub fn hash_file(path: &Path) -> String {
        let mut hasher = Sha256::new();
        let result = std::fs::File::open(path).and_then(|mut file| {
            let mut buffer = [0u8; 8192];
            loop {
                let read = file.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
            }
            Ok(())
        });
        match result {
            Ok(()) => format!("{:x}", hasher.finalize()),
            Err(e) => {
                warn!(
                    file_path = %path.display(),
                    error = %e,
                    "failed to hash file; using empty hash"
                );
                String::new()
            }
        }
    }

    /// Whether a file changed since the last build.
    ///
    /// True when the file is missing, unknown to the map, or hashes
    /// differently.
    #[must_use]
    pub fn is_changed(&self, path: &Path) -> bool {
        if !path.exists() {
            return true;
        }
        let key = path.to_string_lossy();
        let Some(fingerprint) = self.file_fingerprints.get(key.as_ref()) else {
            return true;
        };
        fingerprint.hash != Self::hash_file(path)
    }

    /// Record (or refresh) a file's fingerprint.
    pub fn update_file(&mut self, path: &Path) {
        let (mtime, size) = std::fs::metadata(path)
            .map(|m| {
                let mtime = m
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map_or(0.0, |d| d.as_secs_f64());
                (mtime, m.len())
            })
            .unwrap_or((0.0, 0));
        self.file_fingerprints.insert(
            path.to_string_lossy().into_owned(),
            FileFingerprint {
                hash: Self::hash_file(path),
                mtime,
                size,
            },
        );
    }

    /// Record that `source` depends on `dependency`.
    pub fn add_dependency(&mut self, source: &Path, dependency: &Path) {
        self.dependencies
            .entry(source.to_string_lossy().into_owned())
            .or_default()
            .insert(dependency.to_string_lossy().into_owned());
    }

    /// Record that a taxonomy term affects a page.
    pub fn add_taxonomy_dependency(&mut self, term: &str, page: &Path) {
        self.taxonomy_deps
            .entry(term.to_string())
            .or_default()
            .insert(page.to_string_lossy().into_owned());
    }

    /// Pages that must rebuild when `changed` changes: the file itself
    /// (when it is a tracked source) plus everything depending on it.
    #[must_use]
    pub fn get_affected_pages(&self, changed: &Path) -> BTreeSet<String> {
        let changed_key = changed.to_string_lossy();
        let mut affected = BTreeSet::new();
        for (source, deps) in &self.dependencies {
            if deps.contains(changed_key.as_ref()) {
                affected.insert(source.clone());
            }
        }
        if self.dependencies.contains_key(changed_key.as_ref()) {
            affected.insert(changed_key.into_owned());
        }
        affected
    }

    /// Tags recorded for a page in the previous build.
    #[must_use]
    pub fn get_previous_tags(&self, page: &Path) -> BTreeSet<String> {
        self.page_tags
            .get(page.to_string_lossy().as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Update the bidirectional page↔tag index.
    ///
    /// Returns every affected tag slug: added, removed, and unchanged
    /// (unchanged tags rebuild too, since page ordering inside a tag page
    /// may have shifted). Empty tag entries are pruned from both the
    /// inverted index and `known_tags`.
    pub fn update_page_tags(&mut self, page: &Path, tags: &BTreeSet<String>) -> BTreeSet<String> {
        let page_key = page.to_string_lossy().into_owned();
        let slug = |tag: &String| tag.to_lowercase().replace(' ', "-");

        let old_slugs: BTreeSet<String> = self
            .page_tags
            .get(&page_key)
            .map(|old| old.iter().map(slug).collect())
            .unwrap_or_default();
        let new_slugs: BTreeSet<String> = tags.iter().map(slug).collect();

        let mut affected = BTreeSet::new();
        for removed in old_slugs.difference(&new_slugs) {
            if let Some(pages) = self.tag_to_pages.get_mut(removed) {
                pages.remove(&page_key);
                if pages.is_empty() {
                    self.tag_to_pages.remove(removed);
                    self.known_tags.remove(removed);
                }
            }
            affected.insert(removed.clone());
        }
        for added in new_slugs.difference(&old_slugs) {
            self.tag_to_pages
                .entry(added.clone())
                .or_default()
                .insert(page_key.clone());
            self.known_tags.insert(added.clone());
            affected.insert(added.clone());
        }
        affected.extend(old_slugs.intersection(&new_slugs).cloned());

        self.page_tags.insert(page_key, tags.clone());
        affected
    }

    /// Pages carrying a tag slug.
    #[must_use]
    pub fn get_pages_for_tag(&self, tag_slug: &str) -> BTreeSet<String> {
        self.tag_to_pages
            .get(tag_slug)
            .cloned()
            .unwrap_or_default()
    }

    /// All known tag slugs from the previous build.
    #[must_use]
    pub fn get_all_tags(&self) -> BTreeSet<String> {
        self.known_tags.clone()
    }

    /// Drop every piece of cached state.
    pub fn clear(&mut self) {
        self.file_fingerprints.clear();
        self.dependencies.clear();
        self.taxonomy_deps.clear();
        self.page_tags.clear();
        self.tag_to_pages.clear();
        self.known_tags.clear();
        self.parsed_content.clear();
        self.validation_results.clear();
        self.autodoc_dependencies.clear();
        self.synthetic_pages.clear();
        self.ast_cache.clear();
        self.config_hash = None;
        self.last_build = None;
    }

    /// Check cache validity against the current configuration hash.
    ///
    /// First observation records the hash. A mismatch clears the whole
    /// cache (correctness over speed under config changes) and records the
    /// new hash, returning false. A match returns true silently.
    pub fn validate_config(&mut self, current_hash: &str) -> bool {
        match self.config_hash.as_deref() {
            None => {
                info!(hash = &current_hash[..current_hash.len().min(8)], "config hash initialized");
                self.config_hash = Some(current_hash.to_string());
                true
            }
            Some(stored) if stored != current_hash => {
                info!(
                    previous = &stored[..stored.len().min(8)],
                    current = &current_hash[..current_hash.len().min(8)],
                    "config changed; invalidating cache"
                );
                self.clear();
                self.config_hash = Some(current_hash.to_string());
                false
            }
            Some(_) => {
                debug!("config hash unchanged");
                true
            }
        }
    }

    /// Remove a file from every cache structure (e.g. after deletion).
    pub fn invalidate_file(&mut self, path: &Path) {
        let key = path.to_string_lossy().into_owned();
        self.file_fingerprints.remove(&key);
        self.dependencies.remove(&key);
        for deps in self.dependencies.values_mut() {
            deps.remove(&key);
        }
        for pages in self.taxonomy_deps.values_mut() {
            pages.remove(&key);
        }
        self.page_tags.remove(&key);
        self.parsed_content.remove(&key);
        self.validation_results.remove(&key);
        self.synthetic_pages.remove(&key);
        self.ast_cache.remove(&key);
    }

    fn metadata_hash(metadata: &Metadata) -> String {
        // BTreeMap serializes with sorted keys, so the hash is stable.
        let json = serde_json::to_string(metadata).unwrap_or_default();
        format!("{:x}", Sha256::digest(json.as_bytes()))
    }

    /// Store parsed content for a page.
    #[allow(clippy::too_many_arguments)]
    pub fn store_parsed_content(
        &mut self,
        path: &Path,
        html: String,
        toc: String,
        toc_items: Vec<TocItem>,
        metadata: &Metadata,
        template: &str,
        parser_version: &str,
        ast: Option<Document>,
    ) {
        let mut size_bytes = (html.len() + toc.len()) as u64;
        if let Some(ast) = &ast {
            size_bytes += serde_json::to_string(ast).map_or(0, |s| s.len() as u64);
        }
        self.parsed_content.insert(
            path.to_string_lossy().into_owned(),
            ParsedContentEntry {
                html,
                toc,
                toc_items,
                ast,
                metadata_hash: Self::metadata_hash(metadata),
                template: template.to_string(),
                parser_version: parser_version.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                size_bytes,
            },
        );
    }

    /// Fetch cached parsed content when still valid.
    ///
    /// A hit requires: unchanged source file, matching metadata hash,
    /// matching template name, matching parser version, and no changed
    /// tracked dependency (templates, includes).
    #[must_use]
    pub fn get_parsed_content(
        &self,
        path: &Path,
        metadata: &Metadata,
        template: &str,
        parser_version: &str,
    ) -> Option<&ParsedContentEntry> {
        let key = path.to_string_lossy();
        let cached = self.parsed_content.get(key.as_ref())?;
        if self.is_changed(path) {
            return None;
        }
        if cached.metadata_hash != Self::metadata_hash(metadata) {
            return None;
        }
        if cached.template != template {
            return None;
        }
        if cached.parser_version != parser_version {
            return None;
        }
        if let Some(deps) = self.dependencies.get(key.as_ref()) {
            for dep in deps {
                let dep_path = Path::new(dep);
                if dep_path.exists() && self.is_changed(dep_path) {
                    return None;
                }
            }
        }
        Some(cached)
    }

    /// Drop cached parsed content for a page.
    pub fn invalidate_parsed_content(&mut self, path: &Path) {
        self.parsed_content
            .remove(path.to_string_lossy().as_ref());
    }

    /// Cache validator results for a file.
    pub fn cache_validation_results(
        &mut self,
        path: &Path,
        validator_name: &str,
        results: Vec<CheckResult>,
    ) {
        self.validation_results
            .entry(path.to_string_lossy().into_owned())
            .or_default()
            .insert(validator_name.to_string(), results);
    }

    /// Fetch cached validator results; invalidated when the file changed.
    pub fn get_cached_validation_results(
        &mut self,
        path: &Path,
        validator_name: &str,
    ) -> Option<Vec<CheckResult>> {
        let key = path.to_string_lossy().into_owned();
        if self.is_changed(path) {
            self.validation_results.remove(&key);
            return None;
        }
        self.validation_results
            .get(&key)
            .and_then(|validators| validators.get(validator_name))
            .cloned()
    }

    /// Invalidate validation results for one file, or all of them.
    pub fn invalidate_validation_results(&mut self, path: Option<&Path>) {
        match path {
            Some(path) => {
                self.validation_results
                    .remove(path.to_string_lossy().as_ref());
            }
            None => self.validation_results.clear(),
        }
    }

    /// Record that an autodoc source generates a page.
    pub fn add_autodoc_dependency(&mut self, source: &Path, generated_page: &str) {
        self.autodoc_dependencies
            .entry(source.to_string_lossy().into_owned())
            .or_default()
            .insert(generated_page.to_string());
    }

    /// Pages generated from an autodoc source.
    #[must_use]
    pub fn get_autodoc_pages(&self, source: &Path) -> BTreeSet<String> {
        self.autodoc_dependencies
            .get(source.to_string_lossy().as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Fetch a synthetic page payload, self-healing corrupted entries.
    ///
    /// Payloads must be JSON objects; anything else is treated as
    /// corruption, invalidated, and reported so the caller re-extracts.
    pub fn get_page_cache(&mut self, cache_key: &str) -> Option<serde_json::Value> {
        match self.synthetic_pages.get(cache_key) {
            Some(value) if value.is_object() => Some(value.clone()),
            Some(_) => {
                warn!(
                    cache_key,
                    "corrupted synthetic page payload; invalidating for re-extraction"
                );
                self.synthetic_pages.remove(cache_key);
                None
            }
            None => None,
        }
    }

    /// Store a synthetic page payload.
    pub fn set_page_cache(&mut self, cache_key: &str, page_data: serde_json::Value) {
        self.synthetic_pages.insert(cache_key.to_string(), page_data);
    }

    /// Drop a synthetic page payload.
    pub fn invalidate_page_cache(&mut self, cache_key: &str) {
        self.synthetic_pages.remove(cache_key);
    }

    /// Cache size counters, logged at debug.
    #[must_use]
    pub fn get_stats(&self) -> BTreeMap<&'static str, usize> {
        let stats = BTreeMap::from([
            ("tracked_files", self.file_fingerprints.len()),
            (
                "dependencies",
                self.dependencies.values().map(BTreeSet::len).sum::<usize>(),
            ),
            ("taxonomy_terms", self.taxonomy_deps.len()),
            ("cached_content_pages", self.parsed_content.len()),
        ]);
        debug!(?stats, "cache stats");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("write file");
        path
    }

    #[test]
    fn test_hash_file_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "page.md", "# Hello\n");
        let first = BuildCache::hash_file(&path);
        let second = BuildCache::hash_file(&path);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_hash_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(BuildCache::hash_file(&dir.path().join("nope.md")), "");
    }

    #[test]
    fn test_change_detection() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "page.md", "v1");
        let mut cache = BuildCache::default();

        assert!(cache.is_changed(&path)); // unknown file
        cache.update_file(&path);
        assert!(!cache.is_changed(&path)); // fingerprinted
        std::fs::write(&path, "v2").unwrap();
        assert!(cache.is_changed(&path)); // content changed
        std::fs::remove_file(&path).unwrap();
        assert!(cache.is_changed(&path)); // deleted
    }

    #[test]
    fn test_roundtrip_preserves_every_field() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.md", "# Hi\n");
        let template = write(&dir, "page.html", "{{ content }}");
        let cache_path = dir.path().join("cache.json");

        let mut cache = BuildCache::default();
        cache.update_file(&page);
        cache.add_dependency(&page, &template);
        cache.add_taxonomy_dependency("tag:rust", &page);
        cache.update_page_tags(&page, &BTreeSet::from(["Rust".to_string()]));
        cache.store_parsed_content(
            &page,
            "<p>Hi</p>".into(),
            String::new(),
            vec![],
            &Metadata::default(),
            "page.html",
            "patitas-0.4-ast1",
            None,
        );
        cache.cache_validation_results(
            &page,
            "links",
            vec![CheckResult {
                status: "success".into(),
                message: "ok".into(),
                recommendation: None,
            }],
        );
        cache.add_autodoc_dependency(&page, "api/index.md");
        cache.set_page_cache("api/index.md", serde_json::json!({"title": "API"}));
        assert!(cache.validate_config("abc123"));

        cache.save_with(&cache_path, false).unwrap();
        let mut loaded = BuildCache::load_with(&cache_path, false);

        // last_build is stamped at save time; align before comparing.
        assert!(loaded.last_build.is_some());
        loaded.last_build = cache.last_build.clone();
        assert_eq!(loaded, cache);
    }

    #[test]
    fn test_load_tolerates_garbage() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "cache.json", "{not valid json");
        let cache = BuildCache::load_with(&path, false);
        assert_eq!(cache, BuildCache::default());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = BuildCache::load(&dir.path().join("absent.json"));
        assert_eq!(cache, BuildCache::default());
    }

    #[test]
    fn test_load_future_version_best_effort() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "cache.json",
            r#"{"version": 99, "file_fingerprints": {"a.md": {"hash": "deadbeef", "mtime": 0.0, "size": 4}}, "mystery_field": [1, 2]}"#,
        );
        let cache = BuildCache::load_with(&path, false);
        assert_eq!(cache.version, CACHE_VERSION);
        assert!(cache.file_fingerprints.contains_key("a.md"));
    }

    #[test]
    fn test_compressed_sidecar_preferred() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.json");
        let mut cache = BuildCache {
            compress: true,
            ..BuildCache::default()
        };
        cache.validate_config("zzz");
        cache.save_with(&cache_path, false).unwrap();
        assert!(zst_sidecar(&cache_path).exists());

        // Corrupt the plain file; the sidecar should still load cleanly.
        std::fs::write(&cache_path, "garbage").unwrap();
        let loaded = BuildCache::load_with(&cache_path, false);
        assert_eq!(loaded.config_hash.as_deref(), Some("zzz"));
    }

    #[test]
    fn test_affected_pages_includes_self_and_dependents() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.md", "x");
        let partial = write(&dir, "partial.html", "y");
        let mut cache = BuildCache::default();
        cache.add_dependency(&page, &partial);

        let affected = cache.get_affected_pages(&partial);
        assert!(affected.contains(page.to_string_lossy().as_ref()));
        let affected = cache.get_affected_pages(&page);
        assert!(affected.contains(page.to_string_lossy().as_ref()));
    }

    #[test]
    fn test_taxonomy_bidirectionality() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.md", "a");
        let b = write(&dir, "b.md", "b");
        let mut cache = BuildCache::default();

        cache.update_page_tags(&a, &BTreeSet::from(["Python".to_string(), "Web Dev".to_string()]));
        cache.update_page_tags(&b, &BTreeSet::from(["Python".to_string()]));

        // Forward and inverted indexes agree.
        for (page, tags) in cache.page_tags.clone() {
            for tag in tags {
                let slug = tag.to_lowercase().replace(' ', "-");
                assert!(cache.get_pages_for_tag(&slug).contains(&page));
            }
        }
        let slugs: BTreeSet<String> = cache.tag_to_pages.keys().cloned().collect();
        assert_eq!(cache.known_tags, slugs);

        // Dropping the last page of a tag prunes it entirely.
        let affected = cache.update_page_tags(&a, &BTreeSet::from(["Python".to_string()]));
        assert!(affected.contains("web-dev"));
        assert!(affected.contains("python")); // unchanged tags rebuild too
        assert!(!cache.known_tags.contains("web-dev"));
        assert!(!cache.tag_to_pages.contains_key("web-dev"));
    }

    #[test]
    fn test_config_change_clears_cache() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.md", "x");
        let mut cache = BuildCache::default();
        cache.update_file(&page);

        assert!(cache.validate_config("A"));
        assert!(!cache.file_fingerprints.is_empty());

        assert!(!cache.validate_config("B"));
        assert!(cache.file_fingerprints.is_empty());
        assert_eq!(cache.config_hash.as_deref(), Some("B"));

        assert!(cache.validate_config("B"));
        assert_eq!(cache.config_hash.as_deref(), Some("B"));
    }

    #[test]
    fn test_parsed_content_hit_and_misses() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.md", "# Hi\n");
        let template = write(&dir, "page.html", "v1");
        let mut cache = BuildCache::default();
        cache.update_file(&page);
        cache.update_file(&template);
        cache.add_dependency(&page, &template);

        let metadata = Metadata::from([("title".to_string(), serde_json::json!("Hi"))]);
        cache.store_parsed_content(
            &page,
            "<h1>Hi</h1>".into(),
            "<ul class=\"toc\"></ul>".into(),
            vec![],
            &metadata,
            "page.html",
            "patitas-0.4-ast1",
            None,
        );

        // Hit.
        assert!(cache
            .get_parsed_content(&page, &metadata, "page.html", "patitas-0.4-ast1")
            .is_some());

        // Metadata change -> miss.
        let other = Metadata::from([("title".to_string(), serde_json::json!("Other"))]);
        assert!(cache
            .get_parsed_content(&page, &other, "page.html", "patitas-0.4-ast1")
            .is_none());

        // Template name change -> miss.
        assert!(cache
            .get_parsed_content(&page, &metadata, "post.html", "patitas-0.4-ast1")
            .is_none());

        // Parser version change -> miss.
        assert!(cache
            .get_parsed_content(&page, &metadata, "page.html", "patitas-0.5-ast2")
            .is_none());

        // Source byte change -> miss.
        std::fs::write(&page, "# Hi!\n").unwrap();
        assert!(cache
            .get_parsed_content(&page, &metadata, "page.html", "patitas-0.4-ast1")
            .is_none());

        // Restore the byte, then touch the template dependency -> miss.
        std::fs::write(&page, "# Hi\n").unwrap();
        assert!(cache
            .get_parsed_content(&page, &metadata, "page.html", "patitas-0.4-ast1")
            .is_some());
        std::fs::write(&template, "v2").unwrap();
        assert!(cache
            .get_parsed_content(&page, &metadata, "page.html", "patitas-0.4-ast1")
            .is_none());
    }

    #[test]
    fn test_validation_results_invalidate_on_change() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.md", "v1");
        let mut cache = BuildCache::default();
        cache.update_file(&page);
        cache.cache_validation_results(
            &page,
            "links",
            vec![CheckResult {
                status: "warning".into(),
                message: "broken link".into(),
                recommendation: Some("fix it".into()),
            }],
        );

        let cached = cache.get_cached_validation_results(&page, "links");
        assert_eq!(cached.map(|r| r.len()), Some(1));

        std::fs::write(&page, "v2").unwrap();
        assert!(cache.get_cached_validation_results(&page, "links").is_none());
        assert!(!cache.validation_results.contains_key(page.to_string_lossy().as_ref()));
    }

    #[test]
    fn test_synthetic_page_self_healing() {
        let mut cache = BuildCache::default();
        cache.set_page_cache("good", serde_json::json!({"title": "x"}));
        cache.set_page_cache("bad", serde_json::json!("not an object"));

        assert!(cache.get_page_cache("good").is_some());
        // Corrupted payloads invalidate themselves for re-extraction.
        assert!(cache.get_page_cache("bad").is_none());
        assert!(!cache.synthetic_pages.contains_key("bad"));
    }

    #[test]
    fn test_invalidate_file_prunes_everywhere() {
        let dir = TempDir::new().unwrap();
        let page = write(&dir, "page.md", "x");
        let dep = write(&dir, "dep.html", "y");
        let mut cache = BuildCache::default();
        cache.update_file(&page);
        cache.add_dependency(&dep, &page);
        cache.update_page_tags(&page, &BTreeSet::from(["t".to_string()]));

        cache.invalidate_file(&page);
        let key = page.to_string_lossy().into_owned();
        assert!(!cache.file_fingerprints.contains_key(&key));
        assert!(!cache.page_tags.contains_key(&key));
        for deps in cache.dependencies.values() {
            assert!(!deps.contains(&key));
        }
    }
}
