//! AST sidecar store inside the build cache.
//!
//! Persists parsed trees keyed by site-relative source path so unchanged
//! files skip parsing entirely on the next build. A truncated content hash
//! guards every load: stale entries miss instead of serving a tree for
//! different source bytes.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ast::Document;

use super::{AstCacheEntry, BuildCache};

/// Truncated SHA-256 used as the AST cache validity check.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    digest[..16].to_string()
}

/// Store a page's AST keyed by its site-relative path.
pub fn save_ast_to_cache(
    cache: &mut BuildCache,
    relative_path: &str,
    content: &str,
    ast: &Document,
) {
    cache.ast_cache.insert(
        relative_path.to_string(),
        AstCacheEntry {
            content_hash: content_hash(content),
            ast: ast.clone(),
        },
    );
    debug!(page = relative_path, "ast cached");
}

/// Load a page's AST when the stored hash matches the current content.
#[must_use]
pub fn load_ast_from_cache(
    cache: &BuildCache,
    relative_path: &str,
    content: &str,
) -> Option<Document> {
    let entry = cache.ast_cache.get(relative_path)?;
    if entry.content_hash != content_hash(content) {
        return None;
    }
    debug!(page = relative_path, "ast cache hit");
    Some(entry.ast.clone())
}

/// Drop a page's cached AST.
pub fn invalidate_ast(cache: &mut BuildCache, relative_path: &str) {
    cache.ast_cache.remove(relative_path);
}
