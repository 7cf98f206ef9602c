//! Minified asset cache invalidation
//!
//! Processed copies of files under the content root are cached in a
//! separate directory keyed by their path relative to that root. Deleting an
//! entry forces it to be regenerated on next access.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

/// Derived-asset cache rooted at the minified directory
#[derive(Debug, Clone)]
pub struct AssetCache {
    content_prefix: String,
    minified_dir: PathBuf,
}

impl AssetCache {
    /// Create a cache mapping `<content_prefix><rel>` onto `<minified_dir>/<rel>`
    pub fn new(content_prefix: impl Into<String>, minified_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_prefix: content_prefix.into(),
            minified_dir: minified_dir.into(),
        }
    }

    /// Directory holding the cached entries
    pub fn minified_dir(&self) -> &Path {
        &self.minified_dir
    }

    /// Cache entry for a changed repository path, if it is under the content root
    pub fn entry_for(&self, changed: &str) -> Option<PathBuf> {
        let relative = changed.strip_prefix(self.content_prefix.as_str())?;
        let relative = Path::new(relative);

        // Only plain relative paths may address the cache
        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.minified_dir.join(relative))
    }

    /// Delete the cache entries of every changed path, returning the ones removed
    pub fn invalidate<S: AsRef<str>>(&self, changed_files: &[S]) -> Vec<PathBuf> {
        let mut removed = Vec::new();

        for changed in changed_files {
            let Some(entry) = self.entry_for(changed.as_ref()) else {
                continue;
            };

            debug!(path = %entry.display(), "Checking minified path");
            if !entry.is_file() {
                continue;
            }

            match fs::remove_file(&entry) {
                Ok(()) => {
                    info!(path = %entry.display(), "Removed cached path");
                    removed.push(entry);
                }
                Err(e) => warn!(path = %entry.display(), error = %e, "Failed to remove cached path"),
            }
        }

        removed
    }
}

impl AssetCache {
    /// Delete every cache entry, returning the top-level entries removed
    pub fn invalidate_all(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.minified_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %self.minified_dir.display(), error = %e, "No minified cache to clear");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };

            match result {
                Ok(()) => removed.push(path),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cached path"),
            }
        }

        info!(count = removed.len(), "Cleared minified asset cache");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_for_content_path() {
        let cache = AssetCache::new("src/content/", "/srv/site/minified");
        assert_eq!(
            cache.entry_for("src/content/img/a.png"),
            Some(PathBuf::from("/srv/site/minified/img/a.png"))
        );
        assert_eq!(cache.entry_for("README.md"), None);
        assert_eq!(cache.entry_for("src/content/"), None);
        assert_eq!(cache.entry_for("src/content/../../etc/passwd"), None);
    }

    #[test]
    fn test_invalidate_removes_only_matching_entries() {
        let temp = TempDir::new().unwrap();
        let minified = temp.path().join("minified");
        fs::create_dir_all(&minified).unwrap();
        fs::write(minified.join("a.png"), "cached").unwrap();
        fs::write(minified.join("b.css"), "cached").unwrap();

        let cache = AssetCache::new("src/content/", &minified);
        let removed = cache.invalidate(&["src/content/a.png", "src/content/missing.js", "index.ts"]);

        assert_eq!(removed, vec![minified.join("a.png")]);
        assert!(!minified.join("a.png").exists());
        assert!(minified.join("b.css").exists());
    }

    #[test]
    fn test_invalidate_all_clears_cache() {
        let temp = TempDir::new().unwrap();
        let minified = temp.path().join("minified");
        fs::create_dir_all(minified.join("img")).unwrap();
        fs::write(minified.join("img/a.png"), "cached").unwrap();
        fs::write(minified.join("b.css"), "cached").unwrap();

        let cache = AssetCache::new("src/content/", &minified);
        let mut removed = cache.invalidate_all();
        removed.sort();

        assert_eq!(removed, vec![minified.join("b.css"), minified.join("img")]);
        assert!(minified.exists());
        assert_eq!(fs::read_dir(&minified).unwrap().count(), 0);
    }

    #[test]
    fn test_invalidate_all_without_cache_dir() {
        let temp = TempDir::new().unwrap();
        let cache = AssetCache::new("src/content/", temp.path().join("absent"));
        assert!(cache.invalidate_all().is_empty());
    }
}
