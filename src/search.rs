//! Code search engine.
//!
//! A thin, cached layer over a line-oriented text search.
//!
//! # Primitives
//!
//! ```text
//! search(pattern, ext)                    one regex, cached by (pattern, ext, root)
//! search_multi_pattern([p1, p2..], ext)   line-level AND
//! search_file_level_filter(p, [..], ext)  hits of p in files that also contain
//!                                         every required pattern
//! ```
//!
//! Point lookups (controller file, method definition, callback declaration)
//! live in [`locate`] and keep their own caches.
//!
//! # Concurrency
//!
//! Every cache belongs to one [`CodeSearchEngine`] and is mutated through
//! `&mut self`. An engine is not meant to be shared between threads. Create
//! one per request, or put it behind a lock.

mod backend;
mod locate;

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf}
};

pub use backend::{SearchBackend, is_test_path};
pub use locate::WRITE_CALLBACKS;
use regex::RegexBuilder;
use serde::Serialize;

use crate::{
    cache::SearchCache,
    config::SearchConfig,
    error::{AppResult, project_root_error}
};

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CodeHit {
    /// Path relative to the project root, `/`-separated
    pub file:    String,
    /// 1-based
    pub line:    usize,
    pub content: String
}

/// Secondary pattern for [`CodeSearchEngine::search_file_level_filter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    pub pattern:  String,
    /// Optional patterns never exclude a file
    pub optional: bool
}

impl FilePattern {
    pub fn required(pattern: impl Into<String>) -> Self {
        Self {
            pattern:  pattern.into(),
            optional: false
        }
    }

    pub fn optional(pattern: impl Into<String>) -> Self {
        Self {
            pattern:  pattern.into(),
            optional: true
        }
    }
}

/// Cached search over one project tree
#[derive(Debug)]
pub struct CodeSearchEngine {
    root:             PathBuf,
    backend:          SearchBackend,
    cache:            SearchCache<Vec<CodeHit>>,
    controller_cache: HashMap<String, Option<String>>,
    method_cache:     HashMap<(String, String), Option<usize>>,
    callback_cache:   HashMap<(String, String, String), Option<usize>>
}

impl CodeSearchEngine {
    /// Engine over `root`, which must be an existing directory
    pub fn new(root: impl AsRef<Path>, config: &SearchConfig) -> AppResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(project_root_error(&root.display().to_string()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| project_root_error(&root.display().to_string()))?;
        tracing::debug!(root = %root.display(), backend = ?config.backend, "search engine ready");
        Ok(Self {
            root,
            backend:          SearchBackend::from_config(config),
            cache:            SearchCache::new(config.cache_capacity),
            controller_cache: HashMap::new(),
            method_cache:     HashMap::new(),
            callback_cache:   HashMap::new()
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> &SearchBackend {
        &self.backend
    }

    /// Backend calls made so far (cache misses)
    pub fn cache_misses(&self) -> u64 {
        self.cache.misses()
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hits()
    }

    /// All lines matching `pattern` in files with extension `file_ext`
    pub async fn search(&mut self, pattern: &str, file_ext: &str) -> Vec<CodeHit> {
        let key = SearchCache::<Vec<CodeHit>>::key(pattern, file_ext, &self.root);
        if let Some(hits) = self.cache.get(key) {
            return hits;
        }
        match self.backend.search(&self.root, pattern, file_ext).await {
            Ok(hits) => {
                tracing::debug!(pattern, file_ext, hits = hits.len(), "search");
                self.cache.insert(key, hits.clone());
                hits
            }
            // failures are never cached
            Err(err) => {
                tracing::warn!(backend = self.backend.name(), pattern, error = %err, "search failed");
                Vec::new()
            }
        }
    }

    /// Lines matching every pattern.
    ///
    /// The first pattern drives the search; the rest filter its lines.
    pub async fn search_multi_pattern(&mut self, patterns: &[&str], file_ext: &str) -> Vec<CodeHit> {
        let Some((first, rest)) = patterns.split_first() else {
            return Vec::new();
        };
        let mut filters = Vec::with_capacity(rest.len());
        for pattern in rest {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => filters.push(re),
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "invalid search pattern");
                    return Vec::new();
                }
            }
        }
        self.search(first, file_ext)
            .await
            .into_iter()
            .filter(|hit| filters.iter().all(|re| re.is_match(&hit.content)))
            .collect()
    }

    /// Hits of `primary` in files that contain every required pattern.
    ///
    /// Secondary patterns may match on any line of the file. Optional ones
    /// never exclude a file.
    pub async fn search_file_level_filter(
        &mut self,
        primary: &str,
        others: &[FilePattern],
        file_ext: &str
    ) -> Vec<CodeHit> {
        let mut hits = self.search(primary, file_ext).await;
        for other in others.iter().filter(|p| !p.optional) {
            if hits.is_empty() {
                break;
            }
            let files: HashSet<String> = self
                .search(&other.pattern, file_ext)
                .await
                .into_iter()
                .map(|h| h.file)
                .collect();
            hits.retain(|h| files.contains(&h.file));
        }
        hits
    }
}
