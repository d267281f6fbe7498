//! LRU cache of loaded pages

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::types::PageData;

/// Loaded pages keyed by page index
pub struct PageCache {
    cache: LruCache<usize, Arc<PageData>>,
}

impl PageCache {
    /// Create a cache holding at most `capacity` pages, or every page when `None`
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let cache = match capacity {
            Some(cap) => LruCache::new(NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN)),
            None => LruCache::unbounded(),
        };
        Self { cache }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, page: usize) -> Option<Arc<PageData>> {
        self.cache.get(&page).cloned()
    }

    /// Check if a page is cached without promoting it
    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.cache.contains(&page)
    }

    /// Insert a page, returning the page evicted to make room, if any
    pub fn insert(&mut self, data: Arc<PageData>) -> Option<usize> {
        match self.cache.push(data.index, data) {
            Some((evicted, _)) if !self.cache.contains(&evicted) => Some(evicted),
            _ => None,
        }
    }

    /// Cached pages in most-recently-used order, without promoting them
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PageData>> {
        self.cache.iter().map(|(_, page)| page)
    }

    /// Clear all cached pages
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
