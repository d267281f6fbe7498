//! Page service - manages loader workers, in-flight requests and the cache

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::cache::PageCache;
use super::request::{PageRequest, PageResponse, RequestId};
use super::types::{PageData, PageUrls};
use super::worker::page_worker;
use crate::loader::PageLoader;
use crate::settings::CacheConfig;

/// Result of asking the service for a page
#[derive(Clone, Debug)]
pub enum Fetch {
    /// Index outside the document
    OutOfRange,
    /// Already cached; no round-trip
    Ready(Arc<PageData>),
    /// A request is outstanding; concurrent callers share its id
    Pending(RequestId),
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    id: RequestId,
    prefetch: bool,
}

/// Loads pages through a [`PageLoader`] on worker threads and caches them
pub struct PageService {
    pages: Vec<PageUrls>,
    request_tx: Sender<PageRequest>,
    response_rx: Receiver<PageResponse>,
    next_request_id: u64,
    in_flight: HashMap<usize, InFlight>,
    cache: PageCache,
    num_workers: usize,
}

impl PageService {
    /// Create a service with default cache and worker configuration
    #[must_use]
    pub fn new(pages: Vec<PageUrls>, loader: Arc<dyn PageLoader>) -> Self {
        Self::with_config(pages, loader, &CacheConfig::default())
    }

    #[must_use]
    pub fn with_config(
        pages: Vec<PageUrls>,
        loader: Arc<dyn PageLoader>,
        config: &CacheConfig,
    ) -> Self {
        // flume gives us MPMC: every worker pulls from the same request queue
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = config.workers.max(1);
        for _ in 0..num_workers {
            let loader = Arc::clone(&loader);
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            std::thread::spawn(move || page_worker(loader, rx, tx));
        }

        Self {
            pages,
            request_tx,
            response_rx,
            next_request_id: 1,
            in_flight: HashMap::new(),
            cache: PageCache::new(config.capacity),
            num_workers,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Get a page: cached, already pending, or newly requested
    pub fn fetch(&mut self, index: usize) -> Fetch {
        if index >= self.pages.len() {
            return Fetch::OutOfRange;
        }
        if let Some(data) = self.cache.get(index) {
            return Fetch::Ready(data);
        }
        if let Some(pending) = self.in_flight.get_mut(&index) {
            pending.prefetch = false;
            return Fetch::Pending(pending.id);
        }

        let id = self.next_id();
        let urls = self.pages[index].clone();
        self.send(PageRequest::Load { id, index, urls });
        self.in_flight.insert(index, InFlight { id, prefetch: false });
        Fetch::Pending(id)
    }

    /// Fire-and-forget load of a page nobody is waiting for.
    ///
    /// Returns whether a request was issued.
    pub fn prefetch(&mut self, index: usize) -> bool {
        if index >= self.pages.len() || self.is_cached(index) || self.is_in_flight(index) {
            return false;
        }

        let id = self.next_id();
        let urls = self.pages[index].clone();
        debug!("Prefetching page {index}");
        self.send(PageRequest::Prefetch { id, index, urls });
        self.in_flight.insert(index, InFlight { id, prefetch: true });
        true
    }

    #[must_use]
    pub fn is_cached(&self, index: usize) -> bool {
        self.cache.contains(index)
    }

    #[must_use]
    pub fn is_in_flight(&self, index: usize) -> bool {
        self.in_flight.contains_key(&index)
    }

    /// Whether the outstanding request for a page was issued as a prefetch
    #[must_use]
    pub fn is_prefetching(&self, index: usize) -> bool {
        self.in_flight.get(&index).is_some_and(|f| f.prefetch)
    }

    /// Get a cached page if available, promoting it in the LRU order
    pub fn get_cached(&mut self, index: usize) -> Option<Arc<PageData>> {
        self.cache.get(index)
    }

    /// Cached pages, most recently used first
    pub fn cached_pages(&self) -> impl Iterator<Item = &Arc<PageData>> {
        self.cache.iter()
    }

    /// Drain completed requests without blocking.
    ///
    /// Successful pages are cached before they are returned; failures are
    /// logged and never cached so the next fetch retries.
    pub fn poll_responses(&mut self) -> Vec<PageResponse> {
        let mut responses = vec![];
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(response) = self.accept(response) {
                responses.push(response);
            }
        }
        responses
    }

    /// Block until at least one response arrives or `timeout` passes
    pub fn wait_responses(&mut self, timeout: Duration) -> Vec<PageResponse> {
        let deadline = Instant::now() + timeout;
        let mut responses = vec![];
        while responses.is_empty() {
            match self.response_rx.recv_deadline(deadline) {
                Ok(response) => {
                    if let Some(response) = self.accept(response) {
                        responses.push(response);
                    }
                }
                Err(_) => break,
            }
        }
        responses.extend(self.poll_responses());
        responses
    }

    /// Switch to another document; cache and pending requests are dropped
    pub fn reset(&mut self, pages: Vec<PageUrls>) {
        self.pages = pages;
        self.cache.invalidate_all();
        self.in_flight.clear();
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(PageRequest::Shutdown);
        }
    }

    fn accept(&mut self, response: PageResponse) -> Option<PageResponse> {
        let (id, index) = match &response {
            PageResponse::Loaded { id, index, .. } | PageResponse::Failed { id, index, .. } => {
                (*id, *index)
            }
        };

        // Responses for requests issued before a reset carry unknown ids
        if self.in_flight.get(&index).map(|f| f.id) != Some(id) {
            debug!("Dropping response {id:?} for page {index} from a previous document");
            return None;
        }
        self.in_flight.remove(&index);

        match &response {
            PageResponse::Loaded { data, .. } => {
                if let Some(evicted) = self.cache.insert(Arc::clone(data)) {
                    debug!("Evicted page {evicted} from cache");
                }
            }
            PageResponse::Failed { error, .. } => {
                warn!("Failed to load page {index}: {error}");
            }
        }
        Some(response)
    }

    fn send(&self, request: PageRequest) {
        if self.request_tx.send(request).is_err() {
            warn!("Page workers are gone, request dropped");
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for PageService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
