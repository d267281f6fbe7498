//! Thumbnail strip loader
//!
//! Tracks which thumbnail slots are visible in a virtualized list and fetches
//! the missing ones in debounced batches through a [`ThumbnailFetcher`].
//! Time is passed in by the caller so the debounce can be stepped by hand.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::request::FetchError;
use super::types::{ImageRef, Thumbnail};
use super::worker::{ThumbnailJob, thumbnail_worker};
use crate::loader::{ThumbnailFetcher, ThumbnailRequest};
use crate::settings::ThumbnailConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

/// What the worker sends back for one batch
#[derive(Debug)]
pub struct ThumbnailBatchResult {
    pub id: BatchId,
    pub requested: Vec<usize>,
    pub outcome: Result<Vec<Thumbnail>, FetchError>,
}

/// Rows that should be rendered for the given scroll position.
///
/// `buffer_rows` extra rows are kept above and below the viewport.
#[must_use]
pub fn visible_range(
    scroll_top: f64,
    viewport_height: f64,
    row_height: f64,
    buffer_rows: usize,
    count: usize,
) -> Range<usize> {
    if count == 0 || row_height <= 0.0 || !row_height.is_finite() {
        return 0..0;
    }
    let scroll_top = scroll_top.max(0.0);
    let viewport_height = viewport_height.max(0.0);

    let first = (scroll_top / row_height).floor() as usize;
    let last = ((scroll_top + viewport_height) / row_height).ceil() as usize;

    let start = first.saturating_sub(buffer_rows).min(count);
    let end = last.saturating_add(buffer_rows).min(count);
    start..end
}

struct InFlightBatch {
    id: BatchId,
    indices: BTreeSet<usize>,
}

pub struct ThumbnailLoader {
    image_urls: Vec<String>,
    config: ThumbnailConfig,
    thumbnails: HashMap<usize, ImageRef>,
    visible: Range<usize>,
    pending: BTreeSet<usize>,
    last_change: Option<Instant>,
    queue: VecDeque<usize>,
    in_flight: Option<InFlightBatch>,
    next_batch_id: u64,
    job_tx: Sender<ThumbnailJob>,
    result_rx: Receiver<ThumbnailBatchResult>,
}

impl ThumbnailLoader {
    #[must_use]
    pub fn new(image_urls: Vec<String>, fetcher: Arc<dyn ThumbnailFetcher>) -> Self {
        Self::with_config(image_urls, fetcher, &ThumbnailConfig::default())
    }

    #[must_use]
    pub fn with_config(
        image_urls: Vec<String>,
        fetcher: Arc<dyn ThumbnailFetcher>,
        config: &ThumbnailConfig,
    ) -> Self {
        let (job_tx, job_rx) = flume::unbounded();
        let (result_tx, result_rx) = flume::unbounded();
        std::thread::spawn(move || thumbnail_worker(fetcher, job_rx, result_tx));

        Self {
            image_urls,
            config: config.clone(),
            thumbnails: HashMap::new(),
            visible: 0..0,
            pending: BTreeSet::new(),
            last_change: None,
            queue: VecDeque::new(),
            in_flight: None,
            next_batch_id: 1,
            job_tx,
            result_rx,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.image_urls.len()
    }

    /// Total scrollable height of the strip
    #[must_use]
    pub fn content_height(&self) -> f64 {
        self.image_urls.len() as f64 * self.config.row_height
    }

    /// Recompute the visible window after a scroll or resize.
    ///
    /// Slots entering the window that have no thumbnail and no outstanding
    /// request become pending and restart the debounce timer.
    pub fn update_viewport(&mut self, scroll_top: f64, viewport_height: f64, now: Instant) {
        let range = visible_range(
            scroll_top,
            viewport_height,
            self.config.row_height,
            self.config.buffer_rows,
            self.image_urls.len(),
        );
        let previous = std::mem::replace(&mut self.visible, range.clone());

        let mut added = false;
        for index in range.filter(|i| !previous.contains(i)) {
            if self.is_cached(index) || self.is_in_flight(index) || self.queue.contains(&index) {
                continue;
            }
            added |= self.pending.insert(index);
        }

        if added {
            self.last_change = Some(now);
        }
    }

    /// Handle finished batches, drain the queue and flush the pending set
    /// once the debounce window has passed.
    ///
    /// Returns the indices whose thumbnails became available.
    pub fn poll(&mut self, now: Instant) -> Vec<usize> {
        let mut arrived = vec![];
        while let Ok(result) = self.result_rx.try_recv() {
            arrived.extend(self.accept(result));
        }
        self.pump(now);
        arrived
    }

    /// Block until a batch finishes or `timeout` passes, then [`poll`](Self::poll)
    pub fn wait_for_batch(&mut self, timeout: Duration, now: Instant) -> Vec<usize> {
        let mut arrived = vec![];
        if self.in_flight.is_some() {
            if let Ok(result) = self.result_rx.recv_timeout(timeout) {
                arrived.extend(self.accept(result));
            }
        }
        arrived.extend(self.poll(now));
        arrived
    }

    /// When the pending set becomes due, if anything is pending
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_change.map(|changed| changed + Duration::from_millis(self.config.debounce_ms))
    }

    #[must_use]
    pub fn thumbnail(&self, index: usize) -> Option<&ImageRef> {
        self.thumbnails.get(&index)
    }

    #[must_use]
    pub fn is_cached(&self, index: usize) -> bool {
        self.thumbnails.contains_key(&index)
    }

    #[must_use]
    pub fn is_in_flight(&self, index: usize) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|batch| batch.indices.contains(&index))
    }

    #[must_use]
    pub fn visible(&self) -> Range<usize> {
        self.visible.clone()
    }

    /// Indices waiting for the debounce to expire
    #[must_use]
    pub fn pending(&self) -> Vec<usize> {
        self.pending.iter().copied().collect()
    }

    /// Indices waiting for the current batch to finish
    #[must_use]
    pub fn queued(&self) -> Vec<usize> {
        self.queue.iter().copied().collect()
    }

    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.thumbnails.len()
    }

    /// Switch to another document; everything is forgotten and any
    /// outstanding batch result will be ignored
    pub fn reset(&mut self, image_urls: Vec<String>) {
        self.image_urls = image_urls;
        self.thumbnails.clear();
        self.visible = 0..0;
        self.pending.clear();
        self.last_change = None;
        self.queue.clear();
        self.in_flight = None;
    }

    fn accept(&mut self, result: ThumbnailBatchResult) -> Vec<usize> {
        let Some(batch) = self.in_flight.take_if(|batch| batch.id == result.id) else {
            debug!("Ignoring thumbnail batch {:?} from a previous document", result.id);
            return vec![];
        };

        let thumbnails = match result.outcome {
            Ok(thumbnails) => thumbnails,
            Err(e) => {
                warn!("Thumbnail batch {:?} failed: {e}", result.id);
                return vec![];
            }
        };

        let mut arrived = vec![];
        for thumb in thumbnails {
            if !batch.indices.contains(&thumb.index) {
                debug!("Dropping unrequested thumbnail {}", thumb.index);
                continue;
            }
            self.thumbnails.insert(thumb.index, thumb.image);
            arrived.push(thumb.index);
        }

        if arrived.len() < batch.indices.len() {
            debug!(
                "Thumbnail batch {:?} returned {} of {} thumbnails",
                result.id,
                arrived.len(),
                batch.indices.len()
            );
        }
        arrived.sort_unstable();
        arrived
    }

    fn pump(&mut self, now: Instant) {
        if self.in_flight.is_none() && !self.queue.is_empty() {
            let visible = self.visible.clone();
            let queued: Vec<usize> = self.queue.drain(..).collect();
            let wanted: Vec<usize> = queued
                .into_iter()
                .filter(|i| visible.contains(i) && !self.thumbnails.contains_key(i))
                .collect();
            self.dispatch(wanted);
        }

        let due = self.next_deadline().is_some_and(|deadline| now >= deadline);
        if due {
            self.last_change = None;
            let pending = std::mem::take(&mut self.pending);
            let wanted: Vec<usize> = pending
                .into_iter()
                .filter(|i| {
                    self.visible.contains(i)
                        && !self.is_cached(*i)
                        && !self.is_in_flight(*i)
                        && !self.queue.contains(i)
                })
                .collect();
            if self.in_flight.is_some() {
                self.queue.extend(wanted);
            } else {
                self.dispatch(wanted);
            }
        }
    }

    /// Send the first batch of `indices`, queue the rest
    fn dispatch(&mut self, indices: Vec<usize>) {
        if indices.is_empty() {
            return;
        }
        let batch_size = self.config.batch_size.max(1);
        let mut indices = indices.into_iter();
        let batch: Vec<usize> = indices.by_ref().take(batch_size).collect();
        self.queue.extend(indices);

        let id = BatchId(self.next_batch_id);
        self.next_batch_id += 1;

        let requests = batch
            .iter()
            .filter_map(|&index| {
                self.image_urls.get(index).map(|url| ThumbnailRequest {
                    index,
                    image_url: url.clone(),
                })
            })
            .collect();

        debug!("Requesting thumbnail batch {id:?}: {batch:?}");
        if self
            .job_tx
            .send(ThumbnailJob::Batch { id, requests })
            .is_err()
        {
            warn!("Thumbnail worker is gone, batch dropped");
            return;
        }
        self.in_flight = Some(InFlightBatch {
            id,
            indices: batch.into_iter().collect(),
        });
    }
}

impl Drop for ThumbnailLoader {
    fn drop(&mut self) {
        let _ = self.job_tx.send(ThumbnailJob::Shutdown);
    }
}
