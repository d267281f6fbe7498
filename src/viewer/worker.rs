//! Loader workers - call the collaborators off the viewer's thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::debug;

use super::request::{FetchError, PageRequest, PageResponse, RequestId};
use super::thumbnails::{BatchId, ThumbnailBatchResult};
use super::types::PageUrls;
use crate::loader::{PageLoader, ThumbnailFetcher, ThumbnailRequest};

pub fn page_worker(
    loader: Arc<dyn PageLoader>,
    requests: Receiver<PageRequest>,
    responses: Sender<PageResponse>,
) {
    for request in requests {
        match request {
            PageRequest::Load { id, index, urls } | PageRequest::Prefetch { id, index, urls } => {
                let response = handle_page_request(loader.as_ref(), id, index, &urls);
                if responses.send(response).is_err() {
                    // Service dropped; nobody is listening anymore
                    break;
                }
            }

            PageRequest::Shutdown => break,
        }
    }
}

fn handle_page_request(
    loader: &dyn PageLoader,
    id: RequestId,
    index: usize,
    urls: &PageUrls,
) -> PageResponse {
    debug!("Loading page {index} ({})", urls.image);
    match loader.load_page(index, urls) {
        Ok(data) if data.index != index => PageResponse::Failed {
            id,
            index,
            error: FetchError::malformed(format!(
                "requested page {index}, payload is page {}",
                data.index
            )),
        },
        Ok(data) => PageResponse::Loaded {
            id,
            index,
            data: Arc::new(data),
        },
        Err(error) => PageResponse::Failed { id, index, error },
    }
}

/// Work item for the thumbnail worker
pub enum ThumbnailJob {
    Batch {
        id: BatchId,
        requests: Vec<ThumbnailRequest>,
    },
    Shutdown,
}

pub fn thumbnail_worker(
    fetcher: Arc<dyn ThumbnailFetcher>,
    jobs: Receiver<ThumbnailJob>,
    results: Sender<ThumbnailBatchResult>,
) {
    for job in jobs {
        match job {
            ThumbnailJob::Batch { id, requests } => {
                debug!("Fetching {} thumbnails in batch {id:?}", requests.len());
                let outcome = fetcher.fetch_thumbnails(&requests);
                let result = ThumbnailBatchResult {
                    id,
                    requested: requests.iter().map(|r| r.index).collect(),
                    outcome,
                };
                if results.send(result).is_err() {
                    break;
                }
            }
            ThumbnailJob::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::types::{ImageRef, PageData, PageTextLayer};

    struct FixedLoader {
        reported_index: usize,
        image: ImageRef,
    }

    impl PageLoader for FixedLoader {
        fn load_page(&self, _index: usize, _urls: &PageUrls) -> Result<PageData, FetchError> {
            Ok(PageData {
                index: self.reported_index,
                image: self.image.clone(),
                image_size: None,
                text_layer: PageTextLayer::empty(),
            })
        }
    }

    fn urls() -> PageUrls {
        PageUrls {
            image: "p.jpg".into(),
            text_layer: "p.json".into(),
        }
    }

    #[test]
    fn mismatched_index_is_malformed() {
        let loader = FixedLoader {
            reported_index: 7,
            image: ImageRef::url("p.jpg"),
        };
        let response = handle_page_request(&loader, RequestId::new(1), 2, &urls());
        assert!(matches!(
            response,
            PageResponse::Failed {
                index: 2,
                error: FetchError::Malformed { .. },
                ..
            }
        ));
    }

    #[test]
    fn worker_stops_on_shutdown() {
        let (req_tx, req_rx) = flume::unbounded();
        let (resp_tx, resp_rx) = flume::unbounded();
        let loader: Arc<dyn PageLoader> = Arc::new(FixedLoader {
            reported_index: 0,
            image: ImageRef::url("p.jpg"),
        });

        req_tx
            .send(PageRequest::Load {
                id: RequestId::new(1),
                index: 0,
                urls: urls(),
            })
            .unwrap();
        req_tx.send(PageRequest::Shutdown).unwrap();
        page_worker(loader, req_rx, resp_tx);

        let response = resp_rx.try_recv().unwrap();
        assert_eq!(response.index(), 0);
        assert!(resp_rx.try_recv().is_err());
    }
}
