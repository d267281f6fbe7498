//! Page request and response types

use std::sync::Arc;

use super::types::{PageData, PageUrls};

/// Unique identifier for page requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to page workers
#[derive(Debug)]
pub enum PageRequest {
    /// Load a page the user is waiting for
    Load {
        id: RequestId,
        index: usize,
        urls: PageUrls,
    },

    /// Load a neighbouring page nobody is waiting for yet
    Prefetch {
        id: RequestId,
        index: usize,
        urls: PageUrls,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from page and thumbnail collaborators
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode: {detail}")]
    Decode { detail: String },

    #[error("malformed payload: {detail}")]
    Malformed { detail: String },

    #[error("{detail}")]
    Collaborator { detail: String },
}

impl FetchError {
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator { detail: msg.into() }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed { detail: msg.into() }
    }
}

/// Response from page workers
#[derive(Debug)]
pub enum PageResponse {
    /// Loaded page data
    Loaded {
        id: RequestId,
        index: usize,
        data: Arc<PageData>,
    },

    /// The collaborator failed or returned an unusable payload
    Failed {
        id: RequestId,
        index: usize,
        error: FetchError,
    },
}

impl PageResponse {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Loaded { index, .. } | Self::Failed { index, .. } => *index,
        }
    }
}
