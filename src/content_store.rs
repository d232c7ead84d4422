//! Write-once payload store keyed by generated ids.

use crate::error::{Result, TaskServiceError};
use crate::models::Content;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// In-memory content store. Payloads are opaque byte sequences written
/// once at task creation, completion, or failure and fetched by id;
/// there is no in-place mutation.
#[derive(Debug, Default)]
pub struct ContentStore {
    entries: DashMap<i64, Vec<u8>>,
    sequence: AtomicI64,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload and return its generated id
    pub fn put(&self, bytes: Vec<u8>) -> i64 {
        let content_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.insert(content_id, bytes);
        content_id
    }

    /// Fetch a payload by id
    pub fn get(&self, content_id: i64) -> Result<Content> {
        self.entries
            .get(&content_id)
            .map(|entry| Content::new(content_id, entry.value().clone()))
            .ok_or(TaskServiceError::ContentNotFound { content_id })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
