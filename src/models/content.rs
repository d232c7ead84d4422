use serde::{Deserialize, Serialize};

/// An opaque payload blob addressed by a generated id. Written once;
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub content_id: i64,
    pub bytes: Vec<u8>,
}

impl Content {
    pub fn new(content_id: i64, bytes: Vec<u8>) -> Self {
        Self { content_id, bytes }
    }
}
