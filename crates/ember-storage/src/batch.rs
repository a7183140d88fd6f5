//! Write batch for atomic multi-bucket commits.

use crate::Bucket;

/// A single batched operation. `value: None` is a delete.
#[derive(Debug, Clone)]
pub(crate) struct BatchOperation {
    pub bucket: Bucket,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// An ordered list of writes applied atomically.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) operations: Vec<BatchOperation>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            operations: Vec::with_capacity(capacity),
        }
    }

    /// Queue a put.
    pub fn put(&mut self, bucket: Bucket, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.operations.push(BatchOperation {
            bucket,
            key: key.into(),
            value: Some(value.into()),
        });
    }

    /// Queue a delete.
    pub fn delete(&mut self, bucket: Bucket, key: impl Into<Vec<u8>>) {
        self.operations.push(BatchOperation {
            bucket,
            key: key.into(),
            value: None,
        });
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
