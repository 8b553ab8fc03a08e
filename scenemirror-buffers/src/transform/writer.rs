use crate::transform::types::{TRANSFORM_RECORD_SIZE, TransformRecord};

/// Builds a transform buffer, reusing its allocation from frame to frame.
#[derive(Debug, Default)]
pub struct TransformSnapshotWriter {
    buf: Vec<u8>,
}

impl TransformSnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(records: usize) -> Self {
        Self {
            buf: Vec::with_capacity(records * TRANSFORM_RECORD_SIZE),
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn push(&mut self, record: &TransformRecord) {
        self.buf.extend_from_slice(bytemuck::bytes_of(record));
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
