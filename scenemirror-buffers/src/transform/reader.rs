use crate::BufferError;
use crate::common::records::RecordIter;
use crate::transform::types::{TRANSFORM_RECORD_SIZE, TransformRecord};

/// A borrowed view onto one frame's transform buffer. Only valid for the frame it was handed out in.
#[derive(Debug, Clone, Copy)]
pub struct TransformSnapshot<'a> {
    bytes: &'a [u8],
}

impl<'a> TransformSnapshot<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BufferError> {
        if bytes.len() % TRANSFORM_RECORD_SIZE != 0 {
            return Err(BufferError::TruncatedRecord {
                len: bytes.len(),
                record_size: TRANSFORM_RECORD_SIZE,
            });
        }

        Ok(Self { bytes })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / TRANSFORM_RECORD_SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn records(&self) -> RecordIter<'a, TransformRecord> {
        RecordIter::new(self.bytes)
    }
}
