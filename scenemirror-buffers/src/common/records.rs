use bytemuck::Pod;
use std::marker::PhantomData;
use std::slice::{ChunksExact, Iter};

/// Iterates densely packed `T` records inside of a byte buffer without allocating.
///
/// When the buffer happens to be aligned for `T`, the records are read straight from the cast slice,
/// otherwise every record is copied out with an unaligned read. Both paths yield the same values, the
/// caller never has to care about where the simulation allocated its buffer.
pub enum RecordIter<'a, T: Pod> {
    Aligned(Iter<'a, T>),
    Unaligned(ChunksExact<'a, u8>, PhantomData<T>),
}

impl<'a, T: Pod> RecordIter<'a, T> {
    /// The length of `bytes` has to be a multiple of `size_of::<T>()`, which the parsers validate upfront.
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len() % size_of::<T>(), 0);
        match bytemuck::try_cast_slice::<u8, T>(bytes) {
            Ok(records) => RecordIter::Aligned(records.iter()),
            Err(_) => RecordIter::Unaligned(bytes.chunks_exact(size_of::<T>()), PhantomData),
        }
    }
}

impl<T: Pod> Iterator for RecordIter<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecordIter::Aligned(iter) => iter.next().copied(),
            RecordIter::Unaligned(chunks, _) => chunks.next().map(bytemuck::pod_read_unaligned),
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            RecordIter::Aligned(iter) => iter.size_hint(),
            RecordIter::Unaligned(chunks, _) => chunks.size_hint(),
        }
    }
}

impl<T: Pod> ExactSizeIterator for RecordIter<'_, T> {}
