use crate::BufferError;
use crate::common::records::RecordIter;
use crate::pose::types::{JOINT_POSE_RECORD_SIZE, JointPoseRecord, POSE_BLOCK_HEADER_SIZE, PoseBlockHeader};

/// The answer to one batched pose query: a sequence of skeleton blocks.
#[derive(Debug, Clone, Copy)]
pub struct PoseBuffer<'a> {
    bytes: &'a [u8],
    block_count: usize,
}

/// All joints of one skeleton.
#[derive(Debug, Clone, Copy)]
pub struct PoseBlock<'a> {
    pub skeleton_id: u64,
    joints: &'a [u8],
}

impl<'a> PoseBlock<'a> {
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len() / JOINT_POSE_RECORD_SIZE
    }

    #[inline]
    pub fn joints(&self) -> RecordIter<'a, JointPoseRecord> {
        RecordIter::new(self.joints)
    }
}

impl<'a> PoseBuffer<'a> {
    /// Walks all block headers once, so that iterating [`PoseBuffer::blocks`] can't fail anymore.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BufferError> {
        let mut offset = 0;
        let mut block_count = 0;

        while offset < bytes.len() {
            let (header, joints_len) = read_header(&bytes[offset..])?;
            let available = bytes.len() - offset - POSE_BLOCK_HEADER_SIZE;
            if joints_len > available {
                return Err(BufferError::TruncatedPoseBlock {
                    skeleton_id: header.skeleton_id,
                    joint_count: header.joint_count,
                    available,
                });
            }

            offset += POSE_BLOCK_HEADER_SIZE + joints_len;
            block_count += 1;
        }

        Ok(Self { bytes, block_count })
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn blocks(&self) -> PoseBlocks<'a> {
        PoseBlocks {
            remaining: self.bytes,
        }
    }

    pub fn find(&self, skeleton_id: u64) -> Option<PoseBlock<'a>> {
        self.blocks().find(|block| block.skeleton_id == skeleton_id)
    }
}

fn read_header(bytes: &[u8]) -> Result<(PoseBlockHeader, usize), BufferError> {
    if bytes.len() < POSE_BLOCK_HEADER_SIZE {
        return Err(BufferError::TruncatedHeader { remaining: bytes.len() });
    }

    let header: PoseBlockHeader = bytemuck::pod_read_unaligned(&bytes[..POSE_BLOCK_HEADER_SIZE]);
    let joints_len = header.joint_count as usize * JOINT_POSE_RECORD_SIZE;
    Ok((header, joints_len))
}

pub struct PoseBlocks<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for PoseBlocks<'a> {
    type Item = PoseBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        // parse() has already validated every header and the block lengths.
        let (header, joints_len) = read_header(self.remaining).ok()?;
        let end = POSE_BLOCK_HEADER_SIZE + joints_len;
        let block = PoseBlock {
            skeleton_id: header.skeleton_id,
            joints: &self.remaining[POSE_BLOCK_HEADER_SIZE..end],
        };
        self.remaining = &self.remaining[end..];
        Some(block)
    }
}
