use crate::pose::types::{JOINT_POSE_RECORD_SIZE, JointPoseRecord, POSE_BLOCK_HEADER_SIZE, PoseBlockHeader};

/// Appends skeleton blocks to a caller owned buffer, which is how the simulation answers a batched pose query.
pub struct PoseBufferWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> PoseBufferWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    pub fn write_block(&mut self, skeleton_id: u64, joints: &[JointPoseRecord]) {
        let header = PoseBlockHeader {
            skeleton_id,
            joint_count: joints.len() as u32,
            pad: 0,
        };

        self.buf
            .reserve(POSE_BLOCK_HEADER_SIZE + joints.len() * JOINT_POSE_RECORD_SIZE);
        self.buf.extend_from_slice(bytemuck::bytes_of(&header));
        self.buf.extend_from_slice(bytemuck::cast_slice(joints));
    }
}
