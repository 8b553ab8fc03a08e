use bytemuck::{Pod, Zeroable};

/// Starts the joints of one skeleton inside of a batched pose buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct PoseBlockHeader {
    pub skeleton_id: u64,
    pub joint_count: u32,
    pub pad: u32,
}

/// A joint's local pose. The `w` of `pos` and `scale` is padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct JointPoseRecord {
    pub pos: [f32; 4],
    /// quaternion, xyzw
    pub rot: [f32; 4],
    pub scale: [f32; 4],
}

pub const POSE_BLOCK_HEADER_SIZE: usize = size_of::<PoseBlockHeader>();
pub const JOINT_POSE_RECORD_SIZE: usize = size_of::<JointPoseRecord>();

const _: () = assert!(POSE_BLOCK_HEADER_SIZE == 16);
const _: () = assert!(JOINT_POSE_RECORD_SIZE == 48);

impl JointPoseRecord {
    pub fn new(pos: [f32; 3], rot: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            pos: [pos[0], pos[1], pos[2], 0.0],
            rot,
            scale: [scale[0], scale[1], scale[2], 0.0],
        }
    }

    pub const IDENTITY: JointPoseRecord = JointPoseRecord {
        pos: [0.0; 4],
        rot: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0, 0.0],
    };
}
