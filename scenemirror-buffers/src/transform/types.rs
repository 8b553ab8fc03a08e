use bytemuck::{Pod, Zeroable};

/// Bit 0 of [`TransformRecord::flags`]: the node is visible.
pub const FLAG_VISIBLE: u32 = 1;

/// One node's state for a single frame, exactly as the simulation lays it out in memory.
///
/// `native_handle` is the simulation's own object pointer. We never dereference it, it just
/// occupies its 8 bytes so that the record stays bit compatible.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformRecord {
    pub object_id: i64,
    pub parent_id: i64,
    pub pos: [f32; 4],
    /// quaternion, xyzw
    pub rot: [f32; 4],
    pub scale: [f32; 4],
    pub native_handle: u64,
    pub flags: u32,
    pub pad: f32,
}

pub const TRANSFORM_RECORD_SIZE: usize = size_of::<TransformRecord>();

const _: () = assert!(TRANSFORM_RECORD_SIZE == 80);

impl TransformRecord {
    pub fn new(object_id: i64, parent_id: i64, pos: [f32; 3], rot: [f32; 4], scale: [f32; 3], visible: bool) -> Self {
        Self {
            object_id,
            parent_id,
            pos: [pos[0], pos[1], pos[2], 0.0],
            rot,
            scale: [scale[0], scale[1], scale[2], 0.0],
            native_handle: 0,
            flags: if visible { FLAG_VISIBLE } else { 0 },
            pad: 0.0,
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.flags & FLAG_VISIBLE != 0
    }

    #[inline]
    pub fn position(&self) -> [f32; 3] {
        [self.pos[0], self.pos[1], self.pos[2]]
    }

    #[inline]
    pub fn scale(&self) -> [f32; 3] {
        [self.scale[0], self.scale[1], self.scale[2]]
    }
}
