use thiserror::Error;

/// Everything that can go wrong when interpreting a frame buffer handed over by the simulation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BufferError {
    #[error("The buffer length {len} is not a multiple of the record size {record_size}")]
    TruncatedRecord { len: usize, record_size: usize },

    #[error("The buffer ends inside of a pose block header ({remaining} trailing bytes)")]
    TruncatedHeader { remaining: usize },

    #[error("The pose block of skeleton {skeleton_id} announces {joint_count} joints, but only {available} bytes remain")]
    TruncatedPoseBlock {
        skeleton_id: u64,
        joint_count: u32,
        available: usize,
    },
}

pub mod common;
pub mod pose;
pub mod transform;
