pub mod lifecycle_system;
pub mod skeleton_pose_system;
pub mod systems;
pub mod transform_sync_system;
pub mod volume_camera_system;
