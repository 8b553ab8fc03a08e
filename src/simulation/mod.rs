//! The simulation side of the mirror. The simulation engine is an external collaborator, everything the mirror needs
//! from it goes through [`SimulationHost`].

use crate::simulation::types::{
    MaterialSource, MeshSource, NodeId, NodeInfo, ResourceId, SkeletonSource, SubscriptionToken, TextureSource,
};
use glam::Vec3;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::Sender;

pub mod scripted;
pub mod types;

/// Name of the node that defines the simulation volume which maps onto the render volume.
pub const VOLUME_CAMERA_NODE_NAME: &str = "VisionVolumeCamera";

pub const SIGNAL_INPUT_EVENT: &str = "input_event";
pub const SIGNAL_DRAG: &str = "drag";
pub const SIGNAL_DRAG_ENDED: &str = "drag_ended";
pub const SIGNAL_ON_PLAY: &str = "on_play";

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    /// A resource that has been subscribed to has changed.
    ResourceChanged(ResourceId),
    AudioPlayed {
        node: NodeId,
        resource_path: String,
        volume_db: f32,
    },
}

/// Input that is forwarded from the render side back into the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSignal {
    InputEvent {
        pressed: bool,
        position: Vec3,
        normal: Vec3,
        shape_index: i32,
    },
    Drag {
        location: Vec3,
        start_location: Vec3,
    },
    DragEnded,
}

impl NodeSignal {
    pub fn name(&self) -> &'static str {
        match self {
            NodeSignal::InputEvent { .. } => SIGNAL_INPUT_EVENT,
            NodeSignal::Drag { .. } => SIGNAL_DRAG,
            NodeSignal::DragEnded => SIGNAL_DRAG_ENDED,
        }
    }
}

pub trait SimulationHost {
    /// Starts delivering node lifecycle, resource change and audio notifications.
    fn connect(&mut self, events: Sender<SimulationEvent>);
    fn disconnect(&mut self);

    /// Advances the simulation by one frame. Returns true when the simulation has quit.
    fn step(&mut self, delta: f32) -> bool;

    /// Nodes may be freed at any time, every by-identity lookup has to be guarded by this.
    fn is_node_valid(&self, node: NodeId) -> bool;
    fn node(&self, node: NodeId) -> Option<NodeInfo>;

    fn mesh(&self, id: ResourceId) -> Option<Arc<MeshSource>>;
    fn material(&self, id: ResourceId) -> Option<Arc<MaterialSource>>;
    fn texture(&self, id: ResourceId) -> Option<TextureSource>;
    fn skeleton(&self, id: ResourceId) -> Option<Arc<SkeletonSource>>;

    fn subscribe_changed(&mut self, resource: ResourceId) -> SubscriptionToken;
    fn unsubscribe_changed(&mut self, token: SubscriptionToken);

    /// This frame's transform records, see [`scenemirror_buffers::transform`].
    fn transform_snapshot(&self) -> &[u8];

    /// One batched pose query for all given skeletons, answered into `out` in the pose buffer format.
    fn query_poses(&self, skeletons: &[ResourceId], out: &mut Vec<u8>);

    fn emit_signal(&mut self, node: NodeId, signal: NodeSignal);

    /// The directory `res://` paths are resolved against.
    fn project_dir(&self) -> &Path;
}

/// Resolves a `res://` path against the project directory. Other paths are taken as they are.
pub fn resolve_resource_path(project_dir: &Path, resource_path: &str) -> std::path::PathBuf {
    match resource_path.strip_prefix("res://") {
        Some(relative) => project_dir.join(relative),
        None => Path::new(resource_path).to_path_buf(),
    }
}
