//! An in-process simulation that is driven by code. The demo binary and the integration tests run the mirror against
//! it, the same way the real engine would be driven frame by frame.

use crate::simulation::types::{
    MaterialSource, MeshSource, NodeId, NodeInfo, ResourceId, SkeletonSource, SubscriptionToken, TextureSource,
};
use crate::simulation::{NodeSignal, SimulationEvent, SimulationHost};
use glam::{Affine3A, Quat, Vec3};
use log::{debug, trace, warn};
use scenemirror_buffers::pose::types::JointPoseRecord;
use scenemirror_buffers::pose::writer::PoseBufferWriter;
use scenemirror_buffers::transform::types::TransformRecord;
use scenemirror_buffers::transform::writer::TransformSnapshotWriter;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone)]
pub struct ScriptedNode {
    pub info: NodeInfo,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    /// Radians per second around the local up axis.
    pub spin: f32,
}

impl ScriptedNode {
    fn local_transform(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

pub struct ScriptedSimulation {
    project_dir: PathBuf,
    nodes: BTreeMap<NodeId, ScriptedNode>,
    meshes: HashMap<ResourceId, Arc<MeshSource>>,
    materials: HashMap<ResourceId, Arc<MaterialSource>>,
    textures: HashMap<ResourceId, TextureSource>,
    skeletons: HashMap<ResourceId, Arc<SkeletonSource>>,
    poses: HashMap<ResourceId, Vec<JointPoseRecord>>,
    subscriptions: HashMap<SubscriptionToken, ResourceId>,
    next_subscription: u64,
    events: Option<Sender<SimulationEvent>>,
    /// Events raised before anyone connected.
    queued_events: Vec<SimulationEvent>,
    snapshot: TransformSnapshotWriter,
    emitted_signals: Vec<(NodeId, NodeSignal)>,
    pose_queries: Cell<usize>,
    frame: u64,
    quit_after: Option<u64>,
}

impl ScriptedSimulation {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            nodes: BTreeMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            skeletons: HashMap::new(),
            poses: HashMap::new(),
            subscriptions: HashMap::new(),
            next_subscription: 1,
            events: None,
            queued_events: vec![],
            snapshot: TransformSnapshotWriter::with_capacity(64),
            emitted_signals: vec![],
            pose_queries: Cell::new(0),
            frame: 0,
            quit_after: None,
        }
    }

    fn send(&mut self, event: SimulationEvent) {
        match &self.events {
            Some(sender) => {
                if sender.send(event).is_err() {
                    warn!("Mirror side of the event channel is gone");
                }
            }
            None => self.queued_events.push(event),
        }
    }

    /// Adds a node to the tree and announces it.
    pub fn add_node(&mut self, info: NodeInfo) {
        self.add_node_at(info, Vec3::ZERO);
    }

    pub fn add_node_at(&mut self, info: NodeInfo, position: Vec3) {
        let id = info.id;
        self.insert_node(info, position);
        self.send(SimulationEvent::NodeAdded(id));
    }

    fn insert_node(&mut self, info: NodeInfo, position: Vec3) {
        let id = info.id;
        trace!("Scripted node {:?} ({}) added", id, info.name);
        self.nodes.insert(
            id,
            ScriptedNode {
                info,
                position,
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
                visible: true,
                spin: 0.0,
            },
        );
    }

    /// Adds a node without announcing it, as if the notification got lost.
    pub fn add_node_silently(&mut self, info: NodeInfo) {
        self.insert_node(info, Vec3::ZERO);
    }

    /// Sends a raw notification, regardless of the scripted state.
    pub fn send_event(&mut self, event: SimulationEvent) {
        self.send(event);
    }

    /// Removes a node and announces the removal. Children are removed (and announced) first.
    pub fn remove_node(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.info.parent == id)
            .map(|node| node.info.id)
            .collect();
        for child in children {
            self.remove_node(child);
        }

        if self.nodes.remove(&id).is_some() {
            self.send(SimulationEvent::NodeRemoved(id));
        }
    }

    /// Frees a node without any notification, as happens when a node is freed in between the notification and the
    /// next synchronization pass.
    pub fn free_node_silently(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ScriptedNode> {
        self.nodes.get_mut(&id)
    }

    pub fn set_transform(&mut self, id: NodeId, position: Vec3, rotation: Quat, scale: Vec3) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
            node.rotation = rotation;
            node.scale = scale;
        }
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    pub fn set_spin(&mut self, id: NodeId, radians_per_second: f32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.spin = radians_per_second;
        }
    }

    pub fn insert_mesh(&mut self, mesh: MeshSource) {
        let id = mesh.id;
        self.meshes.insert(id, Arc::new(mesh));
        self.notify_changed(id);
    }

    pub fn insert_material(&mut self, id: ResourceId, material: MaterialSource) {
        self.materials.insert(id, Arc::new(material));
        self.notify_changed(id);
    }

    pub fn insert_texture(&mut self, texture: TextureSource) {
        let id = texture.id;
        self.textures.insert(id, texture);
        self.notify_changed(id);
    }

    pub fn insert_skeleton(&mut self, skeleton: SkeletonSource) {
        let id = skeleton.id;
        self.skeletons.insert(id, Arc::new(skeleton));
        self.notify_changed(id);
    }

    pub fn set_pose(&mut self, skeleton: ResourceId, joints: Vec<JointPoseRecord>) {
        self.poses.insert(skeleton, joints);
    }

    /// Raises the `changed` notification on every subscription of `id`.
    pub fn notify_changed(&mut self, id: ResourceId) {
        let count = self.subscriptions.values().filter(|&&res| res == id).count();
        for _ in 0..count {
            self.send(SimulationEvent::ResourceChanged(id));
        }
    }

    /// What an audio emitter's `on_play` signal would report.
    pub fn play_audio(&mut self, node: NodeId, resource_path: impl Into<String>, volume_db: f32) {
        self.send(SimulationEvent::AudioPlayed {
            node,
            resource_path: resource_path.into(),
            volume_db,
        });
    }

    pub fn quit_after(&mut self, frames: u64) {
        self.quit_after = Some(frames);
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn emitted_signals(&self) -> &[(NodeId, NodeSignal)] {
        &self.emitted_signals
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// How often [`SimulationHost::query_poses`] has been called.
    pub fn pose_queries(&self) -> usize {
        self.pose_queries.get()
    }

    pub fn is_connected(&self) -> bool {
        self.events.is_some()
    }

    fn global_transform(&self, id: NodeId) -> Affine3A {
        let mut transform = Affine3A::IDENTITY;
        let mut current = id;
        // parent links come from the script, guard against accidental cycles.
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            transform = node.local_transform() * transform;
            current = node.info.parent;
        }
        transform
    }

    fn write_snapshot(&mut self) {
        self.snapshot.clear();
        for node in self.nodes.values().filter(|node| node.info.class.is_spatial()) {
            self.snapshot.push(&TransformRecord::new(
                node.info.id.0,
                node.info.parent.0,
                node.position.to_array(),
                node.rotation.to_array(),
                node.scale.to_array(),
                node.visible,
            ));
        }
    }
}

impl SimulationHost for ScriptedSimulation {
    fn connect(&mut self, events: Sender<SimulationEvent>) {
        for event in self.queued_events.drain(..) {
            if events.send(event).is_err() {
                warn!("Mirror side of the event channel is gone");
                break;
            }
        }
        self.events = Some(events);
    }

    fn disconnect(&mut self) {
        self.events = None;
    }

    fn step(&mut self, delta: f32) -> bool {
        self.frame += 1;
        for node in self.nodes.values_mut().filter(|node| node.spin != 0.0) {
            node.rotation = (node.rotation * Quat::from_rotation_y(node.spin * delta)).normalize();
        }

        self.write_snapshot();
        self.quit_after.is_some_and(|quit| self.frame >= quit)
    }

    fn is_node_valid(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn node(&self, node: NodeId) -> Option<NodeInfo> {
        self.nodes.get(&node).map(|scripted| {
            let mut info = scripted.info.clone();
            info.global_position = self.global_transform(node).translation.into();
            info
        })
    }

    fn mesh(&self, id: ResourceId) -> Option<Arc<MeshSource>> {
        self.meshes.get(&id).cloned()
    }

    fn material(&self, id: ResourceId) -> Option<Arc<MaterialSource>> {
        self.materials.get(&id).cloned()
    }

    fn texture(&self, id: ResourceId) -> Option<TextureSource> {
        self.textures.get(&id).cloned()
    }

    fn skeleton(&self, id: ResourceId) -> Option<Arc<SkeletonSource>> {
        self.skeletons.get(&id).cloned()
    }

    fn subscribe_changed(&mut self, resource: ResourceId) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.insert(token, resource);
        token
    }

    fn unsubscribe_changed(&mut self, token: SubscriptionToken) {
        if self.subscriptions.remove(&token).is_none() {
            warn!("Unsubscribing unknown token {:?}", token);
        }
    }

    fn transform_snapshot(&self) -> &[u8] {
        self.snapshot.as_bytes()
    }

    fn query_poses(&self, skeletons: &[ResourceId], out: &mut Vec<u8>) {
        self.pose_queries.set(self.pose_queries.get() + 1);
        let mut writer = PoseBufferWriter::new(out);
        for id in skeletons {
            if let Some(pose) = self.poses.get(id) {
                writer.write_block(id.0, pose);
            } else if let Some(skeleton) = self.skeletons.get(id) {
                let rest = skeleton
                    .bones
                    .iter()
                    .map(|bone| {
                        let (scale, rotation, translation) = bone.rest.to_scale_rotation_translation();
                        JointPoseRecord::new(translation.to_array(), rotation.to_array(), scale.to_array())
                    })
                    .collect::<Vec<_>>();
                writer.write_block(id.0, &rest);
            }
        }
    }

    fn emit_signal(&mut self, node: NodeId, signal: NodeSignal) {
        debug!("Node {:?} received {}: {:?}", node, signal.name(), signal);
        self.emitted_signals.push((node, signal));
    }

    fn project_dir(&self) -> &Path {
        &self.project_dir
    }
}
