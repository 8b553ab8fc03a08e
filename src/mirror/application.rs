use crate::entity::entity_tracker::EntityTracker;
use crate::entity::systems::systems::{FrameEvents, PassStatistics, PlayedAudio, SceneContext, Systems};
use crate::rendering::render_backend::{ComponentKind, RenderBackend, RenderEntity};
use crate::rendering::resource_cache::ResourceCache;
use crate::settings::MirrorSettings;
use crate::simulation::types::NodeId;
use crate::simulation::{NodeSignal, SIGNAL_DRAG, SIGNAL_DRAG_ENDED, SimulationEvent, SimulationHost};
use anyhow::bail;
use glam::{Affine3A, Vec3};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, channel};
use std::time::Instant;

pub const MIRROR_ROOT_NAME: &str = "MIRROR_ROOT";

static INSTANCE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Ensures that only one mirror runs per process. Released on drop.
#[derive(Debug)]
pub struct InstanceGuard(());

impl InstanceGuard {
    pub fn acquire() -> Result<Self, anyhow::Error> {
        if INSTANCE_ACTIVE.swap(true, Ordering::SeqCst) {
            bail!("Another mirror is already running in this process");
        }
        Ok(Self(()))
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        INSTANCE_ACTIVE.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    /// The simulation asked to quit during this frame.
    pub quit: bool,
    pub statistics: PassStatistics,
}

/// Owns both sides of the mirror and runs one synchronization pass per frame on the calling thread: the simulation
/// is stepped, its notifications are drained and the render scene is brought up to date.
pub struct MirrorApplication<S: SimulationHost, B: RenderBackend> {
    host: S,
    backend: B,
    cache: ResourceCache,
    tracker: EntityTracker,
    systems: Systems,
    events: Receiver<SimulationEvent>,
    root: RenderEntity,
    frame: u64,
    torn_down: bool,
}

impl<S: SimulationHost, B: RenderBackend> MirrorApplication<S, B> {
    pub fn new(mut host: S, mut backend: B, settings: &MirrorSettings) -> Result<Self, anyhow::Error> {
        let cache = ResourceCache::new(settings)?;
        let root = backend.create_entity(MIRROR_ROOT_NAME);

        let (sender, receiver) = channel();
        host.connect(sender);

        Ok(Self {
            host,
            backend,
            cache,
            tracker: EntityTracker::new(),
            systems: Systems::new(settings),
            events: receiver,
            root,
            frame: 0,
            torn_down: false,
        })
    }

    pub fn tick(&mut self, delta: f32) -> Result<FrameOutcome, anyhow::Error> {
        self.tick_at(delta, Instant::now())
    }

    /// Like [`MirrorApplication::tick`], with the time used for settling volume size changes passed in.
    pub fn tick_at(&mut self, delta: f32, now: Instant) -> Result<FrameOutcome, anyhow::Error> {
        if self.torn_down {
            bail!("The mirror has been torn down, it has to be recreated");
        }

        self.frame += 1;
        let quit = self.host.step(delta);
        let events = self.drain_events();

        let mut ctx = SceneContext {
            host: &mut self.host,
            backend: &mut self.backend,
            cache: &mut self.cache,
            tracker: &mut self.tracker,
            root: self.root,
        };
        let statistics = self.systems.update(&mut ctx, events, now);
        trace!("Frame {}: {:?}", self.frame, statistics);

        Ok(FrameOutcome { quit, statistics })
    }

    fn drain_events(&mut self) -> FrameEvents {
        let mut events = FrameEvents::default();
        while let Ok(event) = self.events.try_recv() {
            match event {
                SimulationEvent::NodeAdded(node) => self.tracker.node_added(node),
                SimulationEvent::NodeRemoved(node) => self.tracker.node_removed(node),
                SimulationEvent::ResourceChanged(resource) => {
                    events.changed_resources.insert(resource);
                }
                SimulationEvent::AudioPlayed {
                    node,
                    resource_path,
                    volume_db,
                } => events.audio.push(PlayedAudio {
                    node,
                    resource_path,
                    volume_db,
                }),
            }
        }
        events
    }

    /// Blocks until all background mesh conversions are done and rebuilds the entities waiting for them.
    pub fn finish_conversions(&mut self) -> usize {
        let ready = self.cache.wait_for_conversions(&mut self.backend);
        let mut ctx = SceneContext {
            host: &mut self.host,
            backend: &mut self.backend,
            cache: &mut self.cache,
            tracker: &mut self.tracker,
            root: self.root,
        };

        let rebuilt = self.systems.lifecycle.rebuild_models(&mut ctx, ready);
        let count = rebuilt.len();
        for (entity, skeleton) in rebuilt {
            self.systems.skeleton_pose.set_skeleton(entity, skeleton);
        }
        count
    }

    /// Drops the mirrored scene and every cached resource, e.g. when the simulation reloads its scene. The mirror
    /// root stays, nodes announced afterwards are mirrored as usual.
    pub fn reset_scene(&mut self) {
        info!("Resetting the mirrored scene ({} entities)", self.tracker.len());
        for (_, mirrored) in self.tracker.clear() {
            self.backend.destroy_entity(mirrored.entity);
        }
        for child in self.backend.children(self.root) {
            self.backend.destroy_entity(child);
        }

        self.cache.reset(&mut self.host).release(&mut self.backend);
        self.systems.reset();
    }

    /// Disconnects from the simulation and cancels every subscription. Any further tick fails.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        debug!("Tearing down the mirror after {} frames", self.frame);
        self.host.disconnect();
        // the last mirrored frame stays on display, its resources go away with the backend
        let _ = self.cache.reset(&mut self.host);
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// The host environment resized the render volume. Applied once it stopped changing.
    pub fn set_render_volume_size(&mut self, size: Vec3) {
        self.set_render_volume_size_at(size, Instant::now());
    }

    pub fn set_render_volume_size_at(&mut self, size: Vec3, now: Instant) {
        self.systems.volume_camera.propose_render_volume(size, now);
    }

    /// Render space to simulation space: undo the root transform, then shift by half the volume depth.
    pub fn to_simulation_space(&self, location: Vec3) -> Vec3 {
        let root = self.backend.world_transform(self.root).unwrap_or(Affine3A::IDENTITY);
        root.inverse().transform_point3(location) + Vec3::new(0.0, 0.0, self.systems.volume_camera.box_size().z * 0.5)
    }

    /// Forwards a tap on `entity` at the render space `location` as the node's `input_event`. Returns whether a
    /// signal has been emitted.
    pub fn forward_tap(&mut self, entity: RenderEntity, location: Vec3) -> bool {
        let Some(node) = self.input_node(entity) else {
            return false;
        };

        let entity_position = self
            .backend
            .world_transform(entity)
            .map_or(location, |transform| transform.translation.into());

        let signal = NodeSignal::InputEvent {
            pressed: true,
            position: self.to_simulation_space(location),
            normal: (entity_position - location).normalize_or_zero(),
            shape_index: 0,
        };
        self.host.emit_signal(node, signal);
        true
    }

    /// Forwards a drag, if the node has a `drag` signal.
    pub fn forward_drag(&mut self, entity: RenderEntity, location: Vec3, start_location: Vec3) -> bool {
        let Some(node) = self.input_node(entity) else {
            return false;
        };

        if !self.host.node(node).is_some_and(|info| info.has_signal(SIGNAL_DRAG)) {
            return false;
        }

        let signal = NodeSignal::Drag {
            location: self.to_simulation_space(location),
            start_location: self.to_simulation_space(start_location),
        };
        self.host.emit_signal(node, signal);
        true
    }

    pub fn forward_drag_ended(&mut self, entity: RenderEntity) -> bool {
        let Some(node) = self.input_node(entity) else {
            return false;
        };

        if !self.host.node(node).is_some_and(|info| info.has_signal(SIGNAL_DRAG_ENDED)) {
            return false;
        }

        self.host.emit_signal(node, NodeSignal::DragEnded);
        true
    }

    /// The node behind an input target entity, if it's still alive.
    fn input_node(&self, entity: RenderEntity) -> Option<NodeId> {
        if self.torn_down || !self.backend.has_component(entity, ComponentKind::InputTarget) {
            return None;
        }

        let node = self.tracker.node_for_entity(entity)?;
        if !self.host.is_node_valid(node) {
            trace!("Input on {:?}, but {:?} has been freed", entity, node);
            return None;
        }
        Some(node)
    }

    pub fn entity_for_node(&self, node: NodeId) -> Option<RenderEntity> {
        self.tracker.entity_for_node(node)
    }

    pub fn node_for_entity(&self, entity: RenderEntity) -> Option<NodeId> {
        self.tracker.node_for_entity(entity)
    }

    pub fn root(&self) -> RenderEntity {
        self.root
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn host(&self) -> &S {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut S {
        &mut self.host
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    pub fn systems(&self) -> &Systems {
        &self.systems
    }
}
