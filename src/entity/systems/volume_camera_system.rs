use crate::rendering::render_backend::{EntityTransform, RenderBackend, RenderEntity};
use crate::settings::MirrorSettings;
use crate::simulation::SimulationHost;
use crate::simulation::types::{CollisionShapeInfo, NodeClass, NodeId, NodeInfo};
use crate::util::debouncer::Debouncer;
use crate::util::{is_uniform, is_valid_volume};
use anyhow::{anyhow, bail};
use glam::{Quat, Vec3};
use log::{debug, error, info};
use std::time::{Duration, Instant};

/// The size of the simulation volume, taken from the volume camera's single box collision shape.
pub fn volume_box_size(info: &NodeInfo) -> Result<Vec3, anyhow::Error> {
    if info.class != NodeClass::Area3D {
        bail!(
            "Expected the volume camera {} to be an Area3D, but it is a {}",
            info.name,
            info.class.class_name()
        );
    }

    if info.collision_shapes.len() != 1 {
        bail!(
            "Expected the volume camera {} to have exactly one collision shape, but it has {}",
            info.name,
            info.collision_shapes.len()
        );
    }

    match &info.collision_shapes[0] {
        CollisionShapeInfo::Box { size } if is_valid_volume(*size) => Ok(*size),
        CollisionShapeInfo::Box { size } => Err(anyhow!("The volume camera's box has an invalid size {}", size)),
        CollisionShapeInfo::Other { class_name } => Err(anyhow!(
            "The volume camera's collision shape has to be a BoxShape3D, but it is a {}",
            class_name
        )),
    }
}

/// Uniform scale that maps the simulation box onto the render volume. Mismatching proportions are reported, the
/// largest ratio wins.
pub fn volume_scale(render_volume: Vec3, box_size: Vec3) -> f32 {
    let ratio = render_volume / box_size;
    if !is_uniform(ratio, 1e-4) {
        error!(
            "The proportions of the render volume {} don't match the simulation volume {}, the camera volume may be off",
            render_volume, box_size
        );
    }
    ratio.max_element()
}

/// Keeps the mirror root placed and scaled according to the volume camera node.
pub struct VolumeCameraSystem {
    camera: Option<NodeId>,
    box_size: Vec3,
    render_volume: Vec3,
    pending_volume: Debouncer<Vec3>,
    offset_factor: f32,
    scale: f32,
    translation: Vec3,
}

impl VolumeCameraSystem {
    pub fn new(settings: &MirrorSettings) -> Self {
        Self {
            camera: None,
            box_size: Vec3::ONE,
            render_volume: settings.render_volume_size(),
            pending_volume: Debouncer::new(Duration::from_millis(settings.scale_settle_quiescence_ms)),
            offset_factor: settings.volume_camera_offset_factor,
            scale: 1.0,
            translation: Vec3::ZERO,
        }
    }

    /// The designated node has been materialized. It always drives the root position, but only a valid volume
    /// changes the scale.
    pub fn on_volume_camera(&mut self, info: &NodeInfo) {
        self.camera = Some(info.id);
        match volume_box_size(info) {
            Ok(size) => {
                self.box_size = size;
                self.scale = volume_scale(self.render_volume, size);
                info!("Volume camera {} found, box {} scaled by {}", info.name, size, self.scale);
            }
            Err(err) => error!("{:#}", err),
        }
    }

    pub fn on_node_removed(&mut self, node: NodeId) {
        if self.camera == Some(node) {
            debug!("The volume camera has been removed");
            self.camera = None;
        }
    }

    /// The host reported a new render volume size. It's applied once the host stopped changing it.
    pub fn propose_render_volume(&mut self, size: Vec3, now: Instant) {
        if !is_valid_volume(size) {
            error!("Ignoring the render volume size {}, it has to be positive along every axis", size);
            return;
        }
        self.pending_volume.propose(size, now);
    }

    pub fn update<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        host: &S,
        backend: &mut B,
        root: RenderEntity,
        now: Instant,
    ) {
        profiling::scope!("VolumeCameraSystem::update");
        if let Some(size) = self.pending_volume.poll(now)
            && size != self.render_volume
        {
            self.render_volume = size;
            self.scale = volume_scale(size, self.box_size);
            info!("Render volume settled at {}, scaling by {}", size, self.scale);
        }

        if let Some(camera) = self.camera {
            match host.node(camera).filter(|_| host.is_node_valid(camera)) {
                Some(info) => self.translation = info.global_position * self.offset_factor,
                None => {
                    debug!("The volume camera {:?} has been freed", camera);
                    self.camera = None;
                }
            }
        }

        backend.set_transform(
            root,
            &EntityTransform {
                translation: self.translation,
                rotation: Quat::IDENTITY,
                scale: Vec3::splat(self.scale),
            },
        );
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn box_size(&self) -> Vec3 {
        self.box_size
    }

    pub fn camera(&self) -> Option<NodeId> {
        self.camera
    }

    /// Back to the state before any volume camera was seen, the settled render volume is kept.
    pub fn reset(&mut self) {
        self.camera = None;
        self.box_size = Vec3::ONE;
        self.scale = volume_scale(self.render_volume, self.box_size);
        self.translation = Vec3::ZERO;
    }
}
