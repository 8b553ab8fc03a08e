//! The render engine is an external collaborator that owns the mirrored entity tree. Everything the mirror does to it
//! goes through [`RenderBackend`]; [`scene_backend::HecsRenderScene`] is the in-process implementation.

use crate::rendering::common::types::{BoundingBox, MeshContents, RenderMaterial, Texture};
use glam::{Affine3A, Quat, Vec3};
use std::path::Path;
use std::sync::Arc;

pub mod backend_loaders;
pub mod scene_backend;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderEntity(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EntityTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for EntityTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl EntityTransform {
    pub const IDENTITY: EntityTransform = EntityTransform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// An axis aligned collision box in the entity's local space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CollisionBox {
    pub center: Vec3,
    pub size: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityComponent {
    GroundingShadow { casts_shadow: bool },
    InputTarget,
    HoverEffect,
    /// Collision used for input picking only, `filter_disabled` takes it out of collision detection.
    Collision { shape: CollisionBox, filter_disabled: bool },
    Draggable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    GroundingShadow,
    InputTarget,
    HoverEffect,
    Collision,
    Draggable,
}

impl EntityComponent {
    pub fn kind(&self) -> ComponentKind {
        match self {
            EntityComponent::GroundingShadow { .. } => ComponentKind::GroundingShadow,
            EntityComponent::InputTarget => ComponentKind::InputTarget,
            EntityComponent::HoverEffect => ComponentKind::HoverEffect,
            EntityComponent::Collision { .. } => ComponentKind::Collision,
            EntityComponent::Draggable => ComponentKind::Draggable,
        }
    }
}

pub trait RenderBackend {
    fn create_entity(&mut self, name: &str) -> RenderEntity;
    /// Destroys the entity. Its children are detached, not destroyed.
    fn destroy_entity(&mut self, entity: RenderEntity);
    fn is_alive(&self, entity: RenderEntity) -> bool;

    fn set_parent(&mut self, entity: RenderEntity, parent: Option<RenderEntity>) -> Result<(), anyhow::Error>;
    fn parent(&self, entity: RenderEntity) -> Option<RenderEntity>;
    fn children(&self, entity: RenderEntity) -> Vec<RenderEntity>;

    fn set_transform(&mut self, entity: RenderEntity, transform: &EntityTransform);
    fn transform(&self, entity: RenderEntity) -> Option<EntityTransform>;
    /// The entity's transform relative to the scene origin.
    fn world_transform(&self, entity: RenderEntity) -> Option<Affine3A>;
    fn set_enabled(&mut self, entity: RenderEntity, enabled: bool);
    fn is_enabled(&self, entity: RenderEntity) -> bool;

    fn add_mesh(&mut self, mesh: Arc<MeshContents>) -> Result<MeshHandle, anyhow::Error>;
    fn remove_mesh(&mut self, mesh: MeshHandle);
    fn add_texture(&mut self, texture: &Texture) -> Result<TextureHandle, anyhow::Error>;
    fn remove_texture(&mut self, texture: TextureHandle);
    fn add_material(
        &mut self,
        material: &RenderMaterial,
        albedo_texture: Option<TextureHandle>,
        emission_texture: Option<TextureHandle>,
    ) -> MaterialHandle;
    fn remove_material(&mut self, material: MaterialHandle);

    /// Replaces the entity's model, one material per mesh part.
    fn set_model(&mut self, entity: RenderEntity, mesh: MeshHandle, materials: Vec<MaterialHandle>);
    fn clear_model(&mut self, entity: RenderEntity);
    fn model(&self, entity: RenderEntity) -> Option<(MeshHandle, Vec<MaterialHandle>)>;
    /// Bounds of the entity's model in its local space.
    fn visual_bounds(&self, entity: RenderEntity) -> Option<BoundingBox>;

    fn insert_component(&mut self, entity: RenderEntity, component: EntityComponent);
    fn has_component(&self, entity: RenderEntity, kind: ComponentKind) -> bool;

    /// Number of joints of the skinned model of `entity`, `None` if it isn't skinned.
    fn joint_count(&self, entity: RenderEntity) -> Option<usize>;
    fn set_joint_transforms(&mut self, entity: RenderEntity, transforms: &[EntityTransform]);

    fn load_audio(&mut self, path: &Path) -> Result<AudioHandle, anyhow::Error>;
    fn play_audio(&mut self, entity: RenderEntity, audio: AudioHandle, gain_db: f32);
}
