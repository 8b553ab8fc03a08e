use crate::rendering::common::types::{BoundingBox, MeshContents, RenderMaterial, Texture};
use crate::rendering::render_backend::{
    AudioHandle, CollisionBox, ComponentKind, EntityComponent, EntityTransform, MaterialHandle, MeshHandle,
    RenderBackend, RenderEntity, TextureHandle,
};
use anyhow::{Context, anyhow, bail};
use glam::Affine3A;
use hecs::{Entity, World};
use itertools::Itertools;
use log::{error, trace, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Name(pub String);
pub struct Parent(pub Entity);
pub struct Enabled(pub bool);
pub struct Model {
    pub mesh: MeshHandle,
    pub materials: Vec<MaterialHandle>,
}
pub struct GroundingShadow(pub bool);
pub struct InputTarget;
pub struct HoverEffect;
pub struct Collision {
    pub shape: CollisionBox,
    pub filter_disabled: bool,
}
pub struct Draggable;
pub struct JointTransforms(pub Vec<EntityTransform>);

#[derive(Debug, Clone)]
pub struct StoredMaterial {
    pub material: RenderMaterial,
    pub albedo_texture: Option<TextureHandle>,
    pub emission_texture: Option<TextureHandle>,
}

#[derive(Debug, Clone)]
pub struct StoredTexture {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct AudioClip {
    pub path: PathBuf,
    pub byte_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlayback {
    pub entity: RenderEntity,
    pub audio: AudioHandle,
    pub gain_db: f32,
}

/// An in-process render scene: the entity tree lives in a hecs [`World`], resources are kept in handle maps.
/// Nothing is drawn, which makes it suitable for headless runs and tests.
#[derive(Default)]
pub struct HecsRenderScene {
    world: World,
    meshes: HashMap<MeshHandle, Arc<MeshContents>>,
    materials: HashMap<MaterialHandle, StoredMaterial>,
    textures: HashMap<TextureHandle, StoredTexture>,
    audio_clips: HashMap<AudioHandle, AudioClip>,
    audio_playbacks: Vec<AudioPlayback>,
    next_handle: u64,
}

#[inline]
fn to_hecs(entity: RenderEntity) -> Option<Entity> {
    Entity::from_bits(entity.0)
}

#[inline]
fn from_hecs(entity: Entity) -> RenderEntity {
    RenderEntity(entity.to_bits().get())
}

impl HecsRenderScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn live(&self, entity: RenderEntity) -> Option<Entity> {
        to_hecs(entity).filter(|&e| self.world.contains(e))
    }

    fn insert<T: hecs::Component>(&mut self, entity: RenderEntity, component: T) {
        let Some(e) = self.live(entity) else {
            warn!("Inserting a component into the unknown entity {:?}", entity);
            return;
        };

        if self.world.insert_one(e, component).is_err() {
            error!("Inserting a component into {:?} failed", entity);
        }
    }

    pub fn entity_count(&self) -> usize {
        self.world.len() as usize
    }

    pub fn name(&self, entity: RenderEntity) -> Option<String> {
        let e = self.live(entity)?;
        self.world.get::<&Name>(e).ok().map(|name| name.0.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<RenderEntity> {
        self.world
            .query::<&Name>()
            .iter()
            .find(|(_, entity_name)| entity_name.0 == name)
            .map(|(e, _)| from_hecs(e))
    }

    pub fn mesh(&self, mesh: MeshHandle) -> Option<Arc<MeshContents>> {
        self.meshes.get(&mesh).cloned()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material(&self, material: MaterialHandle) -> Option<&StoredMaterial> {
        self.materials.get(&material)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&StoredTexture> {
        self.textures.get(&texture)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn collision(&self, entity: RenderEntity) -> Option<(CollisionBox, bool)> {
        let e = self.live(entity)?;
        self.world
            .get::<&Collision>(e)
            .ok()
            .map(|collision| (collision.shape, collision.filter_disabled))
    }

    pub fn joint_transforms(&self, entity: RenderEntity) -> Option<Vec<EntityTransform>> {
        let e = self.live(entity)?;
        self.world.get::<&JointTransforms>(e).ok().map(|joints| joints.0.clone())
    }

    pub fn audio_playbacks(&self) -> &[AudioPlayback] {
        &self.audio_playbacks
    }

    pub fn audio_clip_count(&self) -> usize {
        self.audio_clips.len()
    }

    /// Log friendly multi line rendering of the entity tree below `root`.
    pub fn describe_tree(&self, root: RenderEntity) -> String {
        let mut out = String::new();
        self.describe_entity(root, 0, &mut out);
        out
    }

    fn describe_entity(&self, entity: RenderEntity, depth: usize, out: &mut String) {
        let transform = self.transform(entity).unwrap_or_default();
        let model = self
            .model(entity)
            .and_then(|(mesh, _)| self.mesh(mesh))
            .map(|mesh| format!(" model={} ({} vertices)", mesh.name, mesh.vertex_count()))
            .unwrap_or_default();

        out.push_str(&format!(
            "{}{} pos={:?}{}{}\n",
            "  ".repeat(depth),
            self.name(entity).unwrap_or_else(|| format!("{:?}", entity)),
            transform.translation.to_array(),
            if self.is_enabled(entity) { "" } else { " (disabled)" },
            model
        ));

        for child in self.children(entity) {
            self.describe_entity(child, depth + 1, out);
        }
    }
}

impl RenderBackend for HecsRenderScene {
    fn create_entity(&mut self, name: &str) -> RenderEntity {
        let entity = self
            .world
            .spawn((Name(name.to_string()), EntityTransform::IDENTITY, Enabled(true)));
        from_hecs(entity)
    }

    fn destroy_entity(&mut self, entity: RenderEntity) {
        let Some(e) = self.live(entity) else {
            return;
        };

        for child in self.children(entity) {
            if let Some(child) = to_hecs(child) {
                let _ = self.world.remove_one::<Parent>(child);
            }
        }

        if self.world.despawn(e).is_err() {
            error!("Despawning {:?} failed", entity);
        }
    }

    fn is_alive(&self, entity: RenderEntity) -> bool {
        self.live(entity).is_some()
    }

    fn set_parent(&mut self, entity: RenderEntity, parent: Option<RenderEntity>) -> Result<(), anyhow::Error> {
        let e = self
            .live(entity)
            .ok_or_else(|| anyhow!("Entity {:?} does not exist", entity))?;

        let Some(parent) = parent else {
            let _ = self.world.remove_one::<Parent>(e);
            return Ok(());
        };

        let p = self
            .live(parent)
            .ok_or_else(|| anyhow!("Parent {:?} does not exist", parent))?;

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == entity {
                bail!("Parenting {:?} to {:?} would create a cycle", entity, parent);
            }
            ancestor = self.parent(current);
        }

        self.world
            .insert_one(e, Parent(p))
            .context("Setting the parent component")?;
        Ok(())
    }

    fn parent(&self, entity: RenderEntity) -> Option<RenderEntity> {
        let e = self.live(entity)?;
        self.world.get::<&Parent>(e).ok().map(|parent| from_hecs(parent.0))
    }

    fn children(&self, entity: RenderEntity) -> Vec<RenderEntity> {
        let Some(e) = self.live(entity) else {
            return vec![];
        };

        self.world
            .query::<&Parent>()
            .iter()
            .filter(|(_, parent)| parent.0 == e)
            .map(|(child, _)| from_hecs(child))
            .sorted()
            .collect_vec()
    }

    fn set_transform(&mut self, entity: RenderEntity, transform: &EntityTransform) {
        if let Some(e) = self.live(entity) {
            if let Ok(mut current) = self.world.get::<&mut EntityTransform>(e) {
                *current = *transform;
            }
        }
    }

    fn transform(&self, entity: RenderEntity) -> Option<EntityTransform> {
        let e = self.live(entity)?;
        self.world.get::<&EntityTransform>(e).ok().map(|transform| *transform)
    }

    fn world_transform(&self, entity: RenderEntity) -> Option<Affine3A> {
        let mut transform = self.transform(entity)?.to_affine();
        let mut current = self.parent(entity);
        while let Some(parent) = current {
            transform = self.transform(parent)?.to_affine() * transform;
            current = self.parent(parent);
        }
        Some(transform)
    }

    fn set_enabled(&mut self, entity: RenderEntity, enabled: bool) {
        if let Some(e) = self.live(entity) {
            if let Ok(mut current) = self.world.get::<&mut Enabled>(e) {
                current.0 = enabled;
            }
        }
    }

    fn is_enabled(&self, entity: RenderEntity) -> bool {
        self.live(entity)
            .and_then(|e| self.world.get::<&Enabled>(e).ok().map(|enabled| enabled.0))
            .unwrap_or(false)
    }

    fn add_mesh(&mut self, mesh: Arc<MeshContents>) -> Result<MeshHandle, anyhow::Error> {
        for (part_idx, part) in mesh.parts.iter().enumerate() {
            let vertex_count = part.vertex_buffers.position_buffer.len();
            if part.index_buffer.len() % 3 != 0 {
                bail!("Part {} of {} has a partial triangle", part_idx, mesh.name);
            }
            if part.index_buffer.iter().any(|&idx| idx as usize >= vertex_count) {
                bail!("Part {} of {} indexes past its {} vertices", part_idx, mesh.name, vertex_count);
            }
        }

        let handle = MeshHandle(self.next_handle());
        trace!("Added mesh {} as {:?}", mesh.name, handle);
        self.meshes.insert(handle, mesh);
        Ok(handle)
    }

    fn remove_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn add_texture(&mut self, texture: &Texture) -> Result<TextureHandle, anyhow::Error> {
        let expected = texture.width as usize * texture.height as usize * 4;
        if texture.rgba8.len() != expected {
            bail!(
                "Texture {} has {} bytes, expected {}",
                texture.label,
                texture.rgba8.len(),
                expected
            );
        }

        let handle = TextureHandle(self.next_handle());
        self.textures.insert(
            handle,
            StoredTexture {
                label: texture.label.clone(),
                width: texture.width,
                height: texture.height,
            },
        );
        Ok(handle)
    }

    fn remove_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn add_material(
        &mut self,
        material: &RenderMaterial,
        albedo_texture: Option<TextureHandle>,
        emission_texture: Option<TextureHandle>,
    ) -> MaterialHandle {
        let handle = MaterialHandle(self.next_handle());
        self.materials.insert(
            handle,
            StoredMaterial {
                material: material.clone(),
                albedo_texture,
                emission_texture,
            },
        );
        handle
    }

    fn remove_material(&mut self, material: MaterialHandle) {
        self.materials.remove(&material);
    }

    fn set_model(&mut self, entity: RenderEntity, mesh: MeshHandle, materials: Vec<MaterialHandle>) {
        if !self.meshes.contains_key(&mesh) {
            error!("Model of {:?} references the unknown mesh {:?}", entity, mesh);
            return;
        }

        self.insert(entity, Model { mesh, materials });
    }

    fn clear_model(&mut self, entity: RenderEntity) {
        if let Some(e) = self.live(entity) {
            let _ = self.world.remove_one::<Model>(e);
            let _ = self.world.remove_one::<JointTransforms>(e);
        }
    }

    fn model(&self, entity: RenderEntity) -> Option<(MeshHandle, Vec<MaterialHandle>)> {
        let e = self.live(entity)?;
        self.world
            .get::<&Model>(e)
            .ok()
            .map(|model| (model.mesh, model.materials.clone()))
    }

    fn visual_bounds(&self, entity: RenderEntity) -> Option<BoundingBox> {
        let (mesh, _) = self.model(entity)?;
        self.meshes.get(&mesh)?.bounds()
    }

    fn insert_component(&mut self, entity: RenderEntity, component: EntityComponent) {
        match component {
            EntityComponent::GroundingShadow { casts_shadow } => self.insert(entity, GroundingShadow(casts_shadow)),
            EntityComponent::InputTarget => self.insert(entity, InputTarget),
            EntityComponent::HoverEffect => self.insert(entity, HoverEffect),
            EntityComponent::Collision { shape, filter_disabled } => self.insert(
                entity,
                Collision {
                    shape,
                    filter_disabled,
                },
            ),
            EntityComponent::Draggable => self.insert(entity, Draggable),
        }
    }

    fn has_component(&self, entity: RenderEntity, kind: ComponentKind) -> bool {
        let Some(e) = self.live(entity) else {
            return false;
        };

        match kind {
            ComponentKind::GroundingShadow => self.world.get::<&GroundingShadow>(e).is_ok(),
            ComponentKind::InputTarget => self.world.get::<&InputTarget>(e).is_ok(),
            ComponentKind::HoverEffect => self.world.get::<&HoverEffect>(e).is_ok(),
            ComponentKind::Collision => self.world.get::<&Collision>(e).is_ok(),
            ComponentKind::Draggable => self.world.get::<&Draggable>(e).is_ok(),
        }
    }

    fn joint_count(&self, entity: RenderEntity) -> Option<usize> {
        let (mesh, _) = self.model(entity)?;
        let mesh = self.meshes.get(&mesh)?;
        if !mesh.is_skinned() {
            return None;
        }
        mesh.skeleton.as_ref().map(|skeleton| skeleton.joint_count())
    }

    fn set_joint_transforms(&mut self, entity: RenderEntity, transforms: &[EntityTransform]) {
        let Some(e) = self.live(entity) else {
            return;
        };

        if let Ok(mut joints) = self.world.get::<&mut JointTransforms>(e) {
            joints.0.clear();
            joints.0.extend_from_slice(transforms);
            return;
        }

        self.insert(entity, JointTransforms(transforms.to_vec()));
    }

    fn load_audio(&mut self, path: &Path) -> Result<AudioHandle, anyhow::Error> {
        let bytes = std::fs::read(path).with_context(|| format!("Reading audio file {}", path.display()))?;
        let handle = AudioHandle(self.next_handle());
        self.audio_clips.insert(
            handle,
            AudioClip {
                path: path.to_path_buf(),
                byte_len: bytes.len(),
            },
        );
        Ok(handle)
    }

    fn play_audio(&mut self, entity: RenderEntity, audio: AudioHandle, gain_db: f32) {
        if !self.audio_clips.contains_key(&audio) || !self.is_alive(entity) {
            warn!("Can't play {:?} on {:?}", audio, entity);
            return;
        }

        self.audio_playbacks.push(AudioPlayback {
            entity,
            audio,
            gain_db,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::common::primitives::generate_box;
    use glam::{Quat, Vec3};

    #[test]
    fn parenting_and_world_transform() -> Result<(), anyhow::Error> {
        let mut scene = HecsRenderScene::new();
        let root = scene.create_entity("root");
        let child = scene.create_entity("child");
        scene.set_parent(child, Some(root))?;

        scene.set_transform(
            root,
            &EntityTransform {
                translation: Vec3::new(1.0, 0.0, 0.0),
                rotation: Quat::IDENTITY,
                scale: Vec3::splat(2.0),
            },
        );
        scene.set_transform(
            child,
            &EntityTransform {
                translation: Vec3::new(0.0, 1.0, 0.0),
                ..Default::default()
            },
        );

        assert_eq!(scene.parent(child), Some(root));
        assert_eq!(scene.children(root), vec![child]);
        let world = scene.world_transform(child).expect("alive");
        assert!(Vec3::from(world.translation).abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        Ok(())
    }

    #[test]
    fn parent_cycles_are_rejected() -> Result<(), anyhow::Error> {
        let mut scene = HecsRenderScene::new();
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        scene.set_parent(b, Some(a))?;
        assert!(scene.set_parent(a, Some(b)).is_err());
        assert!(scene.set_parent(a, Some(a)).is_err());
        Ok(())
    }

    #[test]
    fn destroy_detaches_children() -> Result<(), anyhow::Error> {
        let mut scene = HecsRenderScene::new();
        let parent = scene.create_entity("parent");
        let child = scene.create_entity("child");
        scene.set_parent(child, Some(parent))?;

        scene.destroy_entity(parent);
        assert!(!scene.is_alive(parent));
        assert!(scene.is_alive(child));
        assert_eq!(scene.parent(child), None);
        // destroying twice is harmless
        scene.destroy_entity(parent);
        Ok(())
    }

    #[test]
    fn models_and_bounds() -> Result<(), anyhow::Error> {
        let mut scene = HecsRenderScene::new();
        let entity = scene.create_entity("box");
        let mesh = scene.add_mesh(Arc::new(generate_box(Vec3::new(1.0, 2.0, 3.0))))?;
        let material = scene.add_material(&RenderMaterial::white_non_metallic(), None, None);
        scene.set_model(entity, mesh, vec![material]);

        assert_eq!(scene.model(entity), Some((mesh, vec![material])));
        let bounds = scene.visual_bounds(entity).expect("bounds");
        assert_eq!(bounds.extents(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(scene.joint_count(entity), None);
        Ok(())
    }

    #[test]
    fn components() {
        let mut scene = HecsRenderScene::new();
        let entity = scene.create_entity("pickable");
        assert!(!scene.has_component(entity, ComponentKind::InputTarget));
        scene.insert_component(entity, EntityComponent::InputTarget);
        scene.insert_component(
            entity,
            EntityComponent::Collision {
                shape: CollisionBox {
                    center: Vec3::ZERO,
                    size: Vec3::ONE,
                },
                filter_disabled: true,
            },
        );
        assert!(scene.has_component(entity, ComponentKind::InputTarget));
        assert!(scene.has_component(entity, ComponentKind::Collision));
        assert!(!scene.has_component(entity, ComponentKind::HoverEffect));
    }

    #[test]
    fn invalid_texture_size_is_rejected() {
        let mut scene = HecsRenderScene::new();
        let texture = Texture {
            label: "broken".to_string(),
            width: 4,
            height: 4,
            rgba8: vec![0; 7],
        };
        assert!(scene.add_texture(&texture).is_err());
        assert!(scene.add_texture(&Texture::unknown_texture()).is_ok());
    }
}
