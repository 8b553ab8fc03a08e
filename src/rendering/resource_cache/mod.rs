//! Memoizes the conversion of simulation resources into render resources. Every record subscribes to the `changed`
//! notification of its source, a change drops the converted value and hands back the entities that need a rebuild.

use crate::rendering::common::primitives::{capsule_extents, generate_box, generate_capsule, generate_sphere};
use crate::rendering::common::types::{JointConversionData, MeshContents, RenderMaterial, Texture};
use crate::rendering::importer::material_importer::MaterialImporter;
use crate::rendering::importer::mesh_importer::MeshImporter;
use crate::rendering::importer::skeleton_importer::SkeletonImporter;
use crate::rendering::loader::texture_loader::TextureLoader;
use crate::rendering::render_backend::backend_loaders::{load_material, load_mesh, load_texture};
use crate::rendering::render_backend::{MaterialHandle, MeshHandle, RenderBackend, RenderEntity, TextureHandle};
use crate::rendering::resource_cache::conversion_record::{ConversionRecord, ConversionSlot};
use crate::settings::MirrorSettings;
use crate::simulation::SimulationHost;
use crate::simulation::types::{MeshShape, MeshSource, ResourceId, SkeletonSource};
use dashmap::DashMap;
use glam::{Affine3A, Vec3};
use log::{debug, error, info, trace};
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

pub mod conversion_record;

/// Meshes are only shared between nodes that agree on all of these. The converted mesh contains the instance table,
/// so instanced geometry is keyed by the exact bits of its transforms.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub mesh: ResourceId,
    pub skeleton: Option<ResourceId>,
    pub flip_winding_if_no_indices: bool,
    pub instances: Option<InstanceKey>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub count: usize,
    pub transforms_hash: u64,
}

impl InstanceKey {
    pub fn new(transforms: &[Affine3A]) -> Self {
        let mut hasher = DefaultHasher::new();
        for transform in transforms {
            for value in transform.to_cols_array() {
                value.to_bits().hash(&mut hasher);
            }
        }
        Self {
            count: transforms.len(),
            transforms_hash: hasher.finish(),
        }
    }
}

impl ResourceKey {
    pub fn new(
        mesh: ResourceId,
        skeleton: Option<ResourceId>,
        flip_winding_if_no_indices: bool,
        instance_transforms: Option<&[Affine3A]>,
    ) -> Self {
        Self {
            mesh,
            skeleton,
            flip_winding_if_no_indices,
            instances: instance_transforms.map(InstanceKey::new),
        }
    }

    pub fn depends_on(&self, id: ResourceId) -> bool {
        self.mesh == id || self.skeleton == Some(id)
    }
}

/// Primitives are cached by their exact dimensions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum PrimitiveKey {
    Box([u32; 3]),
    Sphere(u32),
    Capsule(u32, u32),
}

pub type MeshRecord = ConversionRecord<ResourceKey, MeshContents, MeshHandle>;
pub type MaterialRecord = ConversionRecord<ResourceId, RenderMaterial, MaterialHandle>;
pub type TextureRecord = ConversionRecord<ResourceId, Texture, TextureHandle>;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CacheStatistics {
    pub mesh_conversions: usize,
    pub mesh_hits: usize,
    pub material_conversions: usize,
    pub material_hits: usize,
    pub texture_conversions: usize,
    pub texture_hits: usize,
    pub primitive_generations: usize,
    pub stale_results_discarded: usize,
}

/// Backend resources nothing refers to anymore, once the entities that used them have been rebuilt or destroyed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetiredResources {
    pub meshes: Vec<MeshHandle>,
    pub materials: Vec<MaterialHandle>,
    pub textures: Vec<TextureHandle>,
}

impl RetiredResources {
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.materials.is_empty() && self.textures.is_empty()
    }

    pub fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        if self.is_empty() {
            return;
        }

        trace!(
            "Releasing {} meshes, {} materials and {} textures",
            self.meshes.len(),
            self.materials.len(),
            self.textures.len()
        );
        for mesh in self.meshes {
            backend.remove_mesh(mesh);
        }
        for material in self.materials {
            backend.remove_material(material);
        }
        for texture in self.textures {
            backend.remove_texture(texture);
        }
    }
}

/// Entities to rebuild after a change notification, and the backend resources that are unused once they are rebuilt.
#[derive(Debug, Default)]
pub struct Invalidation {
    pub entities: HashSet<RenderEntity>,
    pub retired: RetiredResources,
}

struct MeshConversionDone {
    key: ResourceKey,
    slot: ConversionSlot<MeshContents>,
}

/// Converted skeletons are keyed by their generation, which every change notification of the skeleton bumps. A
/// conversion that started before the change can only ever store data under the old generation.
type SkeletonKey = (ResourceId, u32);

/// Everything a mesh conversion needs, so that it can run away from the owner thread.
struct MeshJob {
    source: Arc<MeshSource>,
    skeleton: Option<(Arc<SkeletonSource>, u32)>,
    skeletons: Arc<DashMap<SkeletonKey, Arc<JointConversionData>>>,
    flip_winding_if_no_indices: bool,
    instance_transforms: Option<Vec<Affine3A>>,
}

impl MeshJob {
    fn run(self) -> MeshContents {
        let joints = self
            .skeleton
            .and_then(|(skeleton, generation)| skeleton_data(&self.skeletons, &skeleton, generation));

        MeshImporter::convert(
            &self.source,
            joints,
            self.flip_winding_if_no_indices,
            self.instance_transforms.as_deref(),
        )
        .unwrap_or_else(|err| {
            error!("Converting mesh {} failed, using a sphere instead: {:#}", self.source.name, err);
            generate_sphere(1.0)
        })
    }
}

/// Bind pose data is computed once per skeleton and shared between all meshes (and conversion tasks) using it.
fn skeleton_data(
    skeletons: &DashMap<SkeletonKey, Arc<JointConversionData>>,
    skeleton: &SkeletonSource,
    generation: u32,
) -> Option<Arc<JointConversionData>> {
    skeletons
        .entry((skeleton.id, generation))
        .or_try_insert_with(|| SkeletonImporter::convert(skeleton).map(Arc::new))
        .map(|entry| entry.value().clone())
        .map_err(|err| error!("Skeleton {:?} can't be used for skinning: {:#}", skeleton.id, err))
        .ok()
}

pub struct ResourceCache {
    meshes: HashMap<ResourceKey, MeshRecord>,
    materials: HashMap<ResourceId, MaterialRecord>,
    textures: HashMap<ResourceId, TextureRecord>,
    primitives: HashMap<PrimitiveKey, MeshHandle>,
    skeletons: Arc<DashMap<SkeletonKey, Arc<JointConversionData>>>,
    skeleton_generations: HashMap<ResourceId, u32>,
    default_material: Option<MaterialHandle>,
    unknown_texture: Option<TextureHandle>,
    runtime: Option<Runtime>,
    completion_sender: UnboundedSender<MeshConversionDone>,
    completions: UnboundedReceiver<MeshConversionDone>,
    emission_intensity_divisor: f32,
    statistics: CacheStatistics,
}

impl ResourceCache {
    pub fn new(settings: &MirrorSettings) -> Result<Self, anyhow::Error> {
        let runtime = if settings.async_mesh_conversion {
            let threads = settings.conversion_worker_threads.max(1);
            info!("Converting meshes on {} background threads", threads);
            Some(
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .max_blocking_threads(threads)
                    .thread_name("mesh-conversion")
                    .build()?,
            )
        } else {
            None
        };

        let (completion_sender, completions) = unbounded_channel();
        Ok(Self {
            meshes: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            primitives: HashMap::new(),
            skeletons: Arc::new(DashMap::new()),
            skeleton_generations: HashMap::new(),
            default_material: None,
            unknown_texture: None,
            runtime,
            completion_sender,
            completions,
            emission_intensity_divisor: settings.emission_intensity_divisor,
            statistics: CacheStatistics::default(),
        })
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.statistics
    }

    pub fn mesh_record(&self, key: &ResourceKey) -> Option<&MeshRecord> {
        self.meshes.get(key)
    }

    pub fn conversions_in_flight(&self) -> usize {
        self.meshes.values().filter(|record| record.is_in_flight()).count()
    }

    /// Returns the mesh for `key`, converting it first if needed. `None` means the conversion runs in the
    /// background, `entity` gets reported by [`ResourceCache::poll_completions`] once it is done.
    pub fn mesh<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        host: &mut S,
        backend: &mut B,
        key: ResourceKey,
        instance_transforms: Option<&[Affine3A]>,
        entity: RenderEntity,
    ) -> Option<MeshHandle> {
        let record = self.meshes.entry(key).or_insert_with(|| {
            let mut subscriptions = vec![host.subscribe_changed(key.mesh)];
            if let Some(skeleton) = key.skeleton {
                subscriptions.push(host.subscribe_changed(skeleton));
            }
            ConversionRecord::new(key, subscriptions)
        });
        record.dependents.insert(entity);

        if let Some(handle) = record.handle() {
            self.statistics.mesh_hits += 1;
            return Some(handle);
        }

        if record.is_in_flight() {
            return None;
        }

        if record.converted().is_none() {
            self.statistics.mesh_conversions += 1;

            let Some(source) = host.mesh(key.mesh) else {
                error!("Mesh {:?} is not known to the simulation, using a sphere instead", key.mesh);
                record.store(generate_sphere(1.0));
                return load_mesh(backend, record);
            };

            let skeleton = key.skeleton.and_then(|id| {
                let Some(skeleton) = host.skeleton(id) else {
                    error!("Skeleton {:?} is not known, {} stays unskinned", id, source.name);
                    return None;
                };
                let generation = *self.skeleton_generations.entry(id).or_default();
                Some((skeleton, generation))
            });

            let job = MeshJob {
                source,
                skeleton,
                skeletons: self.skeletons.clone(),
                flip_winding_if_no_indices: key.flip_winding_if_no_indices,
                instance_transforms: instance_transforms.map(<[Affine3A]>::to_vec),
            };

            match &self.runtime {
                Some(runtime) => {
                    trace!("Converting {:?} in the background", key);
                    record.set_in_flight(true);
                    let slot = record.slot();
                    let sender = self.completion_sender.clone();
                    runtime.spawn_blocking(move || {
                        slot.store(Some(Arc::new(job.run())));
                        // The receiving cache is gone after a teardown, nothing to do then.
                        let _ = sender.send(MeshConversionDone { key, slot });
                    });
                    return None;
                }
                None => {
                    record.store(job.run());
                }
            }
        }

        load_mesh(backend, record)
    }

    /// Hands finished background conversions to the backend. Returns the entities waiting for them.
    pub fn poll_completions<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> HashSet<RenderEntity> {
        let mut ready = HashSet::new();
        while let Ok(done) = self.completions.try_recv() {
            let Some(record) = self.meshes.get_mut(&done.key) else {
                self.statistics.stale_results_discarded += 1;
                continue;
            };

            if !record.is_current_slot(&done.slot) {
                debug!("Discarding the outdated conversion of {:?}", done.key);
                self.statistics.stale_results_discarded += 1;
                self.prune_outdated_skeletons();
                continue;
            }

            record.set_in_flight(false);
            if load_mesh(backend, record).is_some() {
                ready.extend(record.dependents.iter().copied());
            }
        }
        ready
    }

    /// Blocks until all running conversions have reported back, then polls them.
    pub fn wait_for_conversions<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> HashSet<RenderEntity> {
        let mut ready = HashSet::new();
        while self.conversions_in_flight() > 0 {
            let Some(done) = self.completions.blocking_recv() else {
                break;
            };
            // the channel is never closed while we hold the sender, re-queue and let the poll handle it
            let _ = self.completion_sender.send(done);
            ready.extend(self.poll_completions(backend));
        }
        ready
    }

    pub fn material<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        host: &mut S,
        backend: &mut B,
        id: ResourceId,
        entity: RenderEntity,
    ) -> MaterialHandle {
        let record = self
            .materials
            .entry(id)
            .or_insert_with(|| ConversionRecord::new(id, vec![host.subscribe_changed(id)]));
        record.dependents.insert(entity);

        if let Some(handle) = record.handle() {
            self.statistics.material_hits += 1;
            return handle;
        }

        let material = match record.converted() {
            Some(material) => material,
            None => {
                self.statistics.material_conversions += 1;
                let material = match host.material(id) {
                    Some(source) => MaterialImporter::convert(&source, self.emission_intensity_divisor),
                    None => {
                        error!("Material {:?} is not known to the simulation", id);
                        RenderMaterial::placeholder()
                    }
                };
                record.store(material)
            }
        };

        let (albedo, emission) = material.texture_dependencies();
        let albedo = albedo.and_then(|texture| self.texture(host, backend, texture));
        let emission = emission.and_then(|texture| self.texture(host, backend, texture));

        let handle = self
            .materials
            .get_mut(&id)
            .and_then(|record| load_material(backend, record, albedo, emission));
        handle.unwrap_or_else(|| self.default_material(backend))
    }

    /// Textures that can't be loaded are replaced by the unknown texture checker board.
    pub fn texture<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        host: &mut S,
        backend: &mut B,
        id: ResourceId,
    ) -> Option<TextureHandle> {
        let record = self
            .textures
            .entry(id)
            .or_insert_with(|| ConversionRecord::new(id, vec![host.subscribe_changed(id)]));

        if let Some(handle) = record.handle() {
            self.statistics.texture_hits += 1;
            return Some(handle);
        }

        if record.converted().is_none() {
            self.statistics.texture_conversions += 1;
            let texture = match host.texture(id) {
                Some(source) => TextureLoader::load(host.project_dir(), &source),
                None => {
                    error!("Texture {:?} is not known to the simulation", id);
                    None
                }
            };
            record.store(texture.unwrap_or_else(Texture::unknown_texture));
        }

        match load_texture(backend, record) {
            Some(handle) => Some(handle),
            None => self.unknown_texture(backend),
        }
    }

    pub fn primitive<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, shape: &MeshShape) -> Option<MeshHandle> {
        let key = match *shape {
            MeshShape::Box { size } => PrimitiveKey::Box(size.to_array().map(f32::to_bits)),
            MeshShape::Sphere { radius } => PrimitiveKey::Sphere(radius.to_bits()),
            MeshShape::Capsule { height, radius } => PrimitiveKey::Capsule(height.to_bits(), radius.to_bits()),
            MeshShape::Arbitrary(_) => return None,
        };

        if let Some(&handle) = self.primitives.get(&key) {
            self.statistics.mesh_hits += 1;
            return Some(handle);
        }

        let contents = match *shape {
            MeshShape::Box { size } => generate_box(size),
            MeshShape::Sphere { radius } => generate_sphere(radius),
            MeshShape::Capsule { height, radius } => generate_capsule(height, radius),
            MeshShape::Arbitrary(_) => return None,
        };

        self.statistics.primitive_generations += 1;
        match backend.add_mesh(Arc::new(contents)) {
            Ok(handle) => {
                self.primitives.insert(key, handle);
                Some(handle)
            }
            Err(err) => {
                error!("Backend rejected primitive {:?}: {:#}", shape, err);
                None
            }
        }
    }

    /// White and non-metallic, for models without a material.
    pub fn default_material<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> MaterialHandle {
        *self
            .default_material
            .get_or_insert_with(|| backend.add_material(&RenderMaterial::white_non_metallic(), None, None))
    }

    fn unknown_texture<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Option<TextureHandle> {
        if self.unknown_texture.is_none() {
            self.unknown_texture = backend
                .add_texture(&Texture::unknown_texture())
                .map_err(|err| error!("Can't create the unknown texture: {:#}", err))
                .ok();
        }
        self.unknown_texture
    }

    /// Invalidates every record depending on one of the `changed` resources. Every dependent entity is reported
    /// once, no matter how many of its resources changed.
    pub fn on_resources_changed(&mut self, changed: &HashSet<ResourceId>) -> Invalidation {
        let mut invalidation = Invalidation::default();
        if changed.is_empty() {
            return invalidation;
        }

        for id in changed {
            if let Some(generation) = self.skeleton_generations.get_mut(id) {
                *generation += 1;
                debug!("Skeleton {:?} changed, now at generation {}", id, generation);
            }
        }
        self.prune_outdated_skeletons();

        for record in self.meshes.values_mut().filter(|r| changed.iter().any(|&id| r.key.depends_on(id))) {
            invalidation.retired.meshes.extend(record.invalidate());
            invalidation.entities.extend(record.dependents.drain());
        }

        let mut changed_materials = changed.clone();
        for (id, record) in self.textures.iter_mut().filter(|(id, _)| changed.contains(*id)) {
            invalidation.retired.textures.extend(record.invalidate());
            for (material_id, material) in &self.materials {
                let uses_texture = material.converted().is_some_and(|material| {
                    let (albedo, emission) = material.texture_dependencies();
                    albedo == Some(*id) || emission == Some(*id)
                });
                if uses_texture {
                    changed_materials.insert(*material_id);
                }
            }
        }

        for record in self
            .materials
            .values_mut()
            .filter(|record| changed_materials.contains(&record.key))
        {
            invalidation.retired.materials.extend(record.invalidate());
            invalidation.entities.extend(record.dependents.drain());
        }

        invalidation
    }

    /// Drops skeleton data of older generations, including data stored late by conversions that were running while
    /// the skeleton changed.
    fn prune_outdated_skeletons(&self) {
        self.skeletons
            .retain(|(id, generation), _| self.skeleton_generations.get(id) == Some(generation));
    }

    /// The entity is gone, it no longer depends on any record.
    pub fn remove_dependent(&mut self, entity: RenderEntity) {
        for record in self.meshes.values_mut() {
            record.dependents.remove(&entity);
        }
        for record in self.materials.values_mut() {
            record.dependents.remove(&entity);
        }
    }

    pub fn dependents_of(&self, key: &ResourceKey) -> HashSet<RenderEntity> {
        self.meshes
            .get(key)
            .map(|record| record.dependents.clone())
            .unwrap_or_default()
    }

    /// Drops all records and cancels their subscriptions. Returns every backend resource the cache created, the
    /// caller releases them once no entity uses them anymore.
    pub fn reset<S: SimulationHost + ?Sized>(&mut self, host: &mut S) -> RetiredResources {
        let tokens = self
            .meshes
            .values_mut()
            .flat_map(|record| record.take_subscriptions())
            .chain(self.materials.values_mut().flat_map(|r| r.take_subscriptions()))
            .chain(self.textures.values_mut().flat_map(|r| r.take_subscriptions()))
            .collect::<Vec<_>>();

        debug!(
            "Resetting the resource cache: {} meshes, {} materials, {} textures, {} subscriptions",
            self.meshes.len(),
            self.materials.len(),
            self.textures.len(),
            tokens.len()
        );

        for token in tokens {
            host.unsubscribe_changed(token);
        }

        let retired = RetiredResources {
            meshes: self
                .meshes
                .drain()
                .filter_map(|(_, record)| record.handle())
                .chain(self.primitives.drain().map(|(_, handle)| handle))
                .collect(),
            materials: self
                .materials
                .drain()
                .filter_map(|(_, record)| record.handle())
                .chain(self.default_material.take())
                .collect(),
            textures: self
                .textures
                .drain()
                .filter_map(|(_, record)| record.handle())
                .chain(self.unknown_texture.take())
                .collect(),
        };
        self.skeletons.clear();
        self.skeleton_generations.clear();

        // results of conversions that started before the reset
        while self.completions.try_recv().is_ok() {
            self.statistics.stale_results_discarded += 1;
        }
        retired
    }

    /// Capsules are drawn as boxes of their extents.
    pub fn primitive_extents(shape: &MeshShape) -> Option<Vec3> {
        match *shape {
            MeshShape::Box { size } => Some(size),
            MeshShape::Sphere { radius } => Some(Vec3::splat(radius * 2.0)),
            MeshShape::Capsule { height, radius } => Some(capsule_extents(height, radius)),
            MeshShape::Arbitrary(_) => None,
        }
    }
}
