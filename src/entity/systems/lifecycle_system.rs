use crate::entity::components::mirrored::{MirroredNode, ModelBinding, ModelSource};
use crate::entity::systems::systems::SceneContext;
use crate::rendering::render_backend::{CollisionBox, EntityComponent, RenderBackend, RenderEntity};
use crate::rendering::resource_cache::ResourceKey;
use crate::settings::MirrorSettings;
use crate::simulation::types::{CollisionShapeInfo, MeshShape, NodeId, NodeInfo, ResourceId};
use crate::simulation::{SIGNAL_DRAG, SimulationHost};
use glam::Vec3;
use log::{debug, error, trace};

/// A node that has been turned into an entity during this pass.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub info: NodeInfo,
    pub entity: RenderEntity,
    /// The skeleton driving the entity's joints, when its model ended up skinned.
    pub skeleton: Option<ResourceId>,
}

#[derive(Debug, Default)]
pub struct LifecycleReport {
    pub materialized: Vec<Materialized>,
    pub removed: Vec<(NodeId, RenderEntity)>,
}

enum ParentLink {
    Root,
    Entity(RenderEntity),
    /// The parent is a spatial node that has not been materialized yet.
    Await,
}

/// Drives nodes through `Pending -> Materialized -> Removed`, see [`crate::entity::entity_tracker`].
pub struct LifecycleSystem {
    parent_retry_passes: u32,
    grounding_shadows: bool,
    validity_sweep_interval: u64,
    passes: u64,
}

impl LifecycleSystem {
    pub fn new(settings: &MirrorSettings) -> Self {
        Self {
            parent_retry_passes: settings.parent_retry_passes,
            grounding_shadows: settings.grounding_shadows,
            validity_sweep_interval: settings.validity_sweep_interval,
            passes: 0,
        }
    }

    /// Materializes the nodes announced during earlier passes, retries pending parent links and processes removals.
    /// Nodes announced during this pass are held back for the next one.
    pub fn update<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        ctx: &mut SceneContext<'_, S, B>,
    ) -> LifecycleReport {
        profiling::scope!("LifecycleSystem::update");
        self.passes += 1;
        let mut report = LifecycleReport::default();

        for node in ctx.tracker.take_pending() {
            if let Some(materialized) = self.materialize(ctx, node) {
                report.materialized.push(materialized);
            }
        }

        self.retry_parent_links(ctx);

        if self.validity_sweep_interval > 0 && self.passes % self.validity_sweep_interval == 0 {
            self.sweep_invalid(ctx);
        }

        for node in ctx.tracker.take_removals() {
            if let Some(entity) = Self::remove(ctx, node) {
                report.removed.push((node, entity));
            }
        }

        ctx.tracker.promote_announced();
        report
    }

    fn materialize<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        ctx: &mut SceneContext<'_, S, B>,
        node: NodeId,
    ) -> Option<Materialized> {
        if !ctx.host.is_node_valid(node) {
            debug!("Node {:?} was freed before it could be mirrored", node);
            return None;
        }

        let Some(info) = ctx.host.node(node) else {
            debug!("Node {:?} was freed before it could be mirrored", node);
            return None;
        };

        if !info.class.is_spatial() {
            trace!("Not mirroring {} ({}), it isn't spatial", info.name, info.class.class_name());
            return None;
        }

        if ctx.tracker.get(node).is_some() {
            error!("Node {} ({:?}) is already mirrored", info.name, node);
            return None;
        }

        let entity = ctx.backend.create_entity(&format!("{}({})", info.name, node.0));
        if let Err(err) = ctx.backend.set_parent(entity, Some(ctx.root)) {
            error!("Can't attach {} to the mirror root: {:#}", info.name, err);
        }

        let model = model_binding(&info);
        let skeleton = model.as_ref().and_then(|binding| apply_model(ctx, entity, binding));

        if info.metadata.grounding_shadow.unwrap_or(self.grounding_shadows) {
            ctx.backend
                .insert_component(entity, EntityComponent::GroundingShadow { casts_shadow: true });
        }

        if info.ray_pickable {
            ctx.backend.insert_component(entity, EntityComponent::InputTarget);
            if info.metadata.hover_effect != Some(false) {
                ctx.backend.insert_component(entity, EntityComponent::HoverEffect);
            }
            let fallback = info.collision_shapes.iter().find_map(|shape| match shape {
                CollisionShapeInfo::Box { size } => Some(*size),
                CollisionShapeInfo::Other { .. } => None,
            });
            update_collision(ctx.backend, entity, fallback.or(Some(Vec3::splat(0.1))));
        }

        if info.has_signal(SIGNAL_DRAG) {
            ctx.backend.insert_component(entity, EntityComponent::Draggable);
        }

        ctx.tracker.insert(
            node,
            MirroredNode {
                entity,
                sim_parent: info.parent,
                linked_parent: NodeId::NONE,
                model,
                ray_pickable: info.ray_pickable,
            },
        );

        match resolve_parent(ctx, info.parent) {
            ParentLink::Root => {}
            ParentLink::Entity(parent) => {
                link(ctx, node, info.parent, parent);
            }
            ParentLink::Await => {
                trace!("{} waits for its parent {:?}", info.name, info.parent);
                ctx.tracker.await_parent(node, info.parent);
            }
        }

        trace!("Mirrored {} as {:?}", info.name, entity);
        Some(Materialized { info, entity, skeleton })
    }

    /// Links nodes whose parent has shown up since. Nodes that waited for too many passes are reported once and
    /// stay below the mirror root.
    fn retry_parent_links<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        ctx: &mut SceneContext<'_, S, B>,
    ) {
        for mut awaiting in ctx.tracker.take_awaiting_parent() {
            match resolve_parent(ctx, awaiting.parent) {
                ParentLink::Entity(parent) => link(ctx, awaiting.node, awaiting.parent, parent),
                // the parent is gone or no longer spatial
                ParentLink::Root => {}
                ParentLink::Await if awaiting.passes >= self.parent_retry_passes => {
                    error!(
                        "Node {:?} gave up waiting for its parent {:?} after {} passes, it stays below the mirror root",
                        awaiting.node,
                        awaiting.parent,
                        awaiting.passes + 1
                    );
                    ctx.tracker.report_orphan();
                }
                ParentLink::Await => {
                    awaiting.passes += 1;
                    ctx.tracker.requeue_awaiting_parent(awaiting);
                }
            }
        }
    }

    fn sweep_invalid<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(&mut self, ctx: &mut SceneContext<'_, S, B>) {
        let freed: Vec<NodeId> = ctx
            .tracker
            .iter()
            .map(|(&node, _)| node)
            .filter(|&node| !ctx.host.is_node_valid(node))
            .collect();

        for node in freed {
            debug!("Node {:?} has been freed without a notification", node);
            ctx.tracker.queue_removal(node);
        }
    }

    fn remove<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        ctx: &mut SceneContext<'_, S, B>,
        node: NodeId,
    ) -> Option<RenderEntity> {
        let Some(mirrored) = ctx.tracker.remove(node) else {
            trace!("Removal of {:?}, which isn't mirrored", node);
            return None;
        };

        ctx.cache.remove_dependent(mirrored.entity);

        // the simulation removes children first, anything left has been moved elsewhere
        for child in ctx.backend.children(mirrored.entity) {
            if let Err(err) = ctx.backend.set_parent(child, Some(ctx.root)) {
                error!("Can't move {:?} to the mirror root: {:#}", child, err);
            }
            if let Some(child_node) = ctx.tracker.node_for_entity(child)
                && let Some(child_mirrored) = ctx.tracker.get_mut(child_node)
            {
                child_mirrored.linked_parent = NodeId::NONE;
            }
        }

        if let Err(err) = ctx.backend.set_parent(mirrored.entity, None) {
            error!("Can't detach {:?}: {:#}", mirrored.entity, err);
        }
        ctx.backend.destroy_entity(mirrored.entity);
        Some(mirrored.entity)
    }

    /// Reassigns the models of `entities` after their resources changed or finished converting. Returns the
    /// skeleton of every rebuilt entity.
    pub fn rebuild_models<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        ctx: &mut SceneContext<'_, S, B>,
        entities: impl IntoIterator<Item = RenderEntity>,
    ) -> Vec<(RenderEntity, Option<ResourceId>)> {
        profiling::scope!("LifecycleSystem::rebuild_models");
        let mut rebuilt = vec![];

        for entity in entities {
            // removed in the meantime
            let Some(node) = ctx.tracker.node_for_entity(entity) else {
                continue;
            };
            let Some(mirrored) = ctx.tracker.get(node) else {
                continue;
            };
            let Some(binding) = mirrored.model.clone() else {
                continue;
            };
            let ray_pickable = mirrored.ray_pickable;

            let skeleton = apply_model(ctx, entity, &binding);
            if ray_pickable {
                update_collision(ctx.backend, entity, None);
            }
            rebuilt.push((entity, skeleton));
        }

        rebuilt
    }

    /// The simulation reported different parents for these nodes than the ones we know about.
    pub fn apply_reparents<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        ctx: &mut SceneContext<'_, S, B>,
        requests: &[(NodeId, NodeId)],
    ) {
        for &(node, parent) in requests {
            let Some(mirrored) = ctx.tracker.get_mut(node) else {
                continue;
            };
            mirrored.sim_parent = parent;
            let entity = mirrored.entity;
            debug!("Node {:?} moved to the parent {:?}", node, parent);

            match resolve_parent(ctx, parent) {
                ParentLink::Entity(parent_entity) => link(ctx, node, parent, parent_entity),
                ParentLink::Root => {
                    if let Err(err) = ctx.backend.set_parent(entity, Some(ctx.root)) {
                        error!("Can't move {:?} to the mirror root: {:#}", entity, err);
                    }
                    if let Some(mirrored) = ctx.tracker.get_mut(node) {
                        mirrored.linked_parent = NodeId::NONE;
                    }
                }
                ParentLink::Await => ctx.tracker.await_parent(node, parent),
            }
        }
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}

fn resolve_parent<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
    ctx: &SceneContext<'_, S, B>,
    parent: NodeId,
) -> ParentLink {
    if parent.is_none() {
        return ParentLink::Root;
    }

    if let Some(entity) = ctx.tracker.entity_for_node(parent) {
        return ParentLink::Entity(entity);
    }

    let spatial_parent = ctx.host.is_node_valid(parent)
        && ctx
            .host
            .node(parent)
            .is_some_and(|parent| parent.class.is_spatial());

    if spatial_parent {
        ParentLink::Await
    } else {
        ParentLink::Root
    }
}

fn link<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
    ctx: &mut SceneContext<'_, S, B>,
    node: NodeId,
    parent: NodeId,
    parent_entity: RenderEntity,
) {
    let Some(mirrored) = ctx.tracker.get_mut(node) else {
        return;
    };

    match ctx.backend.set_parent(mirrored.entity, Some(parent_entity)) {
        Ok(()) => mirrored.linked_parent = parent,
        Err(err) => error!("Can't link {:?} to its parent {:?}: {:#}", node, parent, err),
    }
}

fn model_binding(info: &NodeInfo) -> Option<ModelBinding> {
    let mesh = info.mesh.as_ref()?;
    let source = match &mesh.shape {
        MeshShape::Arbitrary(id) => ModelSource::Converted {
            key: ResourceKey::new(
                *id,
                mesh.skeleton,
                mesh.flip_winding_if_no_indices,
                mesh.instance_transforms.as_deref(),
            ),
            instance_transforms: mesh.instance_transforms.clone(),
        },
        shape => ModelSource::Primitive(shape.clone()),
    };

    Some(ModelBinding {
        source,
        materials: mesh.materials.clone(),
    })
}

/// Assigns mesh and materials. The model is cleared while the mesh is still converting in the background, the
/// entity is rebuilt once that finished. Returns the skeleton if the assigned model is skinned.
fn apply_model<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
    ctx: &mut SceneContext<'_, S, B>,
    entity: RenderEntity,
    binding: &ModelBinding,
) -> Option<ResourceId> {
    let mesh = match &binding.source {
        ModelSource::Primitive(shape) => ctx.cache.primitive(ctx.backend, shape),
        ModelSource::Converted {
            key,
            instance_transforms,
        } => ctx
            .cache
            .mesh(ctx.host, ctx.backend, *key, instance_transforms.as_deref(), entity),
    };

    let Some(mesh) = mesh else {
        ctx.backend.clear_model(entity);
        return None;
    };

    let materials = if binding.materials.is_empty() {
        vec![ctx.cache.default_material(ctx.backend)]
    } else {
        binding
            .materials
            .iter()
            .map(|material| match material {
                Some(id) => ctx.cache.material(ctx.host, ctx.backend, *id, entity),
                None => ctx.cache.default_material(ctx.backend),
            })
            .collect()
    };

    ctx.backend.set_model(entity, mesh, materials);
    binding
        .skeleton()
        .filter(|_| ctx.backend.joint_count(entity).is_some_and(|count| count > 0))
}

/// Picking collision follows the visual bounds. Without bounds, `fallback` is used if given.
fn update_collision<B: RenderBackend + ?Sized>(backend: &mut B, entity: RenderEntity, fallback: Option<Vec3>) {
    let shape = match backend.visual_bounds(entity) {
        Some(bounds) => CollisionBox {
            center: bounds.center(),
            size: bounds.extents(),
        },
        None => match fallback {
            Some(size) => CollisionBox {
                center: Vec3::ZERO,
                size,
            },
            None => return,
        },
    };

    backend.insert_component(
        entity,
        EntityComponent::Collision {
            shape,
            filter_disabled: true,
        },
    );
}
