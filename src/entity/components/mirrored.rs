use crate::rendering::render_backend::RenderEntity;
use crate::rendering::resource_cache::ResourceKey;
use crate::simulation::types::{MeshShape, NodeId, ResourceId};
use glam::Affine3A;

/// Where the model of a mirrored node comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Primitive(MeshShape),
    Converted {
        key: ResourceKey,
        instance_transforms: Option<Vec<Affine3A>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelBinding {
    pub source: ModelSource,
    /// Per surface, `None` uses the default material.
    pub materials: Vec<Option<ResourceId>>,
}

impl ModelBinding {
    pub fn skeleton(&self) -> Option<ResourceId> {
        match &self.source {
            ModelSource::Converted { key, .. } => key.skeleton,
            ModelSource::Primitive(_) => None,
        }
    }
}

/// The render side state of one materialized node.
#[derive(Debug, Clone)]
pub struct MirroredNode {
    pub entity: RenderEntity,
    /// The parent as the simulation last reported it.
    pub sim_parent: NodeId,
    /// The node whose entity we are actually attached to, `NodeId::NONE` for the mirror root.
    pub linked_parent: NodeId,
    pub model: Option<ModelBinding>,
    pub ray_pickable: bool,
}
