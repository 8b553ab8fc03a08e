use glam::{Affine3A, Vec2, Vec3, Vec4};
use std::fmt::{Debug, Formatter};

/// Stable identity of a simulation node. `0` is used for "no node", e.g. as the parent of a scene root.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub i64);

impl NodeId {
    pub const NONE: NodeId = NodeId(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Identity of a simulation resource (mesh, material, texture, skeleton).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

/// Bone indices and weights may arrive in any of the packed array encodings of the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum BoneArray {
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl BoneArray {
    pub fn len(&self) -> usize {
        match self {
            BoneArray::Int32(values) => values.len(),
            BoneArray::Float32(values) => values.len(),
            BoneArray::Float64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn joint_index(&self, idx: usize) -> i32 {
        match self {
            BoneArray::Int32(values) => values[idx],
            BoneArray::Float32(values) => values[idx] as i32,
            BoneArray::Float64(values) => values[idx] as i32,
        }
    }

    pub fn weight(&self, idx: usize) -> f32 {
        match self {
            BoneArray::Int32(values) => values[idx] as f32,
            BoneArray::Float32(values) => values[idx],
            BoneArray::Float64(values) => values[idx] as f32,
        }
    }
}

/// The raw arrays of one mesh surface, as the simulation hands them out.
#[derive(Clone, Default)]
pub struct SurfaceArrays {
    pub primitive: PrimitiveType,
    pub positions: Option<Vec<Vec3>>,
    pub indices: Option<Vec<i32>>,
    pub normals: Option<Vec<Vec3>>,
    /// Packed 4 floats per vertex, the 4th being the binormal sign.
    pub tangents: Option<Vec<f32>>,
    pub uvs: Option<Vec<Vec2>>,
    pub bone_indices: Option<BoneArray>,
    pub bone_weights: Option<BoneArray>,
    pub material: Option<ResourceId>,
}

impl Debug for SurfaceArrays {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ primitive: {:?}, ", self.primitive)?;
        write!(f, "positions: {:?}, ", self.positions.as_ref().map(Vec::len))?;
        write!(f, "indices: {:?}, ", self.indices.as_ref().map(Vec::len))?;
        write!(f, "normals: {:?}, ", self.normals.as_ref().map(Vec::len))?;
        write!(f, "uvs: {:?}, ", self.uvs.as_ref().map(Vec::len))?;
        write!(f, "bone_indices: {:?}, ", self.bone_indices.as_ref().map(BoneArray::len))?;
        write!(f, "material: {:?} }}", self.material)
    }
}

#[derive(Debug, Clone)]
pub struct MeshSource {
    pub id: ResourceId,
    pub name: String,
    pub surfaces: Vec<SurfaceArrays>,
}

#[derive(Debug, Clone)]
pub struct BoneSource {
    pub name: String,
    /// -1 for a root bone
    pub parent: i32,
    pub rest: Affine3A,
}

#[derive(Debug, Clone)]
pub struct SkeletonSource {
    pub id: ResourceId,
    pub bones: Vec<BoneSource>,
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum TransparencyMode {
    #[default]
    Disabled,
    Alpha,
    AlphaScissor {
        threshold: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterialDesc {
    pub albedo_color: Vec4,
    pub albedo_texture: Option<ResourceId>,
    pub transparency: TransparencyMode,
    pub metallic: f32,
    pub roughness: f32,
    pub uv1_offset: Vec3,
    pub uv1_scale: Vec3,
    pub emission_enabled: bool,
    pub emission: Vec4,
    pub emission_texture: Option<ResourceId>,
    /// In nits.
    pub emission_intensity: f32,
}

impl Default for StandardMaterialDesc {
    fn default() -> Self {
        Self {
            albedo_color: Vec4::ONE,
            albedo_texture: None,
            transparency: TransparencyMode::Disabled,
            metallic: 0.0,
            roughness: 1.0,
            uv1_offset: Vec3::ZERO,
            uv1_scale: Vec3::ONE,
            emission_enabled: false,
            emission: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emission_texture: None,
            emission_intensity: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialSource {
    Standard(StandardMaterialDesc),
    /// Any material class we don't know how to map (shader materials and the like).
    Unsupported { class_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureSource {
    pub id: ResourceId,
    /// `res://` path of the texture file, empty for textures generated at runtime.
    pub resource_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeClass {
    Node3D,
    MeshInstance3D,
    Area3D,
    AudioStreamPlayer3D,
    /// Nodes that are not spatial are not mirrored.
    NonSpatial(String),
}

impl NodeClass {
    pub fn is_spatial(&self) -> bool {
        !matches!(self, NodeClass::NonSpatial(_))
    }

    pub fn class_name(&self) -> &str {
        match self {
            NodeClass::Node3D => "Node3D",
            NodeClass::MeshInstance3D => "MeshInstance3D",
            NodeClass::Area3D => "Area3D",
            NodeClass::AudioStreamPlayer3D => "AudioStreamPlayer3D",
            NodeClass::NonSpatial(name) => name,
        }
    }
}

/// Primitive meshes are generated render side, everything else goes through the geometry conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshShape {
    Box { size: Vec3 },
    Sphere { radius: f32 },
    Capsule { height: f32, radius: f32 },
    Arbitrary(ResourceId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshBinding {
    pub shape: MeshShape,
    pub skeleton: Option<ResourceId>,
    /// The active material per surface, `None` for surfaces without one.
    pub materials: Vec<Option<ResourceId>>,
    pub flip_winding_if_no_indices: bool,
    pub instance_transforms: Option<Vec<Affine3A>>,
}

impl MeshBinding {
    pub fn new(shape: MeshShape) -> Self {
        Self {
            shape,
            skeleton: None,
            materials: vec![],
            flip_winding_if_no_indices: false,
            instance_transforms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShapeInfo {
    Box { size: Vec3 },
    Other { class_name: String },
}

/// Per node flags set from the simulation side (node metadata).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeMetadata {
    /// Overrides the global grounding shadow setting when present.
    pub grounding_shadow: Option<bool>,
    /// Ray pickable nodes get a hover effect unless this is `Some(false)`.
    pub hover_effect: Option<bool>,
    /// Audio resource paths to load before the first play request.
    pub prewarm_audio: Vec<String>,
}

/// Everything the mirror needs to know about a node when materializing it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub parent: NodeId,
    pub name: String,
    pub class: NodeClass,
    pub metadata: NodeMetadata,
    pub signals: Vec<String>,
    pub mesh: Option<MeshBinding>,
    pub ray_pickable: bool,
    /// Shapes of the direct CollisionShape3D children.
    pub collision_shapes: Vec<CollisionShapeInfo>,
    pub global_position: Vec3,
}

impl NodeInfo {
    pub fn new(id: NodeId, parent: NodeId, name: impl Into<String>, class: NodeClass) -> Self {
        Self {
            id,
            parent,
            name: name.into(),
            class,
            metadata: NodeMetadata::default(),
            signals: vec![],
            mesh: None,
            ray_pickable: false,
            collision_shapes: vec![],
            global_position: Vec3::ZERO,
        }
    }

    pub fn has_signal(&self, signal: &str) -> bool {
        self.signals.iter().any(|s| s == signal)
    }
}
