use crate::simulation::types::ResourceId;
use glam::{Affine3A, Mat4, Vec2, Vec3, Vec4};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[derive(Clone, Default, PartialEq)]
pub struct VertexBuffers {
    pub position_buffer: Vec<Vec3>,
    pub normals_buffer: Vec<Vec3>,
    pub tangents_buffer: Vec<Vec3>,
    pub texcoord_buffer_0: Vec<Vec2>,
}

impl Debug for VertexBuffers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ position_buffer: [{}], ", self.position_buffer.len())?;
        write!(f, "normals_buffer: [{}], ", self.normals_buffer.len())?;
        write!(f, "tangents_buffer: [{}], ", self.tangents_buffer.len())?;
        write!(f, "texcoord_buffer_0: [{}] }}", self.texcoord_buffer_0.len())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct JointInfluence {
    pub joint_index: u32,
    pub weight: f32,
}

#[derive(Clone, PartialEq)]
pub struct JointInfluences {
    /// `influences_per_vertex` consecutive entries per vertex
    pub influences: Vec<JointInfluence>,
    pub influences_per_vertex: usize,
}

impl Debug for JointInfluences {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ influences: [{}], influences_per_vertex: {} }}",
            self.influences.len(),
            self.influences_per_vertex
        )
    }
}

/// One converted surface.
#[derive(Clone, PartialEq)]
pub struct MeshPart {
    pub vertex_buffers: VertexBuffers,
    pub index_buffer: Vec<u32>,
    pub joint_influences: Option<JointInfluences>,
    /// Index of the source surface, which is also the material slot of this part.
    pub material_index: usize,
}

impl Debug for MeshPart {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ vertex_buffers: {:?}, ", self.vertex_buffers)?;
        write!(f, "index_buffer: [{}], ", self.index_buffer.len())?;
        write!(f, "joint_influences: {:?}, ", self.joint_influences)?;
        write!(f, "material_index: {} }}", self.material_index)
    }
}

/// Bind pose data of one skeleton, shared between all meshes that are skinned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct JointConversionData {
    pub skeleton_id: ResourceId,
    /// Slash separated paths from the root joint, e.g. `Hips/Spine/Chest`.
    pub joint_names: Vec<String>,
    pub inverse_bind_poses: Vec<Mat4>,
    pub rest_poses: Vec<Affine3A>,
    pub parent_indices: Vec<i32>,
}

impl JointConversionData {
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }
}

/// The render-native mesh: everything needed to build a model out of one source mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshContents {
    pub name: String,
    pub parts: Vec<MeshPart>,
    pub skeleton: Option<Arc<JointConversionData>>,
    /// Placements of the same model. Empty when the mesh is not instanced.
    pub instances: Vec<Affine3A>,
}

impl MeshContents {
    pub fn is_skinned(&self) -> bool {
        self.skeleton.is_some() && self.parts.iter().any(|part| part.joint_influences.is_some())
    }

    pub fn vertex_count(&self) -> usize {
        self.parts
            .iter()
            .map(|part| part.vertex_buffers.position_buffer.len())
            .sum()
    }

    /// Local bounds of all parts, covering every instance placement.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let local = self
            .parts
            .iter()
            .filter_map(|part| BoundingBox::from_points(&part.vertex_buffers.position_buffer))
            .reduce(|a, b| a.union(&b))?;

        if self.instances.is_empty() {
            return Some(local);
        }

        self.instances
            .iter()
            .map(|transform| local.transformed(transform))
            .reduce(|a, b| a.union(&b))
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        Some(points.iter().fold(
            BoundingBox {
                min: first,
                max: first,
            },
            |bb, &p| BoundingBox {
                min: bb.min.min(p),
                max: bb.max.max(p),
            },
        ))
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn transformed(&self, transform: &Affine3A) -> BoundingBox {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
        .map(|corner| transform.transform_point3(corner));

        // corners is never empty
        BoundingBox::from_points(&corners).unwrap_or(*self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlbedoType {
    Value(Vec4),
    Texture { texture: ResourceId, tint: Vec4 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransparencyType {
    Opaque,
    Blend { opacity: f32 },
    Cutout { cutout: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub color: Vec3,
    pub texture: Option<ResourceId>,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PbrMaterial {
    pub albedo: AlbedoType,
    pub transparency: TransparencyType,
    pub metallic: f32,
    pub roughness: f32,
    pub uv_offset: Vec2,
    pub uv_scale: Vec2,
    pub emission: Option<Emission>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderMaterial {
    Pbr(PbrMaterial),
    Simple { color: Vec4, metallic: bool },
}

impl RenderMaterial {
    /// Used for models whose source doesn't specify a material.
    pub fn white_non_metallic() -> Self {
        RenderMaterial::Simple {
            color: Vec4::ONE,
            metallic: false,
        }
    }

    /// Stands in for materials that failed to convert.
    pub fn placeholder() -> Self {
        RenderMaterial::Simple {
            color: Vec4::new(1.0, 0.0, 0.5, 1.0), // screaming pink
            metallic: false,
        }
    }

    /// The textures this material needs to have loaded, albedo first.
    pub fn texture_dependencies(&self) -> (Option<ResourceId>, Option<ResourceId>) {
        match self {
            RenderMaterial::Pbr(pbr) => {
                let albedo = match &pbr.albedo {
                    AlbedoType::Texture { texture, .. } => Some(*texture),
                    AlbedoType::Value(_) => None,
                };
                let emission = pbr.emission.as_ref().and_then(|emission| emission.texture);
                (albedo, emission)
            }
            RenderMaterial::Simple { .. } => (None, None),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Texture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl Debug for Texture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ label: {}, size: {}x{}, rgba8: [{}] }}",
            self.label,
            self.width,
            self.height,
            self.rgba8.len()
        )
    }
}

impl Texture {
    /// A magenta/black checker board, used where a texture file can't be loaded.
    pub fn unknown_texture() -> Self {
        let size = 8u32;
        let mut rgba8 = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let pixel = if (x + y) % 2 == 0 {
                    [255, 0, 255, 255]
                } else {
                    [0, 0, 0, 255]
                };
                rgba8.extend_from_slice(&pixel);
            }
        }

        Texture {
            label: "error-unknown-texture".to_string(),
            width: size,
            height: size,
            rgba8,
        }
    }
}
