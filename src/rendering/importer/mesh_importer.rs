use crate::rendering::common::coordinate_systems::{flip_uv, reversed_identity_indices, try_reverse_winding};
use crate::rendering::common::types::{
    JointConversionData, JointInfluence, JointInfluences, MeshContents, MeshPart, VertexBuffers,
};
use crate::simulation::types::{MeshSource, PrimitiveType, SurfaceArrays};
use anyhow::{anyhow, bail};
use glam::{Affine3A, Vec3};
use log::{debug, error, warn};
use std::sync::Arc;

pub struct MeshImporter {}

impl MeshImporter {
    /// Converts all triangle surfaces of `mesh`. Surfaces that can't be converted are skipped (and logged), the
    /// conversion only fails when no surface is left.
    pub fn convert(
        mesh: &MeshSource,
        skeleton: Option<Arc<JointConversionData>>,
        flip_winding_if_no_indices: bool,
        instance_transforms: Option<&[Affine3A]>,
    ) -> Result<MeshContents, anyhow::Error> {
        profiling::scope!("MeshImporter::convert");
        let mut parts = Vec::with_capacity(mesh.surfaces.len());

        for (surface_idx, surface) in mesh.surfaces.iter().enumerate() {
            match Self::convert_surface(surface, surface_idx, skeleton.as_deref(), flip_winding_if_no_indices) {
                Ok(part) => parts.push(part),
                Err(err) => error!("Skipping surface {} of mesh {}: {}", surface_idx, mesh.name, err),
            }
        }

        if parts.is_empty() {
            bail!(
                "Mesh {} ({:?}) has no convertible surface out of {}",
                mesh.name,
                mesh.id,
                mesh.surfaces.len()
            );
        }

        // Only keep the skeleton around when at least one surface is actually skinned to it.
        let skeleton = skeleton.filter(|_| parts.iter().any(|part| part.joint_influences.is_some()));

        Ok(MeshContents {
            name: mesh.name.clone(),
            parts,
            skeleton,
            instances: instance_transforms.map(<[Affine3A]>::to_vec).unwrap_or_default(),
        })
    }

    fn convert_surface(
        surface: &SurfaceArrays,
        surface_idx: usize,
        skeleton: Option<&JointConversionData>,
        flip_winding_if_no_indices: bool,
    ) -> Result<MeshPart, anyhow::Error> {
        if surface.primitive != PrimitiveType::Triangles {
            bail!("Unsupported primitive type {:?}", surface.primitive);
        }

        let positions = surface
            .positions
            .as_ref()
            .filter(|positions| !positions.is_empty())
            .ok_or_else(|| anyhow!("Surface has no vertex positions"))?;
        let vertex_count = positions.len();

        let index_buffer = match surface.indices.as_ref().filter(|indices| !indices.is_empty()) {
            Some(indices) => {
                let indices = indices
                    .iter()
                    .map(|&idx| match u32::try_from(idx) {
                        Ok(idx) if (idx as usize) < vertex_count => Ok(idx),
                        _ => Err(anyhow!("Index {} out of range for {} vertices", idx, vertex_count)),
                    })
                    .collect::<Result<Vec<u32>, _>>()?;
                try_reverse_winding(&indices)?
            }
            None if flip_winding_if_no_indices => reversed_identity_indices(vertex_count)?,
            None => {
                if vertex_count % 3 != 0 {
                    bail!("Unindexed surface with {} vertices", vertex_count);
                }
                (0..vertex_count as u32).collect()
            }
        };

        let normals_buffer = match &surface.normals {
            Some(normals) if normals.len() == vertex_count => normals.clone(),
            Some(normals) => {
                warn!("Dropping {} normals for {} vertices", normals.len(), vertex_count);
                vec![]
            }
            None => vec![],
        };

        let tangents_buffer = match &surface.tangents {
            Some(tangents) if tangents.len() == vertex_count * 4 => tangents
                .chunks_exact(4)
                .map(|t| Vec3::new(t[0], t[1], t[2]))
                .collect(),
            Some(tangents) => {
                warn!("Dropping {} tangent floats for {} vertices", tangents.len(), vertex_count);
                vec![]
            }
            None => vec![],
        };

        let texcoord_buffer_0 = match &surface.uvs {
            Some(uvs) if uvs.len() == vertex_count => uvs.iter().map(|&uv| flip_uv(uv)).collect(),
            Some(uvs) => {
                warn!("Dropping {} uvs for {} vertices", uvs.len(), vertex_count);
                vec![]
            }
            None => vec![],
        };

        let joint_influences = match Self::joint_influences(surface, vertex_count, skeleton) {
            Ok(influences) => influences,
            Err(err) => {
                error!("Dropping skinning of surface {}: {}", surface_idx, err);
                None
            }
        };

        Ok(MeshPart {
            vertex_buffers: VertexBuffers {
                position_buffer: positions.clone(),
                normals_buffer,
                tangents_buffer,
                texcoord_buffer_0,
            },
            index_buffer,
            joint_influences,
            material_index: surface_idx,
        })
    }

    fn joint_influences(
        surface: &SurfaceArrays,
        vertex_count: usize,
        skeleton: Option<&JointConversionData>,
    ) -> Result<Option<JointInfluences>, anyhow::Error> {
        let (bones, weights) = match (&surface.bone_indices, &surface.bone_weights) {
            (Some(bones), Some(weights)) => (bones, weights),
            (None, None) => return Ok(None),
            _ => bail!("Bone indices and weights need to be present together"),
        };

        let Some(skeleton) = skeleton else {
            debug!("Surface has bone data but no skeleton, converting it unskinned");
            return Ok(None);
        };

        if bones.len() != weights.len() {
            bail!("{} bone indices but {} weights", bones.len(), weights.len());
        }

        if bones.len() % vertex_count != 0 {
            bail!("{} influences can't be split across {} vertices", bones.len(), vertex_count);
        }

        let influences_per_vertex = bones.len() / vertex_count;
        if influences_per_vertex != 4 && influences_per_vertex != 8 {
            bail!("{} influences per vertex, only 4 or 8 are supported", influences_per_vertex);
        }

        let joint_count = skeleton.joint_count();
        let mut influences = Vec::with_capacity(bones.len());
        for idx in 0..bones.len() {
            let joint = bones.joint_index(idx);
            let weight = weights.weight(idx);
            // unused slots commonly carry joint 0 and weight 0
            if joint < 0 || (joint as usize >= joint_count && weight != 0.0) {
                bail!("Joint index {} out of range for {} joints", joint, joint_count);
            }

            influences.push(JointInfluence {
                joint_index: (joint as usize).min(joint_count.saturating_sub(1)) as u32,
                weight,
            });
        }

        Ok(Some(JointInfluences {
            influences,
            influences_per_vertex,
        }))
    }
}
