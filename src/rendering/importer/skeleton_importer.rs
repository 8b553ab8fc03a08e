use crate::rendering::common::types::JointConversionData;
use crate::simulation::types::SkeletonSource;
use anyhow::{anyhow, bail};
use glam::{Affine3A, Mat4};

pub struct SkeletonImporter {}

impl SkeletonImporter {
    /// Computes the bind pose data of a skeleton. The joint order is the bone order of the source skeleton.
    pub fn convert(skeleton: &SkeletonSource) -> Result<JointConversionData, anyhow::Error> {
        let bone_count = skeleton.bones.len();
        for (idx, bone) in skeleton.bones.iter().enumerate() {
            if bone.parent != -1 && (bone.parent < 0 || bone.parent as usize >= bone_count || bone.parent as usize == idx) {
                bail!(
                    "Bone {} ({}) of skeleton {:?} has an invalid parent {}",
                    idx,
                    bone.name,
                    skeleton.id,
                    bone.parent
                );
            }
        }

        let mut joint_names = Vec::with_capacity(bone_count);
        let mut inverse_bind_poses = Vec::with_capacity(bone_count);
        for idx in 0..bone_count {
            let chain = Self::ancestor_chain(skeleton, idx)?;

            // inverse(root * .. * parent * self) = inverse(self) * inverse(parent) * .. * inverse(root)
            let inverse_bind = chain.iter().fold(Affine3A::IDENTITY, |acc, &joint| {
                acc * skeleton.bones[joint].rest.inverse()
            });
            inverse_bind_poses.push(Mat4::from(inverse_bind));

            let path = chain
                .iter()
                .rev()
                .map(|&joint| skeleton.bones[joint].name.as_str())
                .collect::<Vec<_>>()
                .join("/");
            joint_names.push(path);
        }

        Ok(JointConversionData {
            skeleton_id: skeleton.id,
            joint_names,
            inverse_bind_poses,
            rest_poses: skeleton.bones.iter().map(|bone| bone.rest).collect(),
            parent_indices: skeleton.bones.iter().map(|bone| bone.parent).collect(),
        })
    }

    /// The joint itself followed by its ancestors up to the root.
    fn ancestor_chain(skeleton: &SkeletonSource, joint: usize) -> Result<Vec<usize>, anyhow::Error> {
        let mut chain = vec![joint];
        let mut current = skeleton.bones[joint].parent;
        while current != -1 {
            if chain.len() > skeleton.bones.len() {
                return Err(anyhow!(
                    "Bone {} of skeleton {:?} is part of a parent cycle",
                    skeleton.bones[joint].name,
                    skeleton.id
                ));
            }
            chain.push(current as usize);
            current = skeleton.bones[current as usize].parent;
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{BoneSource, ResourceId};
    use glam::{Quat, Vec3};

    fn bone(name: &str, parent: i32, rest: Affine3A) -> BoneSource {
        BoneSource {
            name: name.to_string(),
            parent,
            rest,
        }
    }

    fn arm() -> SkeletonSource {
        SkeletonSource {
            id: ResourceId(7),
            bones: vec![
                bone("Root", -1, Affine3A::from_translation(Vec3::new(0.0, 1.0, 0.0))),
                bone(
                    "Upper",
                    0,
                    Affine3A::from_rotation_translation(Quat::from_rotation_z(0.5), Vec3::new(0.0, 0.5, 0.0)),
                ),
                bone("Lower", 1, Affine3A::from_translation(Vec3::new(0.0, 0.75, 0.0))),
            ],
        }
    }

    #[test]
    fn arrays_have_equal_length() -> Result<(), anyhow::Error> {
        let data = SkeletonImporter::convert(&arm())?;
        assert_eq!(data.joint_count(), 3);
        assert_eq!(data.inverse_bind_poses.len(), 3);
        assert_eq!(data.rest_poses.len(), 3);
        assert_eq!(data.parent_indices, vec![-1, 0, 1]);
        assert_eq!(data.joint_names, vec!["Root", "Root/Upper", "Root/Upper/Lower"]);
        Ok(())
    }

    #[test]
    fn inverse_bind_pose_undoes_global_rest_pose() -> Result<(), anyhow::Error> {
        let skeleton = arm();
        let data = SkeletonImporter::convert(&skeleton)?;

        let global_lower = skeleton.bones[0].rest * skeleton.bones[1].rest * skeleton.bones[2].rest;
        let product = data.inverse_bind_poses[2] * Mat4::from(global_lower);
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        Ok(())
    }

    #[test]
    fn parent_cycle_is_rejected() {
        let mut skeleton = arm();
        skeleton.bones[0].parent = 2;
        assert!(SkeletonImporter::convert(&skeleton).is_err());
    }

    #[test]
    fn out_of_range_parent_is_rejected() {
        let mut skeleton = arm();
        skeleton.bones[2].parent = 9;
        assert!(SkeletonImporter::convert(&skeleton).is_err());
    }
}
