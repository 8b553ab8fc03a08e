use crate::rendering::render_backend::{EntityTransform, RenderBackend, RenderEntity};
use crate::simulation::SimulationHost;
use crate::simulation::types::ResourceId;
use glam::{Quat, Vec3};
use log::{error, trace, warn};
use scenemirror_buffers::pose::reader::PoseBuffer;
use std::collections::{BTreeMap, HashMap};

/// Copies the simulation's skeleton poses onto the joints of skinned entities, with one batched query per frame.
#[derive(Default)]
pub struct SkeletonPoseSystem {
    entities_by_skeleton: BTreeMap<ResourceId, Vec<RenderEntity>>,
    skeleton_by_entity: HashMap<RenderEntity, ResourceId>,
    skeleton_ids: Vec<ResourceId>,
    pose_buffer: Vec<u8>,
    joints: Vec<EntityTransform>,
}

impl SkeletonPoseSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` as driven by `skeleton`, or unregisters it for `None`.
    pub fn set_skeleton(&mut self, entity: RenderEntity, skeleton: Option<ResourceId>) {
        if self.skeleton_by_entity.get(&entity).copied() == skeleton {
            return;
        }

        self.unregister(entity);
        if let Some(skeleton) = skeleton {
            trace!("{:?} is skinned by {:?}", entity, skeleton);
            self.skeleton_by_entity.insert(entity, skeleton);
            self.entities_by_skeleton.entry(skeleton).or_default().push(entity);
        }
    }

    pub fn unregister(&mut self, entity: RenderEntity) {
        let Some(skeleton) = self.skeleton_by_entity.remove(&entity) else {
            return;
        };

        if let Some(entities) = self.entities_by_skeleton.get_mut(&skeleton) {
            entities.retain(|&e| e != entity);
            if entities.is_empty() {
                self.entities_by_skeleton.remove(&skeleton);
            }
        }
    }

    pub fn skinned_entity_count(&self) -> usize {
        self.skeleton_by_entity.len()
    }

    pub fn clear(&mut self) {
        self.entities_by_skeleton.clear();
        self.skeleton_by_entity.clear();
    }

    pub fn update<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(&mut self, host: &S, backend: &mut B) {
        profiling::scope!("SkeletonPoseSystem::update");
        if self.entities_by_skeleton.is_empty() {
            return;
        }

        self.skeleton_ids.clear();
        self.skeleton_ids.extend(self.entities_by_skeleton.keys().copied());
        host.query_poses(&self.skeleton_ids, &mut self.pose_buffer);

        let poses = match PoseBuffer::parse(&self.pose_buffer) {
            Ok(poses) => poses,
            Err(err) => {
                error!("Discarding this frame's skeleton poses: {}", err);
                return;
            }
        };

        for block in poses.blocks() {
            let Some(entities) = self.entities_by_skeleton.get(&ResourceId(block.skeleton_id)) else {
                continue;
            };

            self.joints.clear();
            self.joints.extend(block.joints().map(|joint| EntityTransform {
                translation: Vec3::new(joint.pos[0], joint.pos[1], joint.pos[2]),
                rotation: Quat::from_array(joint.rot),
                scale: Vec3::new(joint.scale[0], joint.scale[1], joint.scale[2]),
            }));

            for &entity in entities {
                match backend.joint_count(entity) {
                    Some(count) if count == self.joints.len() => backend.set_joint_transforms(entity, &self.joints),
                    Some(count) => {
                        warn!(
                            "{:?} has {} joints, but skeleton {} posed {}",
                            entity,
                            count,
                            block.skeleton_id,
                            self.joints.len()
                        );
                        let count = count.min(self.joints.len());
                        backend.set_joint_transforms(entity, &self.joints[..count]);
                    }
                    None => trace!("{:?} lost its skinned model", entity),
                }
            }
        }
    }
}
