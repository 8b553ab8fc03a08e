use crate::entity::entity_tracker::EntityTracker;
use crate::rendering::render_backend::{EntityTransform, RenderBackend};
use crate::simulation::types::NodeId;
use glam::{Quat, Vec3};
use scenemirror_buffers::BufferError;
use scenemirror_buffers::transform::reader::TransformSnapshot;

/// Applies the simulation's per frame transform snapshot to the mirrored entities.
///
/// This runs for every spatial node on every frame: one map probe per record, no logging and no allocation
/// once the reparent queue has grown to its working size.
#[derive(Default)]
pub struct TransformSyncSystem {
    /// (node, new simulation parent) for nodes whose parent differs from the one we know about.
    reparent_requests: Vec<(NodeId, NodeId)>,
}

impl TransformSyncSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records that were applied to an entity.
    pub fn update<B: RenderBackend + ?Sized>(
        &mut self,
        snapshot: &[u8],
        tracker: &EntityTracker,
        backend: &mut B,
    ) -> Result<usize, BufferError> {
        profiling::scope!("TransformSyncSystem::update");
        self.reparent_requests.clear();

        let snapshot = TransformSnapshot::parse(snapshot)?;
        let mut applied = 0;

        for record in snapshot.records() {
            if record.object_id == 0 {
                continue;
            }

            // not materialized yet, or not mirrored at all
            let Some(mirrored) = tracker.get(NodeId(record.object_id)) else {
                continue;
            };

            backend.set_transform(
                mirrored.entity,
                &EntityTransform {
                    translation: Vec3::from_array(record.position()),
                    rotation: Quat::from_array(record.rot),
                    scale: Vec3::from_array(record.scale()),
                },
            );
            backend.set_enabled(mirrored.entity, record.is_visible());

            if record.parent_id != mirrored.sim_parent.0 {
                self.reparent_requests.push((NodeId(record.object_id), NodeId(record.parent_id)));
            }
            applied += 1;
        }

        Ok(applied)
    }

    pub fn reparent_requests(&self) -> &[(NodeId, NodeId)] {
        &self.reparent_requests
    }
}
