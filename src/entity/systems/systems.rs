use crate::audio::audio_playback_manager::{AudioPlaybackManager, AudioRequest};
use crate::entity::entity_tracker::EntityTracker;
use crate::entity::systems::lifecycle_system::LifecycleSystem;
use crate::entity::systems::skeleton_pose_system::SkeletonPoseSystem;
use crate::entity::systems::transform_sync_system::TransformSyncSystem;
use crate::entity::systems::volume_camera_system::VolumeCameraSystem;
use crate::rendering::render_backend::{RenderBackend, RenderEntity};
use crate::rendering::resource_cache::ResourceCache;
use crate::settings::MirrorSettings;
use crate::simulation::types::{NodeId, ResourceId};
use crate::simulation::{SimulationHost, VOLUME_CAMERA_NODE_NAME};
use log::{debug, error, warn};
use std::collections::HashSet;
use std::time::Instant;

/// Everything a synchronization pass works on. All of it is owned by the mirror application.
pub struct SceneContext<'a, S: SimulationHost + ?Sized, B: RenderBackend + ?Sized> {
    pub host: &'a mut S,
    pub backend: &'a mut B,
    pub cache: &'a mut ResourceCache,
    pub tracker: &'a mut EntityTracker,
    /// The entity all mirrored entities hang below.
    pub root: RenderEntity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayedAudio {
    pub node: NodeId,
    pub resource_path: String,
    pub volume_db: f32,
}

/// The notifications gathered since the last pass, besides node additions and removals which go to the tracker.
#[derive(Debug, Default)]
pub struct FrameEvents {
    pub changed_resources: HashSet<ResourceId>,
    pub audio: Vec<PlayedAudio>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PassStatistics {
    pub materialized: usize,
    pub removed: usize,
    pub rebuilt: usize,
    pub transforms_applied: usize,
}

pub struct Systems {
    pub lifecycle: LifecycleSystem,
    pub transform_sync: TransformSyncSystem,
    pub skeleton_pose: SkeletonPoseSystem,
    pub volume_camera: VolumeCameraSystem,
    pub audio: AudioPlaybackManager,
    slow_pass_warn_ms: u128,
}

impl Systems {
    pub fn new(settings: &MirrorSettings) -> Self {
        Self {
            lifecycle: LifecycleSystem::new(settings),
            transform_sync: TransformSyncSystem::new(),
            skeleton_pose: SkeletonPoseSystem::new(),
            volume_camera: VolumeCameraSystem::new(settings),
            audio: AudioPlaybackManager::new(settings.audio_cache_capacity),
            slow_pass_warn_ms: settings.slow_pass_warn_ms as u128,
        }
    }

    /// One synchronization pass. Additions are handled before removals, both before the transforms are applied.
    pub fn update<S: SimulationHost + ?Sized, B: RenderBackend + ?Sized>(
        &mut self,
        ctx: &mut SceneContext<'_, S, B>,
        events: FrameEvents,
        now: Instant,
    ) -> PassStatistics {
        profiling::scope!("Systems::update");
        let pre_systems = Instant::now();
        let mut statistics = PassStatistics::default();

        let report = self.lifecycle.update(ctx);
        statistics.materialized = report.materialized.len();
        statistics.removed = report.removed.len();

        for materialized in &report.materialized {
            if materialized.info.name == VOLUME_CAMERA_NODE_NAME {
                self.volume_camera.on_volume_camera(&materialized.info);
            }
            self.audio
                .on_emitter(ctx.backend, ctx.host.project_dir(), &materialized.info);
            self.skeleton_pose
                .set_skeleton(materialized.entity, materialized.skeleton);
        }

        for &(node, entity) in &report.removed {
            self.skeleton_pose.unregister(entity);
            self.volume_camera.on_node_removed(node);
        }

        let invalidation = ctx.cache.on_resources_changed(&events.changed_resources);
        if !invalidation.entities.is_empty() {
            debug!("{} entities depend on changed resources", invalidation.entities.len());
        }
        let mut rebuilt = self.lifecycle.rebuild_models(ctx, invalidation.entities);
        invalidation.retired.release(ctx.backend);

        let converted = ctx.cache.poll_completions(ctx.backend);
        rebuilt.extend(self.lifecycle.rebuild_models(ctx, converted));

        statistics.rebuilt = rebuilt.len();
        for (entity, skeleton) in rebuilt {
            self.skeleton_pose.set_skeleton(entity, skeleton);
        }

        match self
            .transform_sync
            .update(ctx.host.transform_snapshot(), ctx.tracker, ctx.backend)
        {
            Ok(applied) => statistics.transforms_applied = applied,
            Err(err) => error!("Discarding this frame's transforms: {}", err),
        }
        if !self.transform_sync.reparent_requests().is_empty() {
            self.lifecycle
                .apply_reparents(ctx, self.transform_sync.reparent_requests());
        }

        self.volume_camera.update(ctx.host, ctx.backend, ctx.root, now);
        self.skeleton_pose.update(ctx.host, ctx.backend);

        for played in events.audio {
            let Some(entity) = ctx.tracker.entity_for_node(played.node) else {
                warn!(
                    "Can't play {} on {:?}, the node isn't mirrored",
                    played.resource_path, played.node
                );
                continue;
            };

            self.audio.play(
                ctx.backend,
                ctx.host.project_dir(),
                &AudioRequest {
                    entity,
                    resource_path: played.resource_path,
                    volume_db: played.volume_db,
                },
            );
        }

        let duration_systems = (Instant::now() - pre_systems).as_millis();
        if duration_systems > self.slow_pass_warn_ms {
            debug!("Systems update took too long: {:?} ms", duration_systems);
        }

        statistics
    }

    /// Forgets all per scene state, used when the scene is reloaded.
    pub fn reset(&mut self) {
        self.skeleton_pose.clear();
        self.volume_camera.reset();
        self.audio.clear();
    }
}
