use crate::rendering::render_backend::{AudioHandle, RenderBackend, RenderEntity};
use crate::simulation::types::{NodeClass, NodeInfo};
use crate::simulation::{SIGNAL_ON_PLAY, resolve_resource_path};
use log::{error, trace, warn};
use quick_cache::unsync::Cache;
use std::path::Path;

/// A play request raised by an audio emitter in the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    pub entity: RenderEntity,
    pub resource_path: String,
    pub volume_db: f32,
}

/// Plays simulation audio on the mirrored entities. Audio resources are loaded once per path and kept in a
/// bounded cache.
pub struct AudioPlaybackManager {
    resources: Cache<String, AudioHandle>,
    plays: usize,
}

impl AudioPlaybackManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            resources: Cache::new(capacity.max(1)),
            plays: 0,
        }
    }

    /// Audio emitters are checked for their play signal and may ask for resources to be loaded upfront.
    pub fn on_emitter<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, project_dir: &Path, info: &NodeInfo) {
        if info.class != NodeClass::AudioStreamPlayer3D {
            return;
        }

        if !info.has_signal(SIGNAL_ON_PLAY) {
            warn!(
                "Audio emitter {} has no {} signal, its audio won't be played",
                info.name, SIGNAL_ON_PLAY
            );
        }

        for path in &info.metadata.prewarm_audio {
            trace!("Prewarming {} for {}", path, info.name);
            self.resource(backend, project_dir, path);
        }
    }

    pub fn resource<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        project_dir: &Path,
        resource_path: &str,
    ) -> Option<AudioHandle> {
        if let Some(&handle) = self.resources.get(resource_path) {
            return Some(handle);
        }

        let path = resolve_resource_path(project_dir, resource_path);
        match backend.load_audio(&path) {
            Ok(handle) => {
                self.resources.insert(resource_path.to_string(), handle);
                Some(handle)
            }
            Err(err) => {
                error!("Can't load audio {}: {:#}", resource_path, err);
                None
            }
        }
    }

    pub fn play<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, project_dir: &Path, request: &AudioRequest) {
        let Some(handle) = self.resource(backend, project_dir, &request.resource_path) else {
            return;
        };

        backend.play_audio(request.entity, handle, request.volume_db);
        self.plays += 1;
    }

    pub fn cached_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn plays(&self) -> usize {
        self.plays
    }

    pub fn clear(&mut self) {
        self.resources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::render_backend::scene_backend::HecsRenderScene;
    use crate::simulation::types::NodeId;

    fn project_with_clip(name: &str) -> Result<std::path::PathBuf, anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("scenemirror-audio-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(dir.join("sounds"))?;
        std::fs::write(dir.join("sounds/click.wav"), b"RIFF0000WAVE")?;
        Ok(dir)
    }

    #[test]
    fn resources_are_loaded_once() -> Result<(), anyhow::Error> {
        let dir = project_with_clip("once")?;
        let mut scene = HecsRenderScene::new();
        let entity = scene.create_entity("emitter");
        let mut manager = AudioPlaybackManager::new(8);

        let request = AudioRequest {
            entity,
            resource_path: "res://sounds/click.wav".into(),
            volume_db: -3.0,
        };
        manager.play(&mut scene, &dir, &request);
        manager.play(&mut scene, &dir, &request);

        assert_eq!(scene.audio_clip_count(), 1);
        assert_eq!(scene.audio_playbacks().len(), 2);
        assert_eq!(scene.audio_playbacks()[0].gain_db, -3.0);
        assert_eq!(manager.plays(), 2);
        Ok(())
    }

    #[test]
    fn missing_resources_are_not_played() {
        let mut scene = HecsRenderScene::new();
        let entity = scene.create_entity("emitter");
        let mut manager = AudioPlaybackManager::new(8);

        manager.play(
            &mut scene,
            Path::new("/nonexistent"),
            &AudioRequest {
                entity,
                resource_path: "res://missing.wav".into(),
                volume_db: 0.0,
            },
        );
        assert!(scene.audio_playbacks().is_empty());
        assert_eq!(manager.cached_resources(), 0);
    }

    #[test]
    fn emitters_prewarm_their_resources() -> Result<(), anyhow::Error> {
        let dir = project_with_clip("prewarm")?;
        let mut scene = HecsRenderScene::new();
        let mut manager = AudioPlaybackManager::new(8);

        let mut info = NodeInfo::new(NodeId(3), NodeId::NONE, "Speaker", NodeClass::AudioStreamPlayer3D);
        info.signals.push(SIGNAL_ON_PLAY.to_string());
        info.metadata.prewarm_audio.push("res://sounds/click.wav".into());
        manager.on_emitter(&mut scene, &dir, &info);

        assert_eq!(manager.cached_resources(), 1);
        assert_eq!(scene.audio_clip_count(), 1);
        Ok(())
    }
}
