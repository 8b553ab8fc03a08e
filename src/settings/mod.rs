use crate::util::is_valid_volume;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "scenemirror")]
#[command(version = concat!(env!("VERGEN_GIT_BRANCH"), "/",env!("VERGEN_GIT_SHA")))]
#[command(about = "Mirrors a simulation scene graph into a render scene graph")]
pub struct CliArgs {
    /// The simulation project, `res://` paths are resolved against it.
    #[arg(long, env = "SCENEMIRROR_PROJECT_DIR", default_value_t = default_project_dir())]
    pub project_dir: String,

    /// JSON file with [`MirrorSettings`], defaults are used for everything not in there.
    #[arg(long, env = "SCENEMIRROR_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[arg(long, default_value_t = 300)]
    pub frames: u64,

    #[arg(long, default_value_t = 90.0)]
    pub frame_rate: f32,

    #[command(subcommand)]
    pub operation_mode: OperationMode,
}

pub fn default_project_dir() -> String {
    std::env::current_dir()
        .map(|dir| dir.join("project"))
        .unwrap_or_else(|_| PathBuf::from("project"))
        .to_string_lossy()
        .to_string()
}

#[derive(Subcommand, Debug)]
pub enum OperationMode {
    /// Runs one of the built-in scripted scenes through the mirror.
    Demo {
        #[arg(value_enum, default_value_t = DemoScene::Hierarchy)]
        scene: DemoScene,
    },
}

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DemoScene {
    /// Nested nodes announced in random order, primitives and converted meshes.
    Hierarchy,
    /// A skinned mesh with an animated skeleton.
    Skinned,
    /// A scene whose resources change while it is mirrored.
    Changing,
}

/// Tunables of the mirror. Missing fields in the settings file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// How many additional synchronization passes a node waits for its parent before it's reported as orphaned.
    pub parent_retry_passes: u32,
    /// Volume size changes are only applied once no further change came in for this long.
    pub scale_settle_quiescence_ms: u64,
    /// Size of the render volume in meters.
    pub render_volume_size: [f32; 3],
    /// Simulation emission intensity is divided by this. An approximation, the engines' units aren't comparable.
    pub emission_intensity_divisor: f32,
    pub async_mesh_conversion: bool,
    pub conversion_worker_threads: usize,
    /// Every that many passes, mirrored nodes are checked for having been freed. 0 disables the check.
    pub validity_sweep_interval: u64,
    pub audio_cache_capacity: usize,
    pub grounding_shadows: bool,
    pub slow_pass_warn_ms: u64,
    /// The mirror root is moved by the volume camera's global position times this factor.
    pub volume_camera_offset_factor: f32,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            parent_retry_passes: 2,
            scale_settle_quiescence_ms: 250,
            render_volume_size: [1.0, 1.0, 1.0],
            emission_intensity_divisor: 1000.0,
            async_mesh_conversion: false,
            conversion_worker_threads: 2,
            validity_sweep_interval: 60,
            audio_cache_capacity: 64,
            grounding_shadows: true,
            slow_pass_warn_ms: 6,
            volume_camera_offset_factor: -0.1,
        }
    }
}

impl MirrorSettings {
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let json = std::fs::read_to_string(path).with_context(|| format!("Reading settings {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Parsing settings {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        let settings: Self = serde_json::from_str(json)?;
        if !is_valid_volume(settings.render_volume_size()) {
            bail!("render_volume_size has to be positive along every axis, got {:?}", settings.render_volume_size);
        }
        Ok(settings)
    }

    pub fn render_volume_size(&self) -> Vec3 {
        Vec3::from_array(self.render_volume_size)
    }
}
