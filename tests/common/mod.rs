#![allow(dead_code)]

use scenemirror::mirror::application::MirrorApplication;
use scenemirror::rendering::render_backend::scene_backend::HecsRenderScene;
use scenemirror::settings::MirrorSettings;
use scenemirror::simulation::scripted::ScriptedSimulation;
use scenemirror::simulation::types::{MeshBinding, MeshShape, NodeClass, NodeId, NodeInfo};
use std::path::PathBuf;

pub type TestMirror = MirrorApplication<ScriptedSimulation, HecsRenderScene>;

pub const DELTA: f32 = 1.0 / 90.0;

pub fn mirror(settings: &MirrorSettings) -> Result<TestMirror, anyhow::Error> {
    mirror_in(std::env::temp_dir(), settings)
}

pub fn mirror_in(project_dir: PathBuf, settings: &MirrorSettings) -> Result<TestMirror, anyhow::Error> {
    let simulation = ScriptedSimulation::new(project_dir);
    MirrorApplication::new(simulation, HecsRenderScene::new(), settings)
}

/// A scratch project directory containing `res://sounds/chime.wav`.
pub fn project_with_sound(test: &str) -> Result<PathBuf, anyhow::Error> {
    let dir = std::env::temp_dir().join(format!("scenemirror-{}-{}", test, std::process::id()));
    std::fs::create_dir_all(dir.join("sounds"))?;
    std::fs::write(dir.join("sounds/chime.wav"), b"RIFF\0\0\0\0WAVEfmt ")?;
    Ok(dir)
}

pub fn default_mirror() -> Result<TestMirror, anyhow::Error> {
    mirror(&MirrorSettings::default())
}

pub fn ticks(app: &mut TestMirror, count: usize) -> Result<(), anyhow::Error> {
    for _ in 0..count {
        app.tick(DELTA)?;
    }
    Ok(())
}

pub fn spatial(id: i64, parent: i64, name: &str) -> NodeInfo {
    NodeInfo::new(NodeId(id), NodeId(parent), name, NodeClass::Node3D)
}

pub fn with_mesh(id: i64, parent: i64, name: &str, binding: MeshBinding) -> NodeInfo {
    let mut info = NodeInfo::new(NodeId(id), NodeId(parent), name, NodeClass::MeshInstance3D);
    info.mesh = Some(binding);
    info
}

pub fn box_node(id: i64, parent: i64, name: &str) -> NodeInfo {
    with_mesh(
        id,
        parent,
        name,
        MeshBinding::new(MeshShape::Box {
            size: glam::Vec3::ONE,
        }),
    )
}
