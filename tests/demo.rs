mod common;

use common::{DELTA, project_with_sound};
use scenemirror::demos::{BALL, CREATURE, CUP, DemoDriver, SPEAKER, TABLE, TABLE_TOP};
use scenemirror::mirror::application::MirrorApplication;
use scenemirror::rendering::render_backend::RenderBackend;
use scenemirror::rendering::render_backend::scene_backend::HecsRenderScene;
use scenemirror::settings::{DemoScene, MirrorSettings};
use scenemirror::simulation::scripted::ScriptedSimulation;

fn run(scene: DemoScene, frames: u64) -> Result<MirrorApplication<ScriptedSimulation, HecsRenderScene>, anyhow::Error> {
    let mut simulation = ScriptedSimulation::new(project_with_sound(&format!("demo-{:?}", scene))?);
    let mut driver = DemoDriver::new(scene);
    driver.populate(&mut simulation);
    simulation.quit_after(frames);

    let mut app = MirrorApplication::new(simulation, HecsRenderScene::new(), &MirrorSettings::default())?;
    loop {
        let frame = app.frame() + 1;
        driver.before_frame(app.host_mut(), frame, frame as f32 * DELTA);
        if app.tick(DELTA)?.quit {
            break;
        }
    }
    app.finish_conversions();
    Ok(app)
}

#[test]
fn hierarchy_demo_links_the_whole_tree() -> Result<(), anyhow::Error> {
    let app = run(DemoScene::Hierarchy, 50)?;
    assert_eq!(app.frame(), 50);

    let table = app.entity_for_node(TABLE).expect("table");
    let top = app.entity_for_node(TABLE_TOP).expect("top");
    let cup = app.entity_for_node(CUP).expect("cup");
    assert_eq!(app.backend().parent(top), Some(table));
    assert_eq!(app.backend().parent(cup), Some(top));
    assert!(app.entity_for_node(BALL).is_some());
    assert_eq!(app.tracker().orphans_reported(), 0);

    // played once, at frame 45
    let speaker = app.entity_for_node(SPEAKER).expect("speaker");
    assert_eq!(app.backend().audio_playbacks().len(), 1);
    assert_eq!(app.backend().audio_playbacks()[0].entity, speaker);
    Ok(())
}

#[test]
fn changing_demo_survives_resource_changes_and_removals() -> Result<(), anyhow::Error> {
    let app = run(DemoScene::Changing, 200)?;

    assert!(app.entity_for_node(TABLE).is_none());
    assert!(app.entity_for_node(TABLE_TOP).is_none());
    let creature = app.entity_for_node(CREATURE).expect("creature");
    assert_eq!(app.backend().joint_transforms(creature).map(|joints| joints.len()), Some(2));

    let statistics = app.cache().statistics();
    assert!(statistics.material_conversions >= 2);
    assert!(statistics.mesh_conversions >= 2);
    Ok(())
}
