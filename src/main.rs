use anyhow::bail;
use clap::Parser;
use log::info;
use scenemirror::demos::DemoDriver;
use scenemirror::mirror::application::{InstanceGuard, MirrorApplication};
use scenemirror::rendering::render_backend::scene_backend::HecsRenderScene;
use scenemirror::settings::{CliArgs, DemoScene, MirrorSettings, OperationMode};
use scenemirror::simulation::scripted::ScriptedSimulation;
use std::path::PathBuf;
use std::time::Instant;

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let _guard = InstanceGuard::acquire()?;

    let project_dir = PathBuf::from(&args.project_dir);
    if !project_dir.is_dir() {
        bail!("The project directory {} does not exist", project_dir.display());
    }

    let settings = match &args.settings {
        Some(path) => MirrorSettings::load(path)?,
        None => MirrorSettings::default(),
    };

    if args.frame_rate <= 0.0 {
        bail!("The frame rate has to be positive, got {}", args.frame_rate);
    }

    match args.operation_mode {
        OperationMode::Demo { scene } => run_demo(scene, project_dir, &settings, args.frames, args.frame_rate),
    }
}

fn run_demo(
    scene: DemoScene,
    project_dir: PathBuf,
    settings: &MirrorSettings,
    frames: u64,
    frame_rate: f32,
) -> Result<(), anyhow::Error> {
    let mut simulation = ScriptedSimulation::new(project_dir);
    let mut driver = DemoDriver::new(scene);
    driver.populate(&mut simulation);
    simulation.quit_after(frames);

    let mut app = MirrorApplication::new(simulation, HecsRenderScene::new(), settings)?;
    let delta = 1.0 / frame_rate;
    let start = Instant::now();

    loop {
        let frame = app.frame() + 1;
        driver.before_frame(app.host_mut(), frame, frame as f32 * delta);
        if app.tick(delta)?.quit {
            break;
        }
    }

    let rebuilt = app.finish_conversions();
    info!(
        "Mirrored {} frames in {:?}, {} entities rebuilt after the last frame",
        app.frame(),
        start.elapsed(),
        rebuilt
    );
    info!("Render scene:\n{}", app.backend().describe_tree(app.root()));
    info!("Resource cache: {:?}", app.cache().statistics());

    app.teardown();
    Ok(())
}
