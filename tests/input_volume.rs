mod common;

use common::{DELTA, box_node, default_mirror, ticks, with_mesh};
use glam::Vec3;
use scenemirror::demos::{VOLUME_CAMERA, volume_camera};
use scenemirror::rendering::render_backend::{ComponentKind, RenderBackend};
use scenemirror::simulation::types::{CollisionShapeInfo, MeshBinding, MeshShape, NodeId, NodeInfo};
use scenemirror::simulation::{NodeSignal, SIGNAL_DRAG, SIGNAL_DRAG_ENDED, SIGNAL_INPUT_EVENT};
use std::time::{Duration, Instant};

fn pickable_ball(id: i64, signals: &[&str]) -> NodeInfo {
    let mut ball = with_mesh(id, 0, "Ball", MeshBinding::new(MeshShape::Sphere { radius: 0.25 }));
    ball.ray_pickable = true;
    ball.signals = signals.iter().map(|signal| signal.to_string()).collect();
    ball
}

#[test]
fn volume_camera_scales_and_places_the_root() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut()
        .add_node_at(volume_camera(Vec3::splat(10.0)), Vec3::new(0.0, 1.0, 0.0));
    ticks(&mut app, 2)?;

    assert_eq!(app.systems().volume_camera.camera(), Some(VOLUME_CAMERA));
    assert_eq!(app.systems().volume_camera.box_size(), Vec3::splat(10.0));
    let root = app.backend().transform(app.root()).expect("root");
    assert!(root.scale.abs_diff_eq(Vec3::splat(0.1), 1e-6));
    assert!(root.translation.abs_diff_eq(Vec3::new(0.0, -0.1, 0.0), 1e-6));

    // the camera moving in the simulation moves the root every frame
    app.host_mut()
        .set_transform(VOLUME_CAMERA, Vec3::new(2.0, 0.0, 0.0), glam::Quat::IDENTITY, Vec3::ONE);
    ticks(&mut app, 1)?;
    let root = app.backend().transform(app.root()).expect("root");
    assert!(root.translation.abs_diff_eq(Vec3::new(-0.2, 0.0, 0.0), 1e-6));
    Ok(())
}

#[test]
fn invalid_volume_camera_keeps_the_scale_but_drives_the_root() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    let mut camera = volume_camera(Vec3::splat(10.0));
    camera.collision_shapes.push(CollisionShapeInfo::Box { size: Vec3::ONE });
    app.host_mut().add_node_at(camera, Vec3::new(0.0, 0.0, 5.0));
    ticks(&mut app, 2)?;

    assert_eq!(app.systems().volume_camera.scale(), 1.0);
    let root = app.backend().transform(app.root()).expect("root");
    assert_eq!(root.scale, Vec3::ONE);
    assert!(root.translation.abs_diff_eq(Vec3::new(0.0, 0.0, -0.5), 1e-6));
    Ok(())
}

#[test]
fn render_volume_changes_settle_before_they_apply() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(volume_camera(Vec3::splat(10.0)));
    let start = Instant::now();
    app.tick_at(DELTA, start)?;
    app.tick_at(DELTA, start)?;
    assert!((app.systems().volume_camera.scale() - 0.1).abs() < 1e-6);

    app.set_render_volume_size_at(Vec3::splat(2.0), start);
    app.tick_at(DELTA, start + Duration::from_millis(100))?;
    assert!((app.systems().volume_camera.scale() - 0.1).abs() < 1e-6);

    // still resizing, the timer starts over
    app.set_render_volume_size_at(Vec3::splat(3.0), start + Duration::from_millis(200));
    app.tick_at(DELTA, start + Duration::from_millis(300))?;
    assert!((app.systems().volume_camera.scale() - 0.1).abs() < 1e-6);

    app.tick_at(DELTA, start + Duration::from_millis(500))?;
    assert!((app.systems().volume_camera.scale() - 0.3).abs() < 1e-6);
    let root = app.backend().transform(app.root()).expect("root");
    assert!(root.scale.abs_diff_eq(Vec3::splat(0.3), 1e-6));
    Ok(())
}

#[test]
fn degenerate_render_volume_never_collapses_the_root() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(volume_camera(Vec3::splat(10.0)));
    let start = Instant::now();
    app.tick_at(DELTA, start)?;
    app.tick_at(DELTA, start)?;

    app.set_render_volume_size_at(Vec3::ZERO, start);
    app.set_render_volume_size_at(Vec3::new(1.0, -2.0, 1.0), start + Duration::from_millis(50));
    app.tick_at(DELTA, start + Duration::from_millis(1000))?;

    assert!((app.systems().volume_camera.scale() - 0.1).abs() < 1e-6);
    let back = app.to_simulation_space(Vec3::new(0.1, 0.0, 0.0));
    assert!(back.is_finite());
    assert!(back.abs_diff_eq(Vec3::new(1.0, 0.0, 5.0), 1e-4));
    Ok(())
}

#[test]
fn pickable_nodes_get_input_components() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut()
        .add_node(pickable_ball(1, &[SIGNAL_INPUT_EVENT, SIGNAL_DRAG]));
    let mut quiet = pickable_ball(2, &[SIGNAL_INPUT_EVENT]);
    quiet.metadata.hover_effect = Some(false);
    app.host_mut().add_node(quiet);
    ticks(&mut app, 2)?;

    let ball = app.entity_for_node(NodeId(1)).expect("ball");
    assert!(app.backend().has_component(ball, ComponentKind::InputTarget));
    assert!(app.backend().has_component(ball, ComponentKind::HoverEffect));
    assert!(app.backend().has_component(ball, ComponentKind::Draggable));
    let (shape, filter_disabled) = app.backend().collision(ball).expect("collision");
    assert!(filter_disabled);
    assert!((shape.size.y - 0.5).abs() < 1e-4);

    let quiet = app.entity_for_node(NodeId(2)).expect("quiet");
    assert!(app.backend().has_component(quiet, ComponentKind::InputTarget));
    assert!(!app.backend().has_component(quiet, ComponentKind::HoverEffect));
    assert!(!app.backend().has_component(quiet, ComponentKind::Draggable));
    Ok(())
}

#[test]
fn tap_is_forwarded_in_simulation_space() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut()
        .add_node_at(volume_camera(Vec3::splat(10.0)), Vec3::new(0.0, 1.0, 0.0));
    app.host_mut()
        .add_node_at(pickable_ball(2, &[SIGNAL_INPUT_EVENT]), Vec3::new(1.0, 1.0, 0.0));
    ticks(&mut app, 2)?;

    let ball = app.entity_for_node(NodeId(2)).expect("ball");
    let center: Vec3 = app.backend().world_transform(ball).expect("alive").translation.into();
    assert!(center.abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1e-6));

    let location = center + Vec3::new(0.0, 0.025, 0.0);
    assert!(app.forward_tap(ball, location));

    let (node, signal) = app.host().emitted_signals().last().expect("emitted").clone();
    assert_eq!(node, NodeId(2));
    let NodeSignal::InputEvent {
        pressed,
        position,
        normal,
        shape_index,
    } = signal
    else {
        panic!("expected an input event, got {:?}", signal);
    };
    assert!(pressed);
    assert_eq!(shape_index, 0);
    // undo the root, then shift by half the volume depth
    assert!(position.abs_diff_eq(Vec3::new(1.0, 1.25, 5.0), 1e-4));
    assert!(normal.abs_diff_eq(Vec3::NEG_Y, 1e-6));
    Ok(())
}

#[test]
fn drags_need_the_matching_signal() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(pickable_ball(1, &[SIGNAL_INPUT_EVENT]));
    app.host_mut()
        .add_node(pickable_ball(2, &[SIGNAL_DRAG, SIGNAL_DRAG_ENDED]));
    ticks(&mut app, 2)?;
    let tap_only = app.entity_for_node(NodeId(1)).expect("tap only");
    let draggable = app.entity_for_node(NodeId(2)).expect("draggable");

    assert!(!app.forward_drag(tap_only, Vec3::X, Vec3::ZERO));
    assert!(!app.forward_drag_ended(tap_only));
    assert!(app.host().emitted_signals().is_empty());

    assert!(app.forward_drag(draggable, Vec3::X, Vec3::ZERO));
    assert!(app.forward_drag_ended(draggable));

    let signals = app.host().emitted_signals();
    assert_eq!(signals.len(), 2);
    assert_eq!(
        signals[0],
        (
            NodeId(2),
            NodeSignal::Drag {
                location: Vec3::new(1.0, 0.0, 0.5),
                start_location: Vec3::new(0.0, 0.0, 0.5),
            }
        )
    );
    assert_eq!(signals[1], (NodeId(2), NodeSignal::DragEnded));
    Ok(())
}

#[test]
fn input_on_unpickable_or_freed_nodes_is_ignored() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Wall"));
    app.host_mut().add_node(pickable_ball(2, &[SIGNAL_INPUT_EVENT]));
    ticks(&mut app, 2)?;
    let wall = app.entity_for_node(NodeId(1)).expect("wall");
    let ball = app.entity_for_node(NodeId(2)).expect("ball");

    assert!(!app.backend().has_component(wall, ComponentKind::InputTarget));
    assert!(!app.forward_tap(wall, Vec3::ZERO));

    app.host_mut().free_node_silently(NodeId(2));
    assert!(!app.forward_tap(ball, Vec3::ZERO));
    assert!(app.host().emitted_signals().is_empty());

    app.teardown();
    assert!(!app.forward_tap(wall, Vec3::ZERO));
    Ok(())
}
