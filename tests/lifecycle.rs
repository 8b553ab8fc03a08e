mod common;

use common::{DELTA, box_node, default_mirror, mirror, spatial, ticks, with_mesh};
use scenemirror::demos::{QUAD_MESH, quad_mesh};
use scenemirror::entity::entity_tracker::NodeState;
use scenemirror::rendering::render_backend::RenderBackend;
use scenemirror::settings::MirrorSettings;
use scenemirror::simulation::SimulationEvent;
use scenemirror::simulation::types::{MeshBinding, MeshShape, NodeClass, NodeId, NodeInfo};

#[test]
fn node_is_materialized_one_pass_after_its_announcement() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Crate"));

    ticks(&mut app, 1)?;
    assert_eq!(app.entity_for_node(NodeId(1)), None);
    assert_eq!(app.tracker().state(NodeId(1)), NodeState::Pending);

    ticks(&mut app, 1)?;
    let entity = app.entity_for_node(NodeId(1)).expect("materialized");
    assert_eq!(app.node_for_entity(entity), Some(NodeId(1)));
    assert_eq!(app.backend().parent(entity), Some(app.root()));
    assert!(app.backend().model(entity).is_some());
    assert_eq!(app.backend().name(entity).as_deref(), Some("Crate(1)"));
    Ok(())
}

#[test]
fn child_announced_before_parent_is_linked_after_two_passes() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(spatial(3, 2, "Grandchild"));
    app.host_mut().add_node(spatial(2, 1, "Child"));
    app.host_mut().add_node(spatial(1, 0, "Parent"));

    ticks(&mut app, 2)?;

    let parent = app.entity_for_node(NodeId(1)).expect("parent");
    let child = app.entity_for_node(NodeId(2)).expect("child");
    let grandchild = app.entity_for_node(NodeId(3)).expect("grandchild");

    assert_eq!(app.backend().parent(parent), Some(app.root()));
    assert_eq!(app.backend().parent(child), Some(parent));
    assert_eq!(app.backend().parent(grandchild), Some(child));
    assert_eq!(app.tracker().orphans_reported(), 0);
    assert_eq!(app.tracker().awaiting_parent_count(), 0);
    Ok(())
}

#[test]
fn parent_announced_a_pass_later_is_linked_within_the_bound() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(spatial(2, 1, "Child"));
    app.host_mut().add_node_silently(spatial(1, 0, "Parent"));
    ticks(&mut app, 2)?;

    let child = app.entity_for_node(NodeId(2)).expect("child");
    assert_eq!(app.backend().parent(child), Some(app.root()));

    app.host_mut().send_event(SimulationEvent::NodeAdded(NodeId(1)));
    ticks(&mut app, 2)?;

    let parent = app.entity_for_node(NodeId(1)).expect("parent");
    assert_eq!(app.backend().parent(child), Some(parent));
    assert_eq!(app.tracker().orphans_reported(), 0);
    Ok(())
}

#[test]
fn exceeding_the_retry_bound_reports_once_and_keeps_the_node() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(spatial(2, 1, "Child"));
    app.host_mut().add_node_silently(spatial(1, 0, "NeverAnnounced"));

    ticks(&mut app, 10)?;

    let child = app.entity_for_node(NodeId(2)).expect("the child is kept");
    assert_eq!(app.backend().parent(child), Some(app.root()));
    assert_eq!(app.tracker().orphans_reported(), 1);
    assert_eq!(app.tracker().awaiting_parent_count(), 0);
    Ok(())
}

#[test]
fn retry_bound_is_configurable() -> Result<(), anyhow::Error> {
    let settings = MirrorSettings {
        parent_retry_passes: 5,
        ..Default::default()
    };
    let mut app = mirror(&settings)?;
    app.host_mut().add_node(spatial(2, 1, "Child"));
    app.host_mut().add_node_silently(spatial(1, 0, "Late"));

    ticks(&mut app, 5)?;
    assert_eq!(app.tracker().orphans_reported(), 0);

    app.host_mut().send_event(SimulationEvent::NodeAdded(NodeId(1)));
    ticks(&mut app, 2)?;

    let parent = app.entity_for_node(NodeId(1)).expect("parent");
    let child = app.entity_for_node(NodeId(2)).expect("child");
    assert_eq!(app.backend().parent(child), Some(parent));
    assert_eq!(app.tracker().orphans_reported(), 0);
    Ok(())
}

#[test]
fn children_of_non_spatial_nodes_hang_below_the_root() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(NodeInfo::new(
        NodeId(1),
        NodeId::NONE,
        "Main",
        NodeClass::NonSpatial("Node".into()),
    ));
    app.host_mut().add_node(spatial(2, 1, "World"));
    ticks(&mut app, 4)?;

    assert_eq!(app.entity_for_node(NodeId(1)), None);
    let world = app.entity_for_node(NodeId(2)).expect("world");
    assert_eq!(app.backend().parent(world), Some(app.root()));
    assert_eq!(app.tracker().orphans_reported(), 0);
    Ok(())
}

#[test]
fn removal_detaches_and_forgets_the_entity() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Parent"));
    app.host_mut().add_node(box_node(2, 1, "Child"));
    ticks(&mut app, 2)?;

    let parent = app.entity_for_node(NodeId(1)).expect("parent");
    let child = app.entity_for_node(NodeId(2)).expect("child");

    app.host_mut().remove_node(NodeId(1));
    ticks(&mut app, 1)?;

    assert!(!app.backend().is_alive(parent));
    assert!(!app.backend().is_alive(child));
    assert_eq!(app.entity_for_node(NodeId(1)), None);
    assert_eq!(app.node_for_entity(child), None);
    assert!(app.tracker().is_empty());
    assert!(app.backend().children(app.root()).is_empty());
    Ok(())
}

#[test]
fn removing_an_unknown_node_is_a_no_op() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Crate"));
    ticks(&mut app, 2)?;

    app.host_mut().send_event(SimulationEvent::NodeRemoved(NodeId(42)));
    ticks(&mut app, 1)?;
    assert!(app.entity_for_node(NodeId(1)).is_some());

    app.host_mut().remove_node(NodeId(1));
    app.host_mut().send_event(SimulationEvent::NodeRemoved(NodeId(1)));
    ticks(&mut app, 1)?;
    app.host_mut().send_event(SimulationEvent::NodeRemoved(NodeId(1)));
    ticks(&mut app, 1)?;

    assert!(app.tracker().is_empty());
    Ok(())
}

#[test]
fn removal_in_the_same_pass_cancels_the_addition() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Blink"));
    app.host_mut().remove_node(NodeId(1));
    ticks(&mut app, 3)?;

    assert_eq!(app.entity_for_node(NodeId(1)), None);
    assert_eq!(app.tracker().state(NodeId(1)), NodeState::Unseen);
    Ok(())
}

#[test]
fn node_freed_before_materialization_is_skipped() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Ephemeral"));
    ticks(&mut app, 1)?;

    app.host_mut().free_node_silently(NodeId(1));
    ticks(&mut app, 1)?;

    assert_eq!(app.entity_for_node(NodeId(1)), None);
    assert!(app.backend().children(app.root()).is_empty());
    Ok(())
}

#[test]
fn validity_sweep_removes_freed_nodes() -> Result<(), anyhow::Error> {
    let settings = MirrorSettings {
        validity_sweep_interval: 1,
        ..Default::default()
    };
    let mut app = mirror(&settings)?;
    app.host_mut().add_node(box_node(1, 0, "Crate"));
    ticks(&mut app, 2)?;
    let entity = app.entity_for_node(NodeId(1)).expect("materialized");

    app.host_mut().free_node_silently(NodeId(1));
    ticks(&mut app, 1)?;

    assert_eq!(app.entity_for_node(NodeId(1)), None);
    assert!(!app.backend().is_alive(entity));
    Ok(())
}

#[test]
fn reparenting_follows_the_snapshot() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(spatial(1, 0, "Left"));
    app.host_mut().add_node(spatial(2, 0, "Right"));
    app.host_mut().add_node(spatial(3, 1, "Ball"));
    ticks(&mut app, 2)?;

    let left = app.entity_for_node(NodeId(1)).expect("left");
    let right = app.entity_for_node(NodeId(2)).expect("right");
    let ball = app.entity_for_node(NodeId(3)).expect("ball");
    assert_eq!(app.backend().parent(ball), Some(left));

    app.host_mut().node_mut(NodeId(3)).expect("ball").info.parent = NodeId(2);
    ticks(&mut app, 1)?;
    assert_eq!(app.backend().parent(ball), Some(right));

    app.host_mut().node_mut(NodeId(3)).expect("ball").info.parent = NodeId::NONE;
    ticks(&mut app, 1)?;
    assert_eq!(app.backend().parent(ball), Some(app.root()));
    Ok(())
}

#[test]
fn removed_and_re_added_node_gets_a_new_entity() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Phoenix"));
    ticks(&mut app, 2)?;
    let first = app.entity_for_node(NodeId(1)).expect("first");

    app.host_mut().remove_node(NodeId(1));
    app.host_mut().add_node(box_node(1, 0, "Phoenix"));
    ticks(&mut app, 1)?;
    assert!(!app.backend().is_alive(first));

    ticks(&mut app, 1)?;
    let second = app.entity_for_node(NodeId(1)).expect("second");
    assert_ne!(first, second);
    Ok(())
}

#[test]
fn reset_scene_drops_entities_and_subscriptions() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().insert_mesh(quad_mesh(QUAD_MESH));
    app.host_mut()
        .add_node(with_mesh(1, 0, "Quad", MeshBinding::new(MeshShape::Arbitrary(QUAD_MESH))));
    ticks(&mut app, 2)?;
    assert!(app.host().subscription_count() > 0);

    app.reset_scene();
    assert!(app.tracker().is_empty());
    assert!(app.backend().children(app.root()).is_empty());
    assert_eq!(app.backend().entity_count(), 1);
    assert_eq!(app.host().subscription_count(), 0);

    app.host_mut().add_node(box_node(5, 0, "Fresh"));
    ticks(&mut app, 2)?;
    assert!(app.entity_for_node(NodeId(5)).is_some());
    Ok(())
}

#[test]
fn reloading_the_scene_releases_backend_resources() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().insert_mesh(quad_mesh(QUAD_MESH));

    for round in 0..3 {
        app.host_mut().add_node(with_mesh(
            10 + round,
            0,
            "Quad",
            MeshBinding::new(MeshShape::Arbitrary(QUAD_MESH)),
        ));
        ticks(&mut app, 2)?;
        assert_eq!(app.backend().mesh_count(), 1);
        assert_eq!(app.backend().material_count(), 1);

        app.reset_scene();
        assert_eq!(app.backend().mesh_count(), 0);
        assert_eq!(app.backend().material_count(), 0);
        assert_eq!(app.backend().texture_count(), 0);
    }
    Ok(())
}

#[test]
fn ticks_after_teardown_are_rejected() -> Result<(), anyhow::Error> {
    let mut app = default_mirror()?;
    app.host_mut().add_node(box_node(1, 0, "Crate"));
    ticks(&mut app, 2)?;

    app.teardown();
    assert!(app.is_torn_down());
    assert!(!app.host().is_connected());
    assert_eq!(app.host().subscription_count(), 0);
    assert!(app.tick(DELTA).is_err());
    Ok(())
}
