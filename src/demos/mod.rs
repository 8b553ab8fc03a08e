//! Scripted scenes for the headless binary. They exercise the mirror the way a real project would: nodes are
//! announced out of order, resources change while mirrored and skeletons animate.

use crate::settings::DemoScene;
use crate::simulation::scripted::ScriptedSimulation;
use crate::simulation::types::{
    BoneArray, BoneSource, CollisionShapeInfo, MaterialSource, MeshBinding, MeshShape, MeshSource, NodeClass, NodeId,
    NodeInfo, ResourceId, SkeletonSource, StandardMaterialDesc, SurfaceArrays,
};
use crate::simulation::{SIGNAL_DRAG, SIGNAL_DRAG_ENDED, SIGNAL_INPUT_EVENT, SIGNAL_ON_PLAY, VOLUME_CAMERA_NODE_NAME};
use glam::{Affine3A, Quat, Vec2, Vec3, Vec4};
use log::info;
use scenemirror_buffers::pose::types::JointPoseRecord;

pub const VOLUME_CAMERA: NodeId = NodeId(1);
pub const TABLE: NodeId = NodeId(2);
pub const TABLE_TOP: NodeId = NodeId(3);
pub const CUP: NodeId = NodeId(4);
pub const BALL: NodeId = NodeId(5);
pub const SPEAKER: NodeId = NodeId(6);
pub const CREATURE: NodeId = NodeId(7);

pub const QUAD_MESH: ResourceId = ResourceId(100);
pub const SKINNED_MESH: ResourceId = ResourceId(101);
pub const WOOD_MATERIAL: ResourceId = ResourceId(200);
pub const CREATURE_SKELETON: ResourceId = ResourceId(300);

/// A unit quad in the xy plane, facing +z.
pub fn quad_mesh(id: ResourceId) -> MeshSource {
    MeshSource {
        id,
        name: "quad".into(),
        surfaces: vec![SurfaceArrays {
            positions: Some(vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
                Vec3::new(-0.5, 0.5, 0.0),
            ]),
            // clockwise, as the simulation winds its triangles
            indices: Some(vec![0, 2, 1, 0, 3, 2]),
            normals: Some(vec![Vec3::Z; 4]),
            uvs: Some(vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ]),
            ..Default::default()
        }],
    }
}

/// Two stacked quads, the lower one bound to the root bone, the upper one to its child.
pub fn skinned_strip_mesh(id: ResourceId) -> MeshSource {
    let positions = (0..4)
        .flat_map(|row| [Vec3::new(-0.5, row as f32 * 0.5, 0.0), Vec3::new(0.5, row as f32 * 0.5, 0.0)])
        .collect::<Vec<_>>();
    let bone_indices = positions
        .iter()
        .flat_map(|position| [if position.y > 0.75 { 1 } else { 0 }, 0, 0, 0])
        .collect::<Vec<i32>>();
    let bone_weights = positions
        .iter()
        .flat_map(|_| [1.0f32, 0.0, 0.0, 0.0])
        .collect::<Vec<_>>();

    MeshSource {
        id,
        name: "strip".into(),
        surfaces: vec![SurfaceArrays {
            positions: Some(positions),
            indices: Some(vec![0, 2, 1, 1, 2, 3, 2, 4, 3, 3, 4, 5, 4, 6, 5, 5, 6, 7]),
            bone_indices: Some(BoneArray::Int32(bone_indices)),
            bone_weights: Some(BoneArray::Float32(bone_weights)),
            ..Default::default()
        }],
    }
}

pub fn two_bone_skeleton(id: ResourceId) -> SkeletonSource {
    SkeletonSource {
        id,
        bones: vec![
            BoneSource {
                name: "root".into(),
                parent: -1,
                rest: Affine3A::IDENTITY,
            },
            BoneSource {
                name: "neck".into(),
                parent: 0,
                rest: Affine3A::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            },
        ],
    }
}

pub fn volume_camera(size: Vec3) -> NodeInfo {
    let mut info = NodeInfo::new(VOLUME_CAMERA, NodeId::NONE, VOLUME_CAMERA_NODE_NAME, NodeClass::Area3D);
    info.collision_shapes.push(CollisionShapeInfo::Box { size });
    info
}

fn wood() -> MaterialSource {
    MaterialSource::Standard(StandardMaterialDesc {
        albedo_color: Vec4::new(0.55, 0.35, 0.2, 1.0),
        roughness: 0.8,
        ..Default::default()
    })
}

fn mesh_node(id: NodeId, parent: NodeId, name: &str, binding: MeshBinding) -> NodeInfo {
    let mut info = NodeInfo::new(id, parent, name, NodeClass::MeshInstance3D);
    info.mesh = Some(binding);
    info
}

/// Fills the simulation and animates it before every frame.
pub struct DemoDriver {
    scene: DemoScene,
}

impl DemoDriver {
    pub fn new(scene: DemoScene) -> Self {
        Self { scene }
    }

    pub fn populate(&self, sim: &mut ScriptedSimulation) {
        info!("Populating the {:?} demo", self.scene);
        sim.add_node_at(volume_camera(Vec3::splat(10.0)), Vec3::new(0.0, 1.0, 0.0));

        match self.scene {
            DemoScene::Hierarchy => Self::populate_hierarchy(sim),
            DemoScene::Skinned => Self::populate_skinned(sim),
            DemoScene::Changing => {
                Self::populate_hierarchy(sim);
                Self::populate_skinned(sim);
            }
        }
    }

    fn populate_hierarchy(sim: &mut ScriptedSimulation) {
        sim.insert_mesh(quad_mesh(QUAD_MESH));
        sim.insert_material(WOOD_MATERIAL, wood());

        // children first, the mirror has to wait for their parents
        let mut cup = MeshBinding::new(MeshShape::Capsule {
            height: 0.3,
            radius: 0.1,
        });
        cup.materials.push(None);
        sim.add_node_at(mesh_node(CUP, TABLE_TOP, "Cup", cup), Vec3::new(0.2, 0.2, 0.0));

        let mut top = MeshBinding::new(MeshShape::Arbitrary(QUAD_MESH));
        top.materials.push(Some(WOOD_MATERIAL));
        sim.add_node_at(mesh_node(TABLE_TOP, TABLE, "TableTop", top), Vec3::new(0.0, 1.0, 0.0));

        let table = mesh_node(
            TABLE,
            NodeId::NONE,
            "Table",
            MeshBinding::new(MeshShape::Box {
                size: Vec3::new(1.0, 0.1, 1.0),
            }),
        );
        sim.add_node(table);
        sim.set_spin(TABLE, 0.5);

        let mut ball = mesh_node(
            BALL,
            NodeId::NONE,
            "Ball",
            MeshBinding::new(MeshShape::Sphere { radius: 0.25 }),
        );
        ball.ray_pickable = true;
        ball.signals = vec![SIGNAL_INPUT_EVENT.into(), SIGNAL_DRAG.into(), SIGNAL_DRAG_ENDED.into()];
        sim.add_node_at(ball, Vec3::new(-1.0, 0.5, 0.0));

        let mut speaker = NodeInfo::new(SPEAKER, TABLE, "Speaker", NodeClass::AudioStreamPlayer3D);
        speaker.signals.push(SIGNAL_ON_PLAY.into());
        speaker.metadata.prewarm_audio.push("res://sounds/chime.wav".into());
        sim.add_node(speaker);
    }

    fn populate_skinned(sim: &mut ScriptedSimulation) {
        sim.insert_skeleton(two_bone_skeleton(CREATURE_SKELETON));
        sim.insert_mesh(skinned_strip_mesh(SKINNED_MESH));

        let mut binding = MeshBinding::new(MeshShape::Arbitrary(SKINNED_MESH));
        binding.skeleton = Some(CREATURE_SKELETON);
        sim.add_node_at(
            mesh_node(CREATURE, NodeId::NONE, "Creature", binding),
            Vec3::new(1.0, 0.0, 0.0),
        );
    }

    pub fn before_frame(&mut self, sim: &mut ScriptedSimulation, frame: u64, time: f32) {
        if matches!(self.scene, DemoScene::Skinned | DemoScene::Changing) {
            let nod = Quat::from_rotation_x((time * 2.0).sin() * 0.5);
            sim.set_pose(
                CREATURE_SKELETON,
                vec![
                    JointPoseRecord::IDENTITY,
                    JointPoseRecord::new([0.0, 1.0, 0.0], nod.to_array(), [1.0, 1.0, 1.0]),
                ],
            );
        }

        if matches!(self.scene, DemoScene::Hierarchy | DemoScene::Changing) && frame % 90 == 45 {
            sim.play_audio(SPEAKER, "res://sounds/chime.wav", -6.0);
        }

        if self.scene != DemoScene::Changing {
            return;
        }

        match frame {
            60 => {
                info!("Repainting the table top");
                let mut repainted = StandardMaterialDesc {
                    albedo_color: Vec4::new(0.1, 0.3, 0.8, 1.0),
                    ..Default::default()
                };
                repainted.metallic = 0.5;
                sim.insert_material(WOOD_MATERIAL, MaterialSource::Standard(repainted));
            }
            120 => {
                info!("Replacing the table top mesh");
                let mut mesh = quad_mesh(QUAD_MESH);
                mesh.name = "larger quad".into();
                for surface in &mut mesh.surfaces {
                    if let Some(positions) = &mut surface.positions {
                        positions.iter_mut().for_each(|position| *position *= 2.0);
                    }
                }
                sim.insert_mesh(mesh);
            }
            180 => {
                info!("Removing the table");
                sim.remove_node(TABLE);
            }
            _ => {}
        }
    }
}
