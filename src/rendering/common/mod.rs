/// The two engines disagree on triangle winding and the direction of the V texture axis. This module converts between
/// them.
pub mod coordinate_systems;
/// Render side generated shapes (box, sphere, capsule).
pub mod primitives;
/// basic types (e.g. mesh) to abstract away from both the simulation resources and the render backend.
pub mod types;
