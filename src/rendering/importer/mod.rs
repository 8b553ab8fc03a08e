/// Importers convert the simulation's resources into our rendering IR (see `rendering::common::types`), which then is
/// handed to the render backend. They don't touch the simulation or the backend themselves, so they can run on the
/// background conversion tasks.
pub mod material_importer;
pub mod mesh_importer;
pub mod skeleton_importer;
