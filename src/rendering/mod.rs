pub mod common;
pub mod importer;
pub mod loader;
pub mod render_backend;
pub mod resource_cache;
