pub mod components;
pub mod entity_tracker;
pub mod systems;
