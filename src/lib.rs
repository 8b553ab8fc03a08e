pub mod audio;
pub mod demos;
pub mod entity;
pub mod mirror;
pub mod rendering;
pub mod settings;
pub mod simulation;
pub mod util;
