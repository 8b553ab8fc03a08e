pub mod mirrored;
