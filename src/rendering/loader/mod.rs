/// Contrasting to the importers, that convert resources already held in memory into our rendering IR,
/// Loaders resolve resource paths against the project directory and read the files.
pub mod texture_loader;
