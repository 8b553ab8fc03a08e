//! Get-or-upload of converted resources: the first access hands the IR to the backend and remembers the handle on the
//! conversion record, every later access returns that handle.

use crate::rendering::common::primitives::generate_sphere;
use crate::rendering::render_backend::{MaterialHandle, MeshHandle, RenderBackend, TextureHandle};
use crate::rendering::resource_cache::{MaterialRecord, MeshRecord, TextureRecord};
use log::error;
use std::sync::Arc;

pub fn load_mesh<B: RenderBackend + ?Sized>(backend: &mut B, record: &mut MeshRecord) -> Option<MeshHandle> {
    if let Some(handle) = record.handle() {
        return Some(handle);
    }

    // Not converted yet (or the conversion is still running)
    let contents = record.converted()?;
    let handle = match backend.add_mesh(contents) {
        Ok(handle) => handle,
        Err(err) => {
            error!("Backend rejected mesh {:?}, using a sphere instead: {:#}", record.key, err);
            backend.add_mesh(Arc::new(generate_sphere(1.0))).ok()?
        }
    };

    record.set_handle(handle);
    Some(handle)
}

pub fn load_texture<B: RenderBackend + ?Sized>(backend: &mut B, record: &mut TextureRecord) -> Option<TextureHandle> {
    if let Some(handle) = record.handle() {
        return Some(handle);
    }

    let texture = record.converted()?;
    match backend.add_texture(&texture) {
        Ok(handle) => {
            record.set_handle(handle);
            Some(handle)
        }
        Err(err) => {
            error!("Backend rejected texture {:?}: {:#}", record.key, err);
            None
        }
    }
}

pub fn load_material<B: RenderBackend + ?Sized>(
    backend: &mut B,
    record: &mut MaterialRecord,
    albedo_texture: Option<TextureHandle>,
    emission_texture: Option<TextureHandle>,
) -> Option<MaterialHandle> {
    if let Some(handle) = record.handle() {
        return Some(handle);
    }

    let material = record.converted()?;
    let handle = backend.add_material(&material, albedo_texture, emission_texture);
    record.set_handle(handle);
    Some(handle)
}
