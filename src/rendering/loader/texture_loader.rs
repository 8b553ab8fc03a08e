use crate::rendering::common::types::Texture;
use crate::simulation::resolve_resource_path;
use crate::simulation::types::TextureSource;
use anyhow::{Context, bail};
use log::{error, trace};
use std::path::Path;

pub struct TextureLoader {}

impl TextureLoader {
    /// Loads and decodes the file behind a texture resource. Failures are logged and return `None`, callers substitute
    /// [`Texture::unknown_texture`].
    pub fn load(project_dir: &Path, source: &TextureSource) -> Option<Texture> {
        match Self::try_load(project_dir, source) {
            Ok(texture) => Some(texture),
            Err(err) => {
                error!("Loading texture {:?} failed: {:#}", source.id, err);
                None
            }
        }
    }

    fn try_load(project_dir: &Path, source: &TextureSource) -> Result<Texture, anyhow::Error> {
        if source.resource_path.is_empty() {
            bail!("Texture has no resource path");
        }

        let path = resolve_resource_path(project_dir, &source.resource_path);
        trace!("Loading texture {} from {}", source.resource_path, path.display());
        let image = image::open(&path)
            .with_context(|| format!("Decoding {}", path.display()))?
            .into_rgba8();

        Ok(Texture {
            label: source.resource_path.clone(),
            width: image.width(),
            height: image.height(),
            rgba8: image.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::ResourceId;

    fn temp_project(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("scenemirror-texture-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn loads_png_relative_to_project() -> Result<(), anyhow::Error> {
        let dir = temp_project("png");
        let mut img = image::RgbaImage::new(2, 3);
        img.put_pixel(1, 2, image::Rgba([10, 20, 30, 255]));
        img.save(dir.join("albedo.png"))?;

        let source = TextureSource {
            id: ResourceId(1),
            resource_path: "res://albedo.png".to_string(),
        };
        let texture = TextureLoader::load(&dir, &source).expect("texture loads");
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.rgba8.len(), 2 * 3 * 4);
        assert_eq!(&texture.rgba8[(2 * 2 + 1) * 4..(2 * 2 + 2) * 4], &[10, 20, 30, 255]);
        Ok(())
    }

    #[test]
    fn missing_file_is_none() {
        let source = TextureSource {
            id: ResourceId(2),
            resource_path: "res://does/not/exist.png".to_string(),
        };
        assert!(TextureLoader::load(&temp_project("missing"), &source).is_none());

        let runtime = TextureSource {
            id: ResourceId(3),
            resource_path: String::new(),
        };
        assert!(TextureLoader::load(&temp_project("missing"), &runtime).is_none());
    }
}
