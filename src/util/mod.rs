use glam::Vec3;

pub mod debouncer;

/// Whether all components of `v` are equal, relative to the largest one.
pub fn is_uniform(v: Vec3, epsilon: f32) -> bool {
    let tolerance = epsilon * v.abs().max_element().max(1.0);
    (v.x - v.y).abs() <= tolerance && (v.y - v.z).abs() <= tolerance
}

/// Volumes need a finite, strictly positive extent along every axis.
pub fn is_valid_volume(size: Vec3) -> bool {
    size.is_finite() && size.cmpgt(Vec3::ZERO).all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_vectors() {
        assert!(is_uniform(Vec3::splat(2.5), 1e-5));
        assert!(is_uniform(Vec3::new(1000.0, 1000.001, 1000.0), 1e-5));
        assert!(!is_uniform(Vec3::new(1.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn volumes_need_a_positive_extent() {
        assert!(is_valid_volume(Vec3::new(0.5, 2.0, 1.0)));
        assert!(!is_valid_volume(Vec3::ZERO));
        assert!(!is_valid_volume(Vec3::new(1.0, -1.0, 1.0)));
        assert!(!is_valid_volume(Vec3::new(1.0, f32::INFINITY, 1.0)));
        assert!(!is_valid_volume(Vec3::splat(f32::NAN)));
    }
}
