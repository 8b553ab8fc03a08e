use anyhow::bail;
use glam::Vec2;

// The simulation uses clockwise front faces and a V axis pointing down, the render side counter clockwise front faces
// and V pointing up.

/// Swaps the 2nd and 3rd index of every triangle: `(a, b, c) -> (a, c, b)`.
/// Panics when `indices` doesn't describe whole triangles, use [`try_reverse_winding`] for untrusted input.
pub fn reverse_winding<T: Copy>(indices: &[T]) -> Vec<T> {
    assert_eq!(indices.len() % 3, 0, "Index buffer doesn't contain whole triangles");

    let mut result = Vec::with_capacity(indices.len());
    for tri in indices.chunks_exact(3) {
        result.extend_from_slice(&[tri[0], tri[2], tri[1]]);
    }
    result
}

pub fn try_reverse_winding<T: Copy>(indices: &[T]) -> Result<Vec<T>, anyhow::Error> {
    if indices.len() % 3 != 0 {
        bail!(
            "Index buffer of length {} doesn't contain whole triangles",
            indices.len()
        );
    }

    Ok(reverse_winding(indices))
}

/// The index buffer for unindexed vertices that arrive in flipped order: `0, 2, 1, 3, 5, 4, ...`
pub fn reversed_identity_indices(vertex_count: usize) -> Result<Vec<u32>, anyhow::Error> {
    let identity = (0..vertex_count as u32).collect::<Vec<_>>();
    try_reverse_winding(&identity)
}

#[inline]
pub fn flip_v(v: f32) -> f32 {
    1.0 - v
}

#[inline]
pub fn flip_uv(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, flip_v(uv.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_winding_swaps_last_two() {
        assert_eq!(reverse_winding(&[0u32, 1, 2, 2, 1, 3]), vec![0, 2, 1, 2, 3, 1]);
    }

    #[test]
    fn reverse_winding_is_an_involution() {
        let indices: Vec<u32> = (0..30).map(|i| (i * 7 + 3) % 11).collect();
        assert_eq!(reverse_winding(&reverse_winding(&indices)), indices);
        assert!(reverse_winding::<u32>(&[]).is_empty());
    }

    #[test]
    #[should_panic]
    fn reverse_winding_rejects_partial_triangles() {
        reverse_winding(&[0u32, 1, 2, 3]);
    }

    #[test]
    fn try_reverse_winding_errors_on_partial_triangles() {
        assert!(try_reverse_winding(&[0i32, 1]).is_err());
        assert!(try_reverse_winding(&[0i32, 1, 2, 3, 4]).is_err());
        assert!(try_reverse_winding(&[0i32, 1, 2]).is_ok());
    }

    #[test]
    fn reversed_identity() -> Result<(), anyhow::Error> {
        assert_eq!(reversed_identity_indices(6)?, vec![0, 2, 1, 3, 5, 4]);
        assert!(reversed_identity_indices(5).is_err());
        Ok(())
    }

    #[test]
    fn flip_v_is_an_involution() {
        assert_eq!(flip_v(0.0), 1.0);
        assert_eq!(flip_v(1.0), 0.0);
        for v in [0.25f32, 0.5, 0.75, -1.0, 2.0] {
            assert!((flip_v(flip_v(v)) - v).abs() < 1e-6);
        }
        assert_eq!(flip_uv(Vec2::new(0.3, 0.0)), Vec2::new(0.3, 1.0));
    }
}
