//! Grid addressing.
//!
//! Voxel identity is purely positional: a cell is its linear index in a
//! `grid_size`³ volume, `z * gs² + y * gs + x`. The same formula lives in
//! `shaders/common.wgsl`.

use glam::IVec3;

/// 3D coordinates to linear buffer index.
#[inline]
pub fn grid_index(x: u32, y: u32, z: u32, grid_size: u32) -> usize {
    (z * grid_size * grid_size + y * grid_size + x) as usize
}

/// Linear buffer index back to 3D coordinates.
#[inline]
pub fn grid_coords(index: usize, grid_size: u32) -> (u32, u32, u32) {
    let index = index as u32;
    (
        index % grid_size,
        (index / grid_size) % grid_size,
        index / (grid_size * grid_size),
    )
}

/// The six face-adjacent offsets, ordered to match [`crate::intent::Direction`]:
/// +X, -X, +Y, -Y, +Z, -Z.
#[inline]
pub fn neighbor_offsets() -> [IVec3; 6] {
    [
        IVec3::new(1, 0, 0),
        IVec3::new(-1, 0, 0),
        IVec3::new(0, 1, 0),
        IVec3::new(0, -1, 0),
        IVec3::new(0, 0, 1),
        IVec3::new(0, 0, -1),
    ]
}

#[inline]
pub fn in_bounds(p: IVec3, grid_size: u32) -> bool {
    let gs = grid_size as i32;
    p.x >= 0 && p.x < gs && p.y >= 0 && p.y < gs && p.z >= 0 && p.z < gs
}

/// Chebyshev distance, the metric of the cubic command brush.
#[inline]
pub fn chebyshev(a: IVec3, b: IVec3) -> u32 {
    let d = (a - b).abs();
    d.x.max(d.y).max(d.z) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_origin_and_last() {
        assert_eq!(grid_index(0, 0, 0, 128), 0);
        assert_eq!(grid_index(127, 127, 127, 128), 128 * 128 * 128 - 1);
    }

    #[test]
    fn test_index_coord_roundtrip() {
        for &(x, y, z) in &[(0, 0, 0), (1, 2, 3), (63, 64, 65), (127, 127, 127)] {
            let idx = grid_index(x, y, z, 128);
            assert_eq!(grid_coords(idx, 128), (x, y, z));
        }
    }

    #[test]
    fn test_offsets_match_direction_order() {
        use crate::intent::Direction;
        let offsets = neighbor_offsets();
        assert_eq!(offsets[Direction::PosX as usize], IVec3::new(1, 0, 0));
        assert_eq!(offsets[Direction::NegZ as usize], IVec3::new(0, 0, -1));
        // Every offset's negation is the Direction::opposite slot.
        for d in 0..6u8 {
            let dir = Direction::from_u8(d);
            assert_eq!(offsets[dir as usize], -offsets[dir.opposite() as usize]);
        }
    }

    #[test]
    fn test_chebyshev_is_cubic() {
        let c = IVec3::new(5, 5, 5);
        assert_eq!(chebyshev(c, c), 0);
        assert_eq!(chebyshev(c, IVec3::new(6, 5, 5)), 1);
        assert_eq!(chebyshev(c, IVec3::new(6, 6, 6)), 1);
        assert_eq!(chebyshev(c, IVec3::new(3, 5, 7)), 2);
    }

    #[test]
    fn test_in_bounds_edges() {
        assert!(in_bounds(IVec3::ZERO, 8));
        assert!(in_bounds(IVec3::new(7, 7, 7), 8));
        assert!(!in_bounds(IVec3::new(8, 0, 0), 8));
        assert!(!in_bounds(IVec3::new(0, -1, 0), 8));
    }
}
