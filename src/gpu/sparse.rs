//! Brick-sparse backing store for the 256³ tier.
//!
//! The grid is carved into 8³ bricks. A CPU-owned bucket table maps brick
//! coordinates to pool slots; `0xFFFFFFFF` marks an unallocated brick. The
//! table is mirrored to a GPU buffer that every sparse kernel indirects
//! through. Allocation happens on the CPU between ticks (commands name the
//! cells they touch), so the GPU never races the table.

/// Voxels along one brick edge.
pub const BRICK_EDGE: u32 = 8;

/// Voxels per brick.
pub const BRICK_VOXELS: u32 = BRICK_EDGE * BRICK_EDGE * BRICK_EDGE;

/// Brick-grid dimension of the sparse tier: 256 / 8.
pub const SPARSE_BRICK_GRID_DIM: u32 = 32;

/// Pool capacity of the sparse tier, ~50 MB of voxel words.
pub const SPARSE_MAX_BRICKS: u32 = 3200;

const UNALLOCATED: u32 = 0xFFFF_FFFF;

pub struct SparseGrid {
    brick_table: Vec<u32>,
    free_list: Vec<u32>,
    brick_grid_dim: u32,
    max_bricks: u32,
    active_bricks: u32,
    table_buffer: wgpu::Buffer,
    dirty: bool,
    /// Slots handed out since the last drain. Recycled slots still hold the
    /// previous brick's words; the engine must scrub them before any kernel
    /// reads through the new mapping.
    fresh_slots: Vec<u32>,
}

impl SparseGrid {
    pub fn new(device: &wgpu::Device, brick_grid_dim: u32, max_bricks: u32) -> Self {
        let table_len = (brick_grid_dim as usize).pow(3);
        let table_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brick table"),
            size: (table_len * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            brick_table: vec![UNALLOCATED; table_len],
            // Pop order 0..max_bricks keeps slot assignment deterministic.
            free_list: (0..max_bricks).rev().collect(),
            brick_grid_dim,
            max_bricks,
            active_bricks: 0,
            table_buffer,
            dirty: true,
            fresh_slots: Vec::new(),
        }
    }

    fn table_index(&self, bx: u32, by: u32, bz: u32) -> usize {
        let dim = self.brick_grid_dim as usize;
        bz as usize * dim * dim + by as usize * dim + bx as usize
    }

    /// Allocate the brick at brick coordinates, returning its pool slot.
    /// Already-allocated bricks return their existing slot; a full pool
    /// returns None.
    pub fn allocate_brick(&mut self, bx: u32, by: u32, bz: u32) -> Option<u32> {
        let idx = self.table_index(bx, by, bz);
        if self.brick_table[idx] != UNALLOCATED {
            return Some(self.brick_table[idx]);
        }
        let slot = self.free_list.pop()?;
        self.brick_table[idx] = slot;
        self.active_bricks += 1;
        self.dirty = true;
        self.fresh_slots.push(slot);
        Some(slot)
    }

    /// Pool slots allocated since the last call. Callers scrub their
    /// backing-store regions before the next dispatch.
    pub fn take_fresh_slots(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.fresh_slots)
    }

    pub fn deallocate_brick(&mut self, bx: u32, by: u32, bz: u32) {
        let idx = self.table_index(bx, by, bz);
        if self.brick_table[idx] == UNALLOCATED {
            return;
        }
        self.free_list.push(self.brick_table[idx]);
        self.brick_table[idx] = UNALLOCATED;
        self.active_bricks -= 1;
        self.dirty = true;
    }

    /// Allocate the brick containing voxel (x, y, z).
    pub fn ensure_brick_for_voxel(&mut self, x: u32, y: u32, z: u32) -> Option<u32> {
        self.allocate_brick(x / BRICK_EDGE, y / BRICK_EDGE, z / BRICK_EDGE)
    }

    /// Pool slot of a voxel, or None while its brick is unallocated.
    pub fn voxel_pool_index(&self, x: u32, y: u32, z: u32) -> Option<u32> {
        let idx = self.table_index(x / BRICK_EDGE, y / BRICK_EDGE, z / BRICK_EDGE);
        let slot = self.brick_table[idx];
        if slot == UNALLOCATED {
            return None;
        }
        let local = (z % BRICK_EDGE) * 64 + (y % BRICK_EDGE) * BRICK_EDGE + (x % BRICK_EDGE);
        Some(slot * BRICK_VOXELS + local)
    }

    /// Allocate all face-adjacent bricks of every allocated brick, so
    /// movement and replication always find backing store one step out.
    pub fn grow_borders(&mut self) {
        let dim = self.brick_grid_dim;
        let mut allocated = Vec::new();
        for bz in 0..dim {
            for by in 0..dim {
                for bx in 0..dim {
                    if self.brick_table[self.table_index(bx, by, bz)] != UNALLOCATED {
                        allocated.push((bx as i32, by as i32, bz as i32));
                    }
                }
            }
        }
        let offsets: [(i32, i32, i32); 6] =
            [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];
        for (bx, by, bz) in allocated {
            for (dx, dy, dz) in offsets {
                let (nx, ny, nz) = (bx + dx, by + dy, bz + dz);
                if nx >= 0 && ny >= 0 && nz >= 0 && (nx as u32) < dim && (ny as u32) < dim && (nz as u32) < dim {
                    let _ = self.allocate_brick(nx as u32, ny as u32, nz as u32);
                }
            }
        }
    }

    /// Release bricks whose occupancy count (read back by the host) is zero.
    pub fn deallocate_empty_bricks(&mut self, occupancy: &[u32]) {
        let dim = self.brick_grid_dim;
        for bz in 0..dim {
            for by in 0..dim {
                for bx in 0..dim {
                    let slot = self.brick_table[self.table_index(bx, by, bz)];
                    if slot == UNALLOCATED {
                        continue;
                    }
                    if occupancy.get(slot as usize).copied() == Some(0) {
                        self.deallocate_brick(bx, by, bz);
                    }
                }
            }
        }
    }

    /// Mirror the table to the GPU when it changed since the last upload.
    pub fn upload_if_dirty(&mut self, queue: &wgpu::Queue) {
        if !self.dirty {
            return;
        }
        queue.write_buffer(&self.table_buffer, 0, bytemuck::cast_slice(&self.brick_table));
        self.dirty = false;
    }

    pub fn table_buffer(&self) -> &wgpu::Buffer {
        &self.table_buffer
    }

    pub fn is_allocated(&self, bx: u32, by: u32, bz: u32) -> bool {
        self.brick_table[self.table_index(bx, by, bz)] != UNALLOCATED
    }

    pub fn active_bricks(&self) -> u32 {
        self.active_bricks
    }

    pub fn max_bricks(&self) -> u32 {
        self.max_bricks
    }

    pub fn brick_grid_dim(&self) -> u32 {
        self.brick_grid_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A real device is needed for the table buffer; tests skip quietly on
    // machines without one.
    fn test_grid() -> Option<SparseGrid> {
        match crate::gpu::GpuContext::new_blocking() {
            Ok(ctx) => Some(SparseGrid::new(&ctx.device, 4, 8)),
            Err(_) => {
                eprintln!("skipping sparse grid test: no GPU adapter");
                None
            }
        }
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let Some(mut grid) = test_grid() else { return };
        assert_eq!(grid.allocate_brick(0, 0, 0), Some(0));
        assert_eq!(grid.allocate_brick(1, 0, 0), Some(1));
        // Re-allocating returns the existing slot.
        assert_eq!(grid.allocate_brick(0, 0, 0), Some(0));
        assert_eq!(grid.active_bricks(), 2);
    }

    #[test]
    fn test_pool_exhaustion_returns_none() {
        let Some(mut grid) = test_grid() else { return };
        for i in 0..8 {
            assert!(grid.allocate_brick(i % 4, i / 4, 0).is_some());
        }
        assert_eq!(grid.allocate_brick(0, 0, 3), None);
    }

    #[test]
    fn test_voxel_pool_index_layout() {
        let Some(mut grid) = test_grid() else { return };
        grid.allocate_brick(0, 0, 0);
        assert_eq!(grid.voxel_pool_index(0, 0, 0), Some(0));
        assert_eq!(grid.voxel_pool_index(1, 0, 0), Some(1));
        assert_eq!(grid.voxel_pool_index(0, 1, 0), Some(8));
        assert_eq!(grid.voxel_pool_index(0, 0, 1), Some(64));
        // Unallocated brick.
        assert_eq!(grid.voxel_pool_index(20, 0, 0), None);
    }

    #[test]
    fn test_deallocate_recycles_slots() {
        let Some(mut grid) = test_grid() else { return };
        let slot = grid.allocate_brick(2, 2, 2).unwrap();
        grid.deallocate_brick(2, 2, 2);
        assert!(!grid.is_allocated(2, 2, 2));
        // The freed slot is handed out again.
        assert_eq!(grid.allocate_brick(3, 3, 3), Some(slot));
    }

    #[test]
    fn test_border_growth_covers_faces() {
        let Some(mut grid) = test_grid() else { return };
        grid.allocate_brick(1, 1, 1);
        grid.grow_borders();
        for (bx, by, bz) in [(0, 1, 1), (2, 1, 1), (1, 0, 1), (1, 2, 1), (1, 1, 0), (1, 1, 2)] {
            assert!(grid.is_allocated(bx, by, bz), "face ({bx},{by},{bz}) missing");
        }
        assert_eq!(grid.active_bricks(), 7);
    }

    #[test]
    fn test_empty_brick_reclaim() {
        let Some(mut grid) = test_grid() else { return };
        grid.allocate_brick(0, 0, 0);
        grid.allocate_brick(1, 0, 0);
        // Slot 0 empty, slot 1 occupied.
        grid.deallocate_empty_bricks(&[0, 5]);
        assert!(!grid.is_allocated(0, 0, 0));
        assert!(grid.is_allocated(1, 0, 0));
    }
}
