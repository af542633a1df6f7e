//! The buffer fabric.
//!
//! Every grid-sized resource is allocated once at startup and lives for the
//! run. Double buffering is a parity flag, not a mutable pointer: the
//! read/write sets for a tick are derived from `read_is_a`, which flips
//! exactly once per tick after submission.

use crate::command::COMMAND_BUFFER_BYTES;
use crate::error::EngineError;
use crate::stats::STATS_WORDS;
use crate::voxel::VOXEL_WORDS;

/// Bytes of one voxel buffer holding `cells` voxels.
pub fn voxel_buffer_bytes(cells: u64) -> u64 {
    cells * VOXEL_WORDS as u64 * 4
}

/// Bytes of the stats buffer and its staging twin.
pub const STATS_BUFFER_BYTES: u64 = STATS_WORDS as u64 * 4;

/// All grid-sized GPU resources plus the parity flag.
pub struct GridBuffers {
    voxel_a: wgpu::Buffer,
    voxel_b: wgpu::Buffer,
    temp_a: wgpu::Buffer,
    temp_b: wgpu::Buffer,
    intent: wgpu::Buffer,
    command: wgpu::Buffer,
    params: wgpu::Buffer,
    stats: wgpu::Buffer,
    stats_staging: wgpu::Buffer,
    pick_staging: wgpu::Buffer,
    render_texture: wgpu::Texture,
    grid_size: u32,
    cell_count: u64,
    read_is_a: bool,
}

impl GridBuffers {
    /// Check the allocation against device limits before touching the
    /// device. Keeping this arithmetic (rather than trapping driver OOM)
    /// makes tier fallback deterministic and testable.
    pub fn validate_limits(
        grid_size: u32,
        cell_count: u64,
        limits: &wgpu::Limits,
    ) -> Result<(), EngineError> {
        let required = voxel_buffer_bytes(cell_count);
        let budget = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if required > budget {
            return Err(EngineError::Allocation {
                grid_size,
                required_bytes: required,
                limit_bytes: budget,
            });
        }
        Ok(())
    }

    /// Allocate the fabric. `cell_count` is the backing-store size: the full
    /// grid volume in dense mode, `max_bricks * 512` in sparse mode.
    pub fn new(device: &wgpu::Device, grid_size: u32, cell_count: u64) -> Self {
        let voxel_bytes = voxel_buffer_bytes(cell_count);
        let scalar_bytes = cell_count * 4;

        let storage_rw = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let make_voxel = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: voxel_bytes,
                usage: storage_rw,
                mapped_at_creation: false,
            })
        };
        let voxel_a = make_voxel("voxel buffer A");
        let voxel_b = make_voxel("voxel buffer B");

        let make_temp = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: scalar_bytes,
                usage: storage_rw,
                mapped_at_creation: false,
            })
        };
        let temp_a = make_temp("temperature buffer A");
        let temp_b = make_temp("temperature buffer B");

        let intent = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("intent buffer"),
            size: scalar_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let command = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("command buffer"),
            size: COMMAND_BUFFER_BYTES as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sim params"),
            size: (crate::params::PARAM_FIELDS * 4) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let stats = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stats buffer"),
            size: STATS_BUFFER_BYTES,
            usage: storage_rw,
            mapped_at_creation: false,
        });

        let stats_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stats staging"),
            size: STATS_BUFFER_BYTES,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let pick_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pick staging"),
            size: (VOXEL_WORDS * 4) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        // The renderer's 3D material texture. The fabric owns its lifetime;
        // filling it is the renderer's business.
        let render_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render volume"),
            size: wgpu::Extent3d {
                width: grid_size,
                height: grid_size,
                depth_or_array_layers: grid_size,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        Self {
            voxel_a,
            voxel_b,
            temp_a,
            temp_b,
            intent,
            command,
            params,
            stats,
            stats_staging,
            pick_staging,
            render_texture,
            grid_size,
            cell_count,
            read_is_a: true,
        }
    }

    /// Fill both temperature buffers with the ambient baseline so the first
    /// tick's modifier sits at the neutral midpoint.
    pub fn init_temperatures(&self, queue: &wgpu::Queue, ambient: f32) {
        let fill = vec![ambient.clamp(0.0, 1.0); self.cell_count as usize];
        let bytes: &[u8] = bytemuck::cast_slice(&fill);
        queue.write_buffer(&self.temp_a, 0, bytes);
        queue.write_buffer(&self.temp_b, 0, bytes);
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    pub fn read_is_a(&self) -> bool {
        self.read_is_a
    }

    pub fn swap(&mut self) {
        self.read_is_a = !self.read_is_a;
    }

    pub fn voxel_read(&self) -> &wgpu::Buffer {
        if self.read_is_a {
            &self.voxel_a
        } else {
            &self.voxel_b
        }
    }

    pub fn voxel_write(&self) -> &wgpu::Buffer {
        if self.read_is_a {
            &self.voxel_b
        } else {
            &self.voxel_a
        }
    }

    pub fn temp_read(&self) -> &wgpu::Buffer {
        if self.read_is_a {
            &self.temp_a
        } else {
            &self.temp_b
        }
    }

    pub fn temp_write(&self) -> &wgpu::Buffer {
        if self.read_is_a {
            &self.temp_b
        } else {
            &self.temp_a
        }
    }

    /// Buffers for a given parity, used when building the two fixed bind
    /// group sets: `(voxel_read, voxel_write, temp_read, temp_write)`.
    pub fn parity_set(&self, read_is_a: bool) -> (&wgpu::Buffer, &wgpu::Buffer, &wgpu::Buffer, &wgpu::Buffer) {
        if read_is_a {
            (&self.voxel_a, &self.voxel_b, &self.temp_a, &self.temp_b)
        } else {
            (&self.voxel_b, &self.voxel_a, &self.temp_b, &self.temp_a)
        }
    }

    pub fn intent(&self) -> &wgpu::Buffer {
        &self.intent
    }

    pub fn command(&self) -> &wgpu::Buffer {
        &self.command
    }

    pub fn params(&self) -> &wgpu::Buffer {
        &self.params
    }

    pub fn stats(&self) -> &wgpu::Buffer {
        &self.stats
    }

    pub fn stats_staging(&self) -> &wgpu::Buffer {
        &self.stats_staging
    }

    pub fn pick_staging(&self) -> &wgpu::Buffer {
        &self.pick_staging
    }

    pub fn render_texture(&self) -> &wgpu::Texture {
        &self.render_texture
    }
}
