//! The simulation engine.
//!
//! An [`Engine`] is a value: it owns every grid buffer, the five compute
//! pipelines, the parity flag, and the readback state machines, and the host
//! shell threads exactly one through its frame loop. There are no globals
//! and no background threads; the only suspension point is the async buffer
//! map the readbacks wait on.
//!
//! One tick is one command submission:
//!
//! 1. upload pending player commands and the params block (tick stamped in),
//! 2. clear the intent and stats buffers,
//! 3. dispatch apply_commands, temperature_diffusion, intent_declaration,
//!    resolve_execute, stats_reduction in order,
//! 4. flip parity,
//! 5. kick the stats readback if the previous one finished.
//!
//! Commands are applied to the *read* voxel buffer in place: nothing has
//! read it yet in the tick, and every later kernel must see the edits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::UVec3;

use crate::command::{encode_command_buffer, Command, CommandType};
use crate::error::EngineError;
use crate::gpu::{
    detect_tier, GpuTier, GridBuffers, SimPipelines, SparseGrid, BRICK_EDGE, BRICK_VOXELS,
    SPARSE_BRICK_GRID_DIM, SPARSE_MAX_BRICKS,
};
use crate::grid::grid_index;
use crate::params::SimParams;
use crate::stats::{SimStats, STATS_WORDS};
use crate::voxel::{Voxel, VOXEL_WORDS};

/// Threads per workgroup axis; every grid edge is a multiple of this.
pub const WORKGROUP_EDGE: u32 = 4;

/// Ticks between stats readbacks.
const STATS_READBACK_CADENCE: u32 = 10;

const VOXEL_BYTES: u64 = VOXEL_WORDS as u64 * 4;

/// A readback is either idle or waiting on its async map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadbackState {
    Idle,
    InFlight,
}

/// A picked voxel, returned to the UI with its grid position.
#[derive(Debug, Clone)]
pub struct VoxelSnapshot {
    pub position: UVec3,
    pub voxel: Voxel,
}

/// Bind groups for one parity of the double buffer. Both parities are built
/// once at startup; a tick just selects by flag.
struct TickBindGroups {
    apply_commands: wgpu::BindGroup,
    temperature_diffusion: wgpu::BindGroup,
    intent_declaration: wgpu::BindGroup,
    resolve_execute: wgpu::BindGroup,
    stats_reduction: wgpu::BindGroup,
}

pub struct Engine {
    buffers: GridBuffers,
    pipelines: SimPipelines,
    sparse: Option<SparseGrid>,
    params: SimParams,
    tick_count: u32,
    groups_read_a: TickBindGroups,
    groups_read_b: TickBindGroups,

    stats_state: ReadbackState,
    stats_ready: Arc<AtomicBool>,
    stats_tick_counter: u32,
    latest_stats: Option<SimStats>,

    pick_request: Option<UVec3>,
    pick_coords: Option<UVec3>,
    pick_state: ReadbackState,
    pick_ready: Arc<AtomicBool>,
    latest_pick: Option<VoxelSnapshot>,
}

impl Engine {
    /// Dense engine on an explicit grid. Grid edges must be multiples of the
    /// workgroup edge; all tier sizes and the test grids are.
    pub fn try_new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        grid_size: u32,
    ) -> Result<Self, EngineError> {
        assert_eq!(grid_size % WORKGROUP_EDGE, 0, "grid must align to workgroups");
        let cells = (grid_size as u64).pow(3);
        GridBuffers::validate_limits(grid_size, cells, &device.limits())?;

        let buffers = GridBuffers::new(device, grid_size, cells);
        let pipelines = SimPipelines::new(device, false);
        let params = SimParams {
            grid_size: grid_size as f32,
            ..Default::default()
        };
        Ok(Self::assemble(device, queue, buffers, pipelines, None, params))
    }

    /// Sparse 256³ engine.
    pub fn try_new_sparse(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Self, EngineError> {
        let grid_size = GpuTier::Sparse256.grid_size();
        let cells = (SPARSE_MAX_BRICKS * BRICK_VOXELS) as u64;
        GridBuffers::validate_limits(grid_size, cells, &device.limits())?;

        let buffers = GridBuffers::new(device, grid_size, cells);
        let pipelines = SimPipelines::new(device, true);
        let mut sparse = SparseGrid::new(device, SPARSE_BRICK_GRID_DIM, SPARSE_MAX_BRICKS);
        sparse.upload_if_dirty(queue);
        let params = SimParams {
            grid_size: grid_size as f32,
            sparse_mode: 1.0,
            brick_grid_dim: SPARSE_BRICK_GRID_DIM as f32,
            max_bricks: SPARSE_MAX_BRICKS as f32,
            ..Default::default()
        };
        Ok(Self::assemble(device, queue, buffers, pipelines, Some(sparse), params))
    }

    /// Tier-detected engine with step-down fallback. The only terminal
    /// failure is a device that cannot hold the 64³ floor.
    pub fn auto(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        adapter_info: &wgpu::AdapterInfo,
        limits: &wgpu::Limits,
    ) -> Result<Self, EngineError> {
        let mut tier = Some(detect_tier(adapter_info.device_type, limits));
        while let Some(t) = tier {
            let attempt = if t.is_sparse() {
                Self::try_new_sparse(device, queue)
            } else {
                Self::try_new(device, queue, t.grid_size())
            };
            match attempt {
                Ok(engine) => {
                    log::info!("simulation tier {:?}: {}\u{00b3} grid", t, t.grid_size());
                    return Ok(engine);
                }
                Err(e) => {
                    log::warn!("tier {:?} unavailable ({e}); stepping down", t);
                    tier = t.next_lower();
                }
            }
        }
        Err(EngineError::Unsupported)
    }

    fn assemble(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffers: GridBuffers,
        pipelines: SimPipelines,
        sparse: Option<SparseGrid>,
        params: SimParams,
    ) -> Self {
        buffers.init_temperatures(queue, params.base_ambient_temp);
        queue.write_buffer(buffers.params(), 0, &params.to_bytes());

        let table = sparse.as_ref().map(|s| s.table_buffer());
        let groups_read_a = build_bind_groups(device, &pipelines, &buffers, table, true);
        let groups_read_b = build_bind_groups(device, &pipelines, &buffers, table, false);

        Self {
            buffers,
            pipelines,
            sparse,
            params,
            tick_count: 0,
            groups_read_a,
            groups_read_b,
            stats_state: ReadbackState::Idle,
            stats_ready: Arc::new(AtomicBool::new(false)),
            stats_tick_counter: 0,
            latest_stats: None,
            pick_request: None,
            pick_coords: None,
            pick_state: ReadbackState::Idle,
            pick_ready: Arc::new(AtomicBool::new(false)),
            latest_pick: None,
        }
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, commands: &[Command]) {
        if let Some(sparse) = self.sparse.as_mut() {
            let gs = self.buffers.grid_size();
            for cmd in commands {
                if cmd.command_type == CommandType::PlaceVoxel as u32
                    || cmd.command_type == CommandType::SeedProtocells as u32
                {
                    allocate_brush_bricks(sparse, cmd, gs);
                }
            }
            sparse.grow_borders();
            sparse.upload_if_dirty(queue);
        }
        self.scrub_fresh_bricks(queue);

        queue.write_buffer(self.buffers.command(), 0, &encode_command_buffer(commands));
        self.params.tick_count = self.tick_count as f32;
        queue.write_buffer(self.buffers.params(), 0, &self.params.to_bytes());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tick encoder"),
        });
        encoder.clear_buffer(self.buffers.intent(), 0, None);
        encoder.clear_buffer(self.buffers.stats(), 0, None);

        let groups = if self.buffers.read_is_a() {
            &self.groups_read_a
        } else {
            &self.groups_read_b
        };
        let wg = self.buffers.grid_size() / WORKGROUP_EDGE;

        let passes: [(&str, &wgpu::ComputePipeline, &wgpu::BindGroup); 5] = [
            (
                "apply commands",
                &self.pipelines.apply_commands.pipeline,
                &groups.apply_commands,
            ),
            (
                "temperature diffusion",
                &self.pipelines.temperature_diffusion.pipeline,
                &groups.temperature_diffusion,
            ),
            (
                "intent declaration",
                &self.pipelines.intent_declaration.pipeline,
                &groups.intent_declaration,
            ),
            (
                "resolve execute",
                &self.pipelines.resolve_execute.pipeline,
                &groups.resolve_execute,
            ),
            (
                "stats reduction",
                &self.pipelines.stats_reduction.pipeline,
                &groups.stats_reduction,
            ),
        ];
        for (label, pipeline, group) in passes {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, group, &[]);
            pass.dispatch_workgroups(wg, wg, wg);
        }

        self.stats_tick_counter += 1;
        let kick_stats = self.stats_state == ReadbackState::Idle
            && self.stats_tick_counter >= STATS_READBACK_CADENCE;
        if kick_stats {
            encoder.copy_buffer_to_buffer(
                self.buffers.stats(),
                0,
                self.buffers.stats_staging(),
                0,
                (STATS_WORDS * 4) as u64,
            );
        }

        let mut kick_pick = false;
        if self.pick_state == ReadbackState::Idle {
            if let Some(pos) = self.pick_request.take() {
                match self.cell_slot(pos) {
                    Some(slot) => {
                        encoder.copy_buffer_to_buffer(
                            self.buffers.voxel_write(),
                            slot as u64 * VOXEL_BYTES,
                            self.buffers.pick_staging(),
                            0,
                            VOXEL_BYTES,
                        );
                        self.pick_coords = Some(pos);
                        kick_pick = true;
                    }
                    None => {
                        // Unallocated brick: nothing there by definition.
                        self.latest_pick = Some(VoxelSnapshot {
                            position: pos,
                            voxel: Voxel::default(),
                        });
                    }
                }
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        self.buffers.swap();
        self.tick_count += 1;

        if kick_stats {
            self.stats_tick_counter = 0;
            self.stats_ready.store(false, Ordering::SeqCst);
            let flag = Arc::clone(&self.stats_ready);
            self.buffers
                .stats_staging()
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    if result.is_ok() {
                        flag.store(true, Ordering::SeqCst);
                    }
                });
            self.stats_state = ReadbackState::InFlight;
        }
        if kick_pick {
            self.pick_ready.store(false, Ordering::SeqCst);
            let flag = Arc::clone(&self.pick_ready);
            self.buffers
                .pick_staging()
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    if result.is_ok() {
                        flag.store(true, Ordering::SeqCst);
                    }
                });
            self.pick_state = ReadbackState::InFlight;
        }
    }

    /// Drive the async map callbacks without blocking. Call once per frame.
    pub fn poll_readbacks(&mut self, device: &wgpu::Device) {
        device.poll(wgpu::Maintain::Poll);

        if self.stats_state == ReadbackState::InFlight && self.stats_ready.load(Ordering::SeqCst) {
            let staging = self.buffers.stats_staging();
            let mut words = [0u32; STATS_WORDS];
            {
                let data = staging.slice(..).get_mapped_range();
                words.copy_from_slice(bytemuck::cast_slice(&data));
            }
            staging.unmap();
            self.latest_stats = Some(SimStats::from_words(&words));
            self.stats_state = ReadbackState::Idle;
        }

        if self.pick_state == ReadbackState::InFlight && self.pick_ready.load(Ordering::SeqCst) {
            let staging = self.buffers.pick_staging();
            let mut words = [0u32; VOXEL_WORDS];
            {
                let data = staging.slice(..).get_mapped_range();
                words.copy_from_slice(bytemuck::cast_slice(&data));
            }
            staging.unmap();
            if let Some(position) = self.pick_coords.take() {
                self.latest_pick = Some(VoxelSnapshot {
                    position,
                    voxel: Voxel::unpack(words),
                });
            }
            self.pick_state = ReadbackState::Idle;
        }
    }

    /// The most recent stats snapshot, if a readback completed since the
    /// last take. Typically 1–2 frames stale.
    pub fn try_take_stats(&mut self) -> Option<SimStats> {
        self.latest_stats.take()
    }

    /// Ask for the voxel at a grid position. The copy rides the next tick's
    /// submission; the result appears via [`Engine::take_pick_result`].
    pub fn request_pick(&mut self, x: u32, y: u32, z: u32) {
        let gs = self.buffers.grid_size();
        if x < gs && y < gs && z < gs {
            self.pick_request = Some(UVec3::new(x, y, z));
        }
    }

    pub fn take_pick_result(&mut self) -> Option<VoxelSnapshot> {
        self.latest_pick.take()
    }

    /// Live-tune a parameter. Out-of-range values clamp; unknown names warn
    /// and return false.
    pub fn set_param(&mut self, name: &str, value: f32) -> bool {
        let known = self.params.set(name, value);
        if !known {
            log::warn!("ignoring unknown parameter {name:?}");
        }
        known
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn grid_size(&self) -> u32 {
        self.buffers.grid_size()
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse.is_some()
    }

    /// The voxel buffer most recently written, for the renderer.
    pub fn current_read_voxels(&self) -> &wgpu::Buffer {
        self.buffers.voxel_read()
    }

    /// The temperature buffer most recently written, for the renderer.
    pub fn current_read_temperatures(&self) -> &wgpu::Buffer {
        self.buffers.temp_read()
    }

    /// The 3D material texture the renderer fills and samples.
    pub fn render_texture(&self) -> &wgpu::Texture {
        self.buffers.render_texture()
    }

    // ---- Grid seeding and inspection --------------------------------------

    /// Write one voxel into the current read buffer, visible to the next
    /// tick. In sparse mode the containing brick is allocated on demand.
    pub fn write_voxel(&mut self, queue: &wgpu::Queue, pos: UVec3, voxel: &Voxel) {
        let slot = match self.sparse.as_mut() {
            Some(sparse) => {
                let allocated = sparse.ensure_brick_for_voxel(pos.x, pos.y, pos.z);
                sparse.upload_if_dirty(queue);
                allocated.and_then(|_| sparse.voxel_pool_index(pos.x, pos.y, pos.z))
            }
            None => Some(grid_index(pos.x, pos.y, pos.z, self.buffers.grid_size()) as u32),
        };
        self.scrub_fresh_bricks(queue);
        let Some(slot) = slot else {
            log::warn!("voxel write at {pos:?} dropped: brick pool exhausted");
            return;
        };
        queue.write_buffer(
            self.buffers.voxel_read(),
            slot as u64 * VOXEL_BYTES,
            bytemuck::cast_slice(&voxel.pack()),
        );
    }

    /// Scrub the backing store of freshly allocated pool slots. A recycled
    /// slot still holds the words of whatever brick owned it last; without
    /// this, deallocated matter would resurrect under a new mapping.
    fn scrub_fresh_bricks(&mut self, queue: &wgpu::Queue) {
        let fresh = match self.sparse.as_mut() {
            Some(sparse) => sparse.take_fresh_slots(),
            None => return,
        };
        if fresh.is_empty() {
            return;
        }
        let brick_cells = BRICK_VOXELS as usize;
        let voxel_zeroes = vec![0u8; brick_cells * VOXEL_WORDS * 4];
        let intent_zeroes = vec![0u8; brick_cells * 4];
        let temp_fill = vec![self.params.base_ambient_temp.clamp(0.0, 1.0); brick_cells];
        let temp_bytes: &[u8] = bytemuck::cast_slice(&temp_fill);

        let (voxel_read, voxel_write, temp_read, temp_write) =
            self.buffers.parity_set(self.buffers.read_is_a());
        for slot in fresh {
            let voxel_base = slot as u64 * BRICK_VOXELS as u64 * VOXEL_BYTES;
            let scalar_base = slot as u64 * BRICK_VOXELS as u64 * 4;
            queue.write_buffer(voxel_read, voxel_base, &voxel_zeroes);
            queue.write_buffer(voxel_write, voxel_base, &voxel_zeroes);
            queue.write_buffer(temp_read, scalar_base, temp_bytes);
            queue.write_buffer(temp_write, scalar_base, temp_bytes);
            queue.write_buffer(self.buffers.intent(), scalar_base, &intent_zeroes);
        }
    }

    /// Replace the whole current-read temperature field. `temps` must cover
    /// every backing cell.
    pub fn upload_temperatures(&self, queue: &wgpu::Queue, temps: &[f32]) {
        assert_eq!(temps.len() as u64, self.buffers.cell_count());
        queue.write_buffer(self.buffers.temp_read(), 0, bytemuck::cast_slice(temps));
    }

    /// Blocking copy of the current read voxel buffer, for tests and tools.
    pub fn read_voxels_blocking(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Vec<u32> {
        read_buffer_blocking(device, queue, self.buffers.voxel_read())
    }

    /// Blocking copy of the current read temperature field.
    pub fn read_temperatures_blocking(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Vec<f32> {
        let raw = read_buffer_blocking(device, queue, self.buffers.temp_read());
        bytemuck::cast_slice(&raw).to_vec()
    }

    fn cell_slot(&self, pos: UVec3) -> Option<u32> {
        match &self.sparse {
            Some(sparse) => sparse.voxel_pool_index(pos.x, pos.y, pos.z),
            None => Some(grid_index(pos.x, pos.y, pos.z, self.buffers.grid_size()) as u32),
        }
    }
}

/// Allocate every brick the command's Chebyshev brush can touch.
fn allocate_brush_bricks(sparse: &mut SparseGrid, cmd: &Command, grid_size: u32) {
    let c = cmd.center();
    let r = cmd.radius;
    let lo = UVec3::new(c.x.saturating_sub(r), c.y.saturating_sub(r), c.z.saturating_sub(r));
    let hi = UVec3::new(
        (c.x + r).min(grid_size - 1),
        (c.y + r).min(grid_size - 1),
        (c.z + r).min(grid_size - 1),
    );
    for bz in lo.z / BRICK_EDGE..=hi.z / BRICK_EDGE {
        for by in lo.y / BRICK_EDGE..=hi.y / BRICK_EDGE {
            for bx in lo.x / BRICK_EDGE..=hi.x / BRICK_EDGE {
                if sparse.allocate_brick(bx, by, bz).is_none() {
                    log::warn!("brick pool exhausted at ({bx},{by},{bz})");
                    return;
                }
            }
        }
    }
}

fn build_bind_groups(
    device: &wgpu::Device,
    pipelines: &SimPipelines,
    buffers: &GridBuffers,
    brick_table: Option<&wgpu::Buffer>,
    read_is_a: bool,
) -> TickBindGroups {
    let (voxel_read, voxel_write, temp_read, temp_write) = buffers.parity_set(read_is_a);

    let make = |label: &str, layout: &wgpu::BindGroupLayout, bindings: &[(u32, &wgpu::Buffer)]| {
        let mut entries: Vec<wgpu::BindGroupEntry> = bindings
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        if let Some(table) = brick_table {
            entries.push(wgpu::BindGroupEntry {
                binding: 10,
                resource: table.as_entire_binding(),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    };

    TickBindGroups {
        // Commands mutate the read buffer in place before anything reads it.
        apply_commands: make(
            "apply commands",
            &pipelines.apply_commands.layout,
            &[
                (0, voxel_read),
                (1, buffers.command()),
                (2, buffers.params()),
            ],
        ),
        temperature_diffusion: make(
            "temperature diffusion",
            &pipelines.temperature_diffusion.layout,
            &[
                (0, temp_read),
                (1, temp_write),
                (2, voxel_read),
                (3, buffers.params()),
            ],
        ),
        // Intent and resolve read the temperature written earlier this tick.
        intent_declaration: make(
            "intent declaration",
            &pipelines.intent_declaration.layout,
            &[
                (0, voxel_read),
                (1, buffers.intent()),
                (2, buffers.params()),
                (3, temp_write),
            ],
        ),
        resolve_execute: make(
            "resolve execute",
            &pipelines.resolve_execute.layout,
            &[
                (0, voxel_read),
                (1, voxel_write),
                (2, buffers.params()),
                (3, buffers.intent()),
                (4, temp_write),
            ],
        ),
        // Stats read the freshly written buffer.
        stats_reduction: make(
            "stats reduction",
            &pipelines.stats_reduction.layout,
            &[
                (0, voxel_write),
                (1, buffers.stats()),
                (2, buffers.params()),
            ],
        ),
    }
}

/// Copy a buffer to a fresh staging buffer and map it synchronously.
fn read_buffer_blocking(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
) -> Vec<u32> {
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: source.size(),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_buffer_to_buffer(source, 0, &staging, 0, source.size());
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .expect("map callback dropped")
        .expect("failed to map readback buffer");

    let data = slice.get_mapped_range();
    let out = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();
    out
}
