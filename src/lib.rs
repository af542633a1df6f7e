//! # voxlife
//!
//! A GPU-resident 3D cellular-automaton ecosystem. Voxels on a dense 128³
//! (or 64³/96³/256³-sparse) grid hold walls, nutrients, energy and
//! temperature sources, or *protocells*: single-celled agents whose 16-byte
//! genomes govern metabolism, movement, replication, predation, and
//! mutation. A per-voxel temperature field diffuses alongside them and
//! modulates their behavior. Everything advances on the GPU; the host only
//! schedules ticks, feeds player commands, and reads statistics back
//! asynchronously.
//!
//! ## Quick start
//!
//! ```ignore
//! use voxlife::prelude::*;
//!
//! let gpu = GpuContext::new_blocking()?;
//! let mut engine = Engine::auto(&gpu.device, &gpu.queue, &gpu.adapter_info, &gpu.limits)?;
//!
//! // Seed a scenario, then run.
//! let seed = Preset::PetriDish.commands(engine.grid_size());
//! engine.tick(&gpu.device, &gpu.queue, &seed);
//! loop {
//!     engine.tick(&gpu.device, &gpu.queue, &[]);
//!     engine.poll_readbacks(&gpu.device);
//!     if let Some(stats) = engine.try_take_stats() {
//!         println!("population {}", stats.population);
//!     }
//! }
//! ```
//!
//! ## How a tick works
//!
//! Each tick is five compute dispatches in one submission: command
//! application, temperature diffusion, intent declaration, resolve/execute,
//! and stats reduction. Cells first *declare* what they want (one packed
//! intent word each), then a second pass settles every conflict by
//! deterministic bid comparison, with each thread writing exactly one output
//! cell. No atomics touch the simulation state; double-buffer parity
//! isolates ticks from each other.
//!
//! Determinism is bit-exact: PRNG streams are reseeded per cell, per tick,
//! per dispatch from a splittable hash, so two runs from the same state
//! produce identical buffers regardless of GPU scheduling.
//!
//! ## What lives where
//!
//! - [`voxel`], [`genome`], [`intent`], [`params`], [`command`]: the packed
//!   binary formats shared bit-for-bit with the WGSL kernels.
//! - [`rng`]: the PCG hash and stream-seeding rule.
//! - [`gpu`]: device bring-up, capability tiers, the buffer fabric, pipeline
//!   construction, and the sparse brick table.
//! - [`engine`]: the tick scheduler, readback state machines, and picking.
//! - [`presets`]: ready-made scenarios expressed as command bursts.

pub mod command;
pub mod engine;
pub mod error;
pub mod genome;
pub mod gpu;
pub mod grid;
pub mod intent;
pub mod params;
pub mod presets;
pub mod rng;
pub mod stats;
pub mod tick;
pub mod voxel;

pub use command::{Command, CommandType, MAX_COMMANDS};
pub use engine::{Engine, VoxelSnapshot};
pub use error::EngineError;
pub use genome::Genome;
pub use gpu::{GpuContext, GpuTier};
pub use intent::{Action, Direction, Intent};
pub use params::SimParams;
pub use presets::Preset;
pub use stats::SimStats;
pub use tick::TickTimer;
pub use voxel::{Voxel, VoxelType};

/// The commonly-used surface in one import.
pub mod prelude {
    pub use crate::command::{Command, CommandType};
    pub use crate::engine::{Engine, VoxelSnapshot};
    pub use crate::error::EngineError;
    pub use crate::genome::Genome;
    pub use crate::gpu::{GpuContext, GpuTier};
    pub use crate::intent::{Action, Direction, Intent};
    pub use crate::params::SimParams;
    pub use crate::presets::Preset;
    pub use crate::stats::SimStats;
    pub use crate::tick::TickTimer;
    pub use crate::voxel::{Voxel, VoxelType};
}
