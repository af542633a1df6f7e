//! GPU device bring-up and capability tiers.
//!
//! The engine is headless: it owns a device and queue but no surface. The
//! renderer and any windowing live with the embedding shell and only borrow
//! buffer handles.

mod buffers;
mod pipelines;
mod sparse;

pub use buffers::GridBuffers;
pub use pipelines::{kernel_sources, Kernel, SimPipelines, KERNEL_COUNT};
pub use sparse::{SparseGrid, BRICK_EDGE, BRICK_VOXELS, SPARSE_BRICK_GRID_DIM, SPARSE_MAX_BRICKS};

use crate::error::EngineError;

/// Capability tier, selected from queried device limits at startup.
/// Allocation failure at one tier retries the next lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuTier {
    /// 256³ brick-sparse grid on a discrete GPU with a large buffer budget.
    Sparse256,
    /// 128³ dense.
    High,
    /// 96³ dense.
    Medium,
    /// 64³ dense, the integrated-GPU floor.
    Low,
}

impl GpuTier {
    pub fn grid_size(self) -> u32 {
        match self {
            GpuTier::Sparse256 => 256,
            GpuTier::High => 128,
            GpuTier::Medium => 96,
            GpuTier::Low => 64,
        }
    }

    pub fn is_sparse(self) -> bool {
        matches!(self, GpuTier::Sparse256)
    }

    /// The fallback tier tried when this one cannot allocate.
    pub fn next_lower(self) -> Option<GpuTier> {
        match self {
            GpuTier::Sparse256 => Some(GpuTier::High),
            GpuTier::High => Some(GpuTier::Medium),
            GpuTier::Medium => Some(GpuTier::Low),
            GpuTier::Low => None,
        }
    }
}

/// Pick a starting tier from the adapter's character and buffer budget.
pub fn detect_tier(device_type: wgpu::DeviceType, limits: &wgpu::Limits) -> GpuTier {
    if device_type == wgpu::DeviceType::IntegratedGpu {
        return GpuTier::Low;
    }
    let budget = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64);
    if budget >= 256 * 1024 * 1024 {
        GpuTier::Sparse256
    } else if budget >= buffers::voxel_buffer_bytes(128 * 128 * 128) {
        GpuTier::High
    } else if budget >= buffers::voxel_buffer_bytes(96 * 96 * 96) {
        GpuTier::Medium
    } else {
        GpuTier::Low
    }
}

/// Headless device, queue, and the adapter facts tier selection needs.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub limits: wgpu::Limits,
}

impl GpuContext {
    /// Bring up a headless device on the best available adapter.
    pub async fn new() -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(EngineError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        log::info!(
            "GPU adapter: {} ({:?}), backend {:?}, max buffer {} MB",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend,
            limits.max_buffer_size / (1024 * 1024),
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("voxlife device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        Ok(Self {
            device,
            queue,
            adapter_info,
            limits,
        })
    }

    /// Blocking wrapper for synchronous hosts and tests.
    pub fn new_blocking() -> Result<Self, EngineError> {
        pollster::block_on(Self::new())
    }
}
