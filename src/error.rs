//! Error types for engine initialization.
//!
//! Initialization is the only fallible phase: once the buffers exist and the
//! pipelines compile, every kernel is a total function and ticks cannot
//! fail. All variants here are terminal for the tier that produced them;
//! the auto-init path catches [`EngineError::Allocation`] and retries one
//! tier down.

use std::fmt;

/// Errors that can occur while bringing up the engine.
#[derive(Debug)]
pub enum EngineError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create the GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The requested grid does not fit the device's buffer limits.
    Allocation {
        grid_size: u32,
        required_bytes: u64,
        limit_bytes: u64,
    },
    /// Every capability tier was tried and none fit the device.
    Unsupported,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoAdapter => write!(
                f,
                "No compatible GPU adapter found. A GPU with WebGPU/Vulkan/Metal/DX12 support is required."
            ),
            EngineError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            EngineError::Allocation {
                grid_size,
                required_bytes,
                limit_bytes,
            } => write!(
                f,
                "Grid {grid_size}\u{00b3} needs {required_bytes} bytes per buffer but the device allows {limit_bytes}"
            ),
            EngineError::Unsupported => write!(
                f,
                "GPU cannot hold even the smallest simulation grid. The simulation cannot run on this hardware."
            ),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for EngineError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        EngineError::DeviceCreation(e)
    }
}
