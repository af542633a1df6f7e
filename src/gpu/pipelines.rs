//! Compute pipeline construction.
//!
//! Each kernel is compiled from three concatenated WGSL layers: the shared
//! definitions, an addressing layer (dense linear or sparse brick-table),
//! and the kernel body. The binding lists here are the kernels' public
//! contract; sparse variants add the brick table at binding 10.

const COMMON_WGSL: &str = include_str!("../shaders/common.wgsl");
const DENSE_COMMON_WGSL: &str = include_str!("../shaders/dense_common.wgsl");
const BRICK_COMMON_WGSL: &str = include_str!("../shaders/brick_common.wgsl");
const APPLY_COMMANDS_WGSL: &str = include_str!("../shaders/apply_commands.wgsl");
const TEMPERATURE_DIFFUSION_WGSL: &str = include_str!("../shaders/temperature_diffusion.wgsl");
const INTENT_DECLARATION_WGSL: &str = include_str!("../shaders/intent_declaration.wgsl");
const RESOLVE_EXECUTE_WGSL: &str = include_str!("../shaders/resolve_execute.wgsl");
const STATS_REDUCTION_WGSL: &str = include_str!("../shaders/stats_reduction.wgsl");

pub const KERNEL_COUNT: usize = 5;

/// Brick table binding index in sparse variants.
const BRICK_TABLE_BINDING: u32 = 10;

#[derive(Clone, Copy)]
enum Binding {
    ReadStorage,
    RwStorage,
    Uniform,
}

struct KernelDesc {
    name: &'static str,
    entry: &'static str,
    source: &'static str,
    bindings: &'static [Binding],
}

const KERNELS: [KernelDesc; KERNEL_COUNT] = [
    KernelDesc {
        name: "apply_commands",
        entry: "apply_commands_main",
        source: APPLY_COMMANDS_WGSL,
        // voxels (in place), commands, params
        bindings: &[Binding::RwStorage, Binding::ReadStorage, Binding::Uniform],
    },
    KernelDesc {
        name: "temperature_diffusion",
        entry: "temperature_diffusion_main",
        source: TEMPERATURE_DIFFUSION_WGSL,
        // temp read, temp write, voxels, params
        bindings: &[
            Binding::ReadStorage,
            Binding::RwStorage,
            Binding::ReadStorage,
            Binding::Uniform,
        ],
    },
    KernelDesc {
        name: "intent_declaration",
        entry: "intent_declaration_main",
        source: INTENT_DECLARATION_WGSL,
        // voxels, intents, params, temps
        bindings: &[
            Binding::ReadStorage,
            Binding::RwStorage,
            Binding::Uniform,
            Binding::ReadStorage,
        ],
    },
    KernelDesc {
        name: "resolve_execute",
        entry: "resolve_execute_main",
        source: RESOLVE_EXECUTE_WGSL,
        // voxels in, voxels out, params, intents, temps
        bindings: &[
            Binding::ReadStorage,
            Binding::RwStorage,
            Binding::Uniform,
            Binding::ReadStorage,
            Binding::ReadStorage,
        ],
    },
    KernelDesc {
        name: "stats_reduction",
        entry: "stats_reduction_main",
        source: STATS_REDUCTION_WGSL,
        // voxels, stats, params
        bindings: &[Binding::ReadStorage, Binding::RwStorage, Binding::Uniform],
    },
];

/// The composed WGSL for every kernel, exactly as compiled. Exposed so
/// validation tests cover the same text the driver sees.
pub fn kernel_sources(sparse: bool) -> Vec<(&'static str, String)> {
    let addressing = if sparse {
        BRICK_COMMON_WGSL
    } else {
        DENSE_COMMON_WGSL
    };
    KERNELS
        .iter()
        .map(|k| (k.name, format!("{COMMON_WGSL}\n{addressing}\n{}", k.source)))
        .collect()
}

/// One compiled kernel and the layout its bind groups must match.
pub struct Kernel {
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

/// The five simulation kernels for one addressing mode.
pub struct SimPipelines {
    pub apply_commands: Kernel,
    pub temperature_diffusion: Kernel,
    pub intent_declaration: Kernel,
    pub resolve_execute: Kernel,
    pub stats_reduction: Kernel,
    sparse: bool,
}

impl SimPipelines {
    pub fn new(device: &wgpu::Device, sparse: bool) -> Self {
        let sources = kernel_sources(sparse);
        // Field order matches the KERNELS table.
        let build = |i: usize| build_kernel(device, &KERNELS[i], &sources[i].1, sparse);
        Self {
            apply_commands: build(0),
            temperature_diffusion: build(1),
            intent_declaration: build(2),
            resolve_execute: build(3),
            stats_reduction: build(4),
            sparse,
        }
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }
}

fn build_kernel(
    device: &wgpu::Device,
    desc: &KernelDesc,
    source: &str,
    sparse: bool,
) -> Kernel {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = desc
        .bindings
        .iter()
        .enumerate()
        .map(|(i, binding)| layout_entry(i as u32, *binding))
        .collect();
    if sparse {
        entries.push(layout_entry(BRICK_TABLE_BINDING, Binding::ReadStorage));
    }

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(desc.name),
        entries: &entries,
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(desc.name),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(desc.name),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some(desc.entry),
        compilation_options: Default::default(),
        cache: None,
    });

    Kernel { pipeline, layout }
}

fn layout_entry(binding: u32, kind: Binding) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        Binding::ReadStorage => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        Binding::RwStorage => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        Binding::Uniform => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kernels_present_in_both_modes() {
        for sparse in [false, true] {
            let sources = kernel_sources(sparse);
            assert_eq!(sources.len(), KERNEL_COUNT);
            let names: Vec<_> = sources.iter().map(|(n, _)| *n).collect();
            assert_eq!(
                names,
                [
                    "apply_commands",
                    "temperature_diffusion",
                    "intent_declaration",
                    "resolve_execute",
                    "stats_reduction"
                ]
            );
        }
    }

    #[test]
    fn test_sparse_sources_carry_brick_table() {
        for (name, source) in kernel_sources(true) {
            assert!(source.contains("brick_table"), "{name} lacks brick table");
        }
        for (name, source) in kernel_sources(false) {
            assert!(!source.contains("brick_table"), "{name} has brick table in dense mode");
        }
    }

    #[test]
    fn test_each_source_has_exactly_one_entry_point() {
        for (name, source) in kernel_sources(false) {
            let entries = source.matches("@compute").count();
            assert_eq!(entries, 1, "{name} has {entries} entry points");
        }
    }
}
