//! GPU-accelerated matrix operations using WGPU.
//!
//! This module implements the engine kernels as WGSL compute shaders:
//!
//! - `elementwise.wgsl` — every elementwise kernel plus transpose, selected by
//!   an op code that follows [`ElementwiseOp`]
//! - `matmul.wgsl` — naive product, one invocation per output element
//! - `matmul_tiled.wgsl` — workgroup-tiled product staging operand blocks in
//!   workgroup memory between two `workgroupBarrier()`s per step
//!
//! The device, queue and pipelines are created once, lazily, via
//! `lazy_static`. Every call uploads its operands, dispatches, and then blocks
//! on `device.poll(Wait)` and the read-back mapping before copying the result
//! into the caller's matrix, so results are coherent on return.
//!
//! Kernels compute in `f32`; `f64` operands are narrowed on upload and widened
//! on read-back.

use super::{ElementwiseOp, TILE_SIZE};
use crate::error::{Error, Result};
use crate::matrix::{Extent, Matrix};
use crate::real::Real;
use std::sync::mpsc;
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

const ELEMENTWISE: &str = include_str!("shaders/elementwise.wgsl");
const MATMUL: &str = include_str!("shaders/matmul.wgsl");
const MATMUL_TILED: &str = include_str!("shaders/matmul_tiled.wgsl");

/// Edge of every shader's `@workgroup_size(8, 8, 1)`.
#[allow(clippy::cast_possible_truncation)]
const WORKGROUP_EDGE: u32 = TILE_SIZE as u32;

/// Basic wrapper for GPU initialisation errors.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// An error in requesting the adapter.
    #[error("adapter error: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// An error in requesting the GPU (device).
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// A shader failed validation or pipeline creation.
    #[error("shader `{label}` rejected: {reason}")]
    Shader {
        /// Shader label.
        label: &'static str,
        /// Validation message.
        reason: String,
    },
}

/// Holds the WGPU device, queue and the compiled pipelines.
///
/// Initialized once globally and reused for all operations via `lazy_static`.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// The queue every kernel is submitted to.
    pub queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    elementwise: wgpu::ComputePipeline,
    matmul: wgpu::ComputePipeline,
    matmul_tiled: wgpu::ComputePipeline,
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuContext {
    /// Selects the default adapter, creates a device + queue and compiles
    /// every pipeline.
    ///
    /// # Errors
    /// [`GpuError`] if no adapter or device is available, or a shader fails
    /// validation.
    pub fn new() -> core::result::Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("nnet"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;
        debug!(adapter = ?adapter.get_info().name, "gpu context created");

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("nnet_bgl"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer_entry(3, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("nnet_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let build = |label: &'static str, source: &str| {
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            match pollster::block_on(device.pop_error_scope()) {
                Some(err) => Err(GpuError::Shader {
                    label,
                    reason: err.to_string(),
                }),
                None => Ok(pipeline),
            }
        };

        let elementwise = build("elementwise", ELEMENTWISE)?;
        let matmul = build("matmul", MATMUL)?;
        let matmul_tiled = build("matmul_tiled", MATMUL_TILED)?;

        Ok(Self {
            device,
            queue,
            layout,
            elementwise,
            matmul,
            matmul_tiled,
        })
    }
}

lazy_static::lazy_static! {
    static ref GPU_CONTEXT: core::result::Result<GpuContext, String> =
        GpuContext::new().map_err(|e| e.to_string());
}

fn context(op: &'static str, extent: Extent) -> Result<&'static GpuContext> {
    GPU_CONTEXT.as_ref().map_err(|reason| Error::Resource {
        op,
        extent,
        reason: reason.clone(),
    })
}

/// Whether a GPU context could be created on this machine.
pub fn is_available() -> bool {
    GPU_CONTEXT.is_ok()
}

/// The 32-byte `Params` uniform shared by every shader.
fn params_bytes(rows: u32, cols: u32, inner: u32, code: u32, scalar: f32) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let words = [rows, cols, inner, code, scalar.to_bits(), 0, 0, 0];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    bytes
}

fn storage_buffer(device: &wgpu::Device, label: &str, data: &[f32]) -> wgpu::Buffer {
    let mut bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    if bytes.is_empty() {
        // zero-sized bindings are invalid
        bytes.extend_from_slice(&[0; 4]);
    }
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: &bytes,
        usage: wgpu::BufferUsages::STORAGE,
    })
}

/// One kernel launch over an output of `extent`.
struct Launch<'a> {
    op: &'static str,
    pipeline: &'a wgpu::ComputePipeline,
    extent: Extent,
    inner: usize,
    code: u32,
    scalar: f32,
    lhs: &'a [f32],
    rhs: &'a [f32],
}

fn run(ctx: &GpuContext, launch: &Launch<'_>) -> Result<Vec<f32>> {
    let Launch { op, extent, .. } = *launch;
    let resource = |reason: String| Error::Resource { op, extent, reason };
    let to_u32 = |v: usize, what: &str| {
        u32::try_from(v).map_err(|_| resource(format!("{what} {v} exceeds u32")))
    };

    let rows = to_u32(extent.rows, "row count")?;
    let cols = to_u32(extent.cols, "column count")?;
    let inner = to_u32(launch.inner, "inner dimension")?;
    let groups_x = cols.div_ceil(WORKGROUP_EDGE);
    let groups_y = rows.div_ceil(WORKGROUP_EDGE);
    let limit = ctx.device.limits().max_compute_workgroups_per_dimension;
    if groups_x > limit || groups_y > limit {
        return Err(resource(format!(
            "{groups_x}x{groups_y} workgroups exceed the device limit of {limit}"
        )));
    }
    trace!(op, groups_x, groups_y, "gpu launch");

    let device = &ctx.device;
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("params"),
        contents: &params_bytes(rows, cols, inner, launch.code, launch.scalar),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let lhs = storage_buffer(device, "lhs", launch.lhs);
    let rhs = storage_buffer(device, "rhs", launch.rhs);
    let out_size = (extent.len() * size_of::<f32>()) as u64;
    let out = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("out"),
        size: out_size,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("staging"),
        size: out_size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(op),
        layout: &ctx.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: lhs.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: rhs.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: out.as_entire_binding(),
            },
        ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(op),
    });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(op),
            timestamp_writes: None,
        });
        pass.set_pipeline(launch.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
    encoder.copy_buffer_to_buffer(&out, 0, &staging, 0, out_size);
    ctx.queue.submit(Some(encoder.finish()));

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    if let Some(err) = validation.or(out_of_memory) {
        return Err(resource(err.to_string()));
    }

    // fence: wait for the kernel and the copy, then map the staging buffer
    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |mapped| {
        let _ = tx.send(mapped);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| resource(e.to_string()))?;
    rx.recv()
        .map_err(|e| resource(e.to_string()))?
        .map_err(|e| resource(e.to_string()))?;

    let values = {
        let mapped = slice.get_mapped_range();
        mapped
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    };
    staging.unmap();
    Ok(values)
}

fn narrow<T: Real>(m: &Matrix<T>) -> Vec<f32> {
    m.as_slice().iter().map(|&v| v.into_f32()).collect()
}

fn widen<T: Real>(values: Vec<f32>, out: &mut Matrix<T>) {
    for (dst, v) in out.as_mut_slice().iter_mut().zip(values) {
        *dst = T::from_f32(v);
    }
}

/// Runs an elementwise kernel (or transpose) on the GPU.
///
/// # Errors
/// [`Error::DivisionByZero`] if a divisor narrows to `0.0f32`.
/// [`Error::Resource`] if the context, allocation, launch or read-back fails.
pub fn elementwise<T: Real>(
    op: ElementwiseOp,
    a: &Matrix<T>,
    b: Option<&Matrix<T>>,
    k: T,
    out: &mut Matrix<T>,
) -> Result<()> {
    let extent = out.extent();
    let scalar = k.into_f32();
    // a divisor that is non-zero in `T` may still narrow to zero
    if matches!(op, ElementwiseOp::ScalarDiv | ElementwiseOp::Normalize) && scalar == 0.0 {
        return Err(Error::DivisionByZero { op: op.name() });
    }
    let ctx = context(op.name(), extent)?;
    let lhs = narrow(a);
    let rhs = b.map(narrow).unwrap_or_default();

    let values = run(
        ctx,
        &Launch {
            op: op.name(),
            pipeline: &ctx.elementwise,
            extent,
            inner: 0,
            code: op as u32,
            scalar,
            lhs: &lhs,
            rhs: &rhs,
        },
    )?;
    widen(values, out);
    Ok(())
}

/// Runs the naive or tiled product on the GPU.
///
/// # Errors
/// [`Error::Resource`] if the context, allocation, launch or read-back fails.
pub fn matmul<T: Real>(
    op: &'static str,
    tiled: bool,
    a: &Matrix<T>,
    b: &Matrix<T>,
    out: &mut Matrix<T>,
) -> Result<()> {
    let extent = out.extent();
    let ctx = context(op, extent)?;
    let lhs = narrow(a);
    let rhs = narrow(b);

    let values = run(
        ctx,
        &Launch {
            op,
            pipeline: if tiled { &ctx.matmul_tiled } else { &ctx.matmul },
            extent,
            inner: a.cols(),
            code: 0,
            scalar: 0.0,
            lhs: &lhs,
            rhs: &rhs,
        },
    )?;
    widen(values, out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::matrices_within;
    use crate::ops::cpu;

    fn ramp(rows: usize, cols: usize) -> Matrix<f32> {
        let data = (0..rows * cols).map(|v| (v % 7) as f32 - 3.0).collect();
        Matrix::from_vec(rows, cols, data).unwrap()
    }

    #[test]
    fn tiled_kernel_matches_cpu_on_ragged_extents() {
        if !is_available() {
            return;
        }
        for &(m, k, n) in &[(9, 7, 9), (7, 9, 8), (17, 3, 1)] {
            let a = ramp(m, k);
            let b = ramp(k, n);
            let mut gpu = Matrix::new(m, n);
            let mut host = Matrix::new(m, n);
            matmul("matrix_mult_tiled", true, &a, &b, &mut gpu).unwrap();
            cpu::matmul(&a, &b, &mut host);
            assert!(matrices_within(&gpu, &host, 1e-5), "{m}x{k} * {k}x{n}");
        }
    }

    #[test]
    fn elementwise_kernels_follow_host_conventions() {
        if !is_available() {
            return;
        }
        let a: Matrix<f32> = crate::matrix![[-1.0, 0.0, 2.0]];
        let mut out = Matrix::new(1, 3);
        elementwise(ElementwiseOp::ReluDerivative, &a, None, 0.0, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 1.0, 1.0]);

        let mut t = Matrix::new(3, 1);
        elementwise(ElementwiseOp::Transpose, &a, None, 0.0, &mut t).unwrap();
        assert_eq!(t.as_slice(), a.as_slice());
    }

    #[test]
    fn divisor_that_narrows_to_zero_is_rejected() {
        if !is_available() {
            return;
        }
        let a: Matrix<f64> = crate::matrix![[1.0, 2.0]];
        let mut out = Matrix::filled(1, 2, 3.0);
        for op in [ElementwiseOp::ScalarDiv, ElementwiseOp::Normalize] {
            let err = elementwise(op, &a, None, 1e-60, &mut out).unwrap_err();
            assert_eq!(err, Error::DivisionByZero { op: op.name() });
        }
        assert_eq!(out.as_slice(), &[3.0, 3.0]);

        // representable in f32, so still divides
        elementwise(ElementwiseOp::ScalarDiv, &a, None, 0.5, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[2.0, 4.0]);
    }
}
