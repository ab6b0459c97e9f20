// gpu/filter.rs — The gaussian filter driver: upload, dispatch, readback.
//
// One call to `GaussianFilter::run` is the whole pipeline:
//
//   RgbaFrame ──staging buffer──► Rgba8Unorm texture (sampled)
//                                      │ gaussian_filter kernel
//                                      ▼
//             Rgba8Unorm storage texture ──readback buffer──► RgbaFrame
//
// Copies to and from textures require `bytes_per_row` to be a multiple
// of wgpu::COPY_BYTES_PER_ROW_ALIGNMENT (256), so both directions go
// through row-aligned staging memory; the padding is stripped before the
// result is returned.
//
// The readback blocks: `map_async` is requested, then the device is
// polled with `Maintain::Wait` until the copy lands. That is the one
// synchronization point on the submission path.

use wgpu::util::DeviceExt;

use crate::convolution::{gaussian_kernel_1d, MAX_HALF_SIZE};
use crate::frame::{RgbaFrame, BYTES_PER_PIXEL};
use crate::gpu::device::GpuDevice;
use crate::gpu::program::{Program, ProgramError, GAUSSIAN_KERNEL};

/// Filter parameters uploaded as a uniform buffer.
///
/// Layout must match `FilterParams` in `gaussian.wgsl`:
///   offset  0: width     (u32)
///   offset  4: height    (u32)
///   offset  8: half_size (u32)
///   offset 12: _pad      (u32)
///   offset 16: coeffs    (4 × vec4<f32>)
///   total:  80 bytes
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FilterParams {
    width: u32,
    height: u32,
    half_size: u32,
    _pad: u32,
    /// coeffs[i/4][i%4] = 1D kernel coefficient for offset i.
    coeffs: [[f32; 4]; 4],
}

impl FilterParams {
    /// Pack the right half of a full symmetric 1D kernel. `kernel` has
    /// odd length 2·half+1 with half <= [`MAX_HALF_SIZE`]; by symmetry
    /// only offsets 0..=half are carried.
    fn new(width: u32, height: u32, kernel: &[f32]) -> Self {
        assert!(kernel.len() % 2 == 1, "kernel must have odd length");
        let half = kernel.len() / 2;
        assert!(half <= MAX_HALF_SIZE, "kernel half-size {half} too large");

        let mut coeffs = [[0.0f32; 4]; 4];
        for (i, &c) in kernel[half..].iter().enumerate() {
            coeffs[i / 4][i % 4] = c;
        }

        FilterParams {
            width,
            height,
            half_size: half as u32,
            _pad: 0,
            coeffs,
        }
    }
}

/// The compiled gaussian filter: the program holding the kernel pipeline
/// plus the edge sampler.
///
/// Create once per program, run many times — pipeline creation is the
/// expensive part, a run is just buffers and one dispatch.
pub struct GaussianFilter {
    program: Program,
    sampler: wgpu::Sampler,
}

impl GaussianFilter {
    /// Take ownership of a built program, warm the `gaussian_filter`
    /// kernel in its cache (so a program without the kernel fails here,
    /// not mid-run), and create the sampler the kernel samples the
    /// source image through (clamp-to-edge, nearest — border pixels
    /// repeat outward, no interpolation).
    pub fn new(gpu: &GpuDevice, mut program: Program) -> Result<Self, ProgramError> {
        program.kernel(gpu, GAUSSIAN_KERNEL)?;
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("gaussian edge sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Ok(GaussianFilter { program, sampler })
    }

    /// Run the filter over a frame and return the filtered copy.
    ///
    /// Uploads the frame, dispatches one compute pass covering every
    /// pixel, and blocks until the result is read back. The returned
    /// frame is compact (stride == width).
    pub fn run(
        &mut self,
        gpu: &GpuDevice,
        src: &RgbaFrame,
        sigma: f32,
    ) -> Result<RgbaFrame, FilterError> {
        validate_sigma(sigma)?;
        let width = src.width() as u32;
        let height = src.height() as u32;
        if width == 0 || height == 0 {
            return Err(FilterError::EmptyFrame);
        }
        let max_dim = gpu.device.limits().max_texture_dimension_2d;
        if width > max_dim || height > max_dim {
            return Err(FilterError::FrameTooLarge { width, height, max_dim });
        }

        // Served from the cache after the warm-up in `new`.
        let pipeline = self.program.kernel(gpu, GAUSSIAN_KERNEL)?;

        // --- Input texture, filled through an aligned staging buffer ---
        let src_texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gaussian input"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let row_bytes = width * BYTES_PER_PIXEL as u32;
        let aligned_bytes_per_row =
            align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let mut staging =
            vec![0u8; (aligned_bytes_per_row * height) as usize];
        for y in 0..height as usize {
            let dst_start = y * aligned_bytes_per_row as usize;
            staging[dst_start..dst_start + row_bytes as usize]
                .copy_from_slice(src.row(y));
        }

        let staging_buf =
            gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("gaussian upload staging"),
                contents: &staging,
                usage: wgpu::BufferUsages::COPY_SRC,
            });

        // --- Output storage texture ---
        let dst_texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gaussian output"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        // --- Kernel arguments ---
        let kernel = gaussian_kernel_1d(sigma);
        let params = FilterParams::new(width, height, &kernel);
        let params_buf =
            gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("FilterParams"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let src_view =
            src_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view =
            dst_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gaussian bind group"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&dst_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        // --- Readback buffer the output is copied into ---
        let readback_buf = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gaussian readback"),
            size: (aligned_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // --- Encode: upload copy, compute pass, readback copy ---
        let mut encoder =
            gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gaussian filter"),
            });

        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &src_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );

        {
            let mut pass =
                encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("gaussian_filter"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = gpu.dispatch_size(width, height);
            pass.dispatch_workgroups(dx, dy, 1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &dst_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));

        // --- Blocking readback ---
        let buf_slice = readback_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buf_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| FilterError::Readback("map callback never fired".into()))?
            .map_err(|e| FilterError::Readback(e.to_string()))?;

        let mapped = buf_slice.get_mapped_range();
        let mut out = vec![0u8; (row_bytes * height) as usize];
        for y in 0..height as usize {
            let src_start = y * aligned_bytes_per_row as usize;
            let dst_start = y * row_bytes as usize;
            out[dst_start..dst_start + row_bytes as usize]
                .copy_from_slice(&mapped[src_start..src_start + row_bytes as usize]);
        }
        drop(mapped);
        readback_buf.unmap();

        Ok(RgbaFrame::from_vec(width as usize, height as usize, out))
    }
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Sigma arrives from user input (the demo's command line), so it is
/// checked here and returned as an error; the CPU reference's assert is
/// a programmer-error contract, not an input filter. NaN fails both
/// comparisons and is rejected with the rest.
fn validate_sigma(sigma: f32) -> Result<(), FilterError> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidSigma(sigma))
    }
}

/// Errors from a filter run.
#[derive(Debug)]
pub enum FilterError {
    /// Sigma must be a positive, finite number.
    InvalidSigma(f32),
    /// Zero-sized frames cannot be made into textures.
    EmptyFrame,
    /// Frame exceeds the device's 2D texture limit.
    FrameTooLarge { width: u32, height: u32, max_dim: u32 },
    /// Kernel lookup failed (the program no longer has the entry point).
    Program(ProgramError),
    /// The result buffer could not be mapped back to the host.
    Readback(String),
}

impl From<ProgramError> for FilterError {
    fn from(e: ProgramError) -> Self {
        FilterError::Program(e)
    }
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::InvalidSigma(sigma) => {
                write!(f, "sigma must be positive and finite, got {sigma}")
            }
            FilterError::EmptyFrame => write!(f, "cannot filter an empty frame"),
            FilterError::FrameTooLarge { width, height, max_dim } => write!(
                f,
                "frame {width}×{height} exceeds the device texture limit of {max_dim}"
            ),
            FilterError::Program(e) => write!(f, "kernel lookup failed: {e}"),
            FilterError::Readback(msg) => write!(f, "result readback failed: {msg}"),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Program(e) => Some(e),
            _ => None,
        }
    }
}
