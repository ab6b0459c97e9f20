// gpu/device.rs — Adapter discovery, selection, and dispatch geometry.
//
// Responsibilities:
//   - Enumerate every adapter the native backends expose and log them,
//     so a run always records which hardware it picked.
//   - Select an adapter under a `DevicePolicy`: prefer a discrete GPU
//     (integrated GPUs are skipped while a dGPU might still turn up), or
//     take an explicit index when the caller knows what it wants.
//   - Create the device and queue, after gating on compute-shader
//     support — an adapter that cannot run compute kernels is useless to
//     this crate and better rejected up front than at dispatch time.
//   - Own the workgroup configuration (16×16 by default) and the ceiling
//     division that turns an image size into a workgroup grid. The
//     shader carries the matching bounds guard for the rounded-up edge.

use std::fmt;

/// How to pick an adapter from the enumerated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePolicy {
    /// Take the first discrete GPU; skip integrated GPUs while scanning.
    /// If no discrete GPU exists, fall back to the best non-CPU adapter,
    /// and as a last resort accept anything (with a warning), so the
    /// harness still runs on machines with only an iGPU or a software
    /// renderer.
    PreferDiscrete,
    /// Take the adapter at this position in the enumeration order.
    /// Out of range is an error.
    Index(usize),
}

impl Default for DevicePolicy {
    fn default() -> Self {
        DevicePolicy::PreferDiscrete
    }
}

/// A 2D workgroup configuration for the filter dispatch.
///
/// The product `x * y` must not exceed the device's
/// `max_compute_invocations_per_workgroup`; `GpuDevice::set_workgroup_size`
/// enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Default configuration: 16×16 = 256 invocations. Every compute-
    /// capable adapter wgpu exposes supports at least 256.
    pub const DEFAULT: WorkgroupSize = WorkgroupSize { x: 16, y: 16 };

    /// Total invocations per workgroup.
    pub fn total(&self) -> u32 {
        self.x * self.y
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter identity, kept for logging and error messages.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// The GPU context: device, queue, selected adapter identity, and the
/// active workgroup configuration.
///
/// Create once via [`GpuDevice::new`] or [`GpuDevice::with_policy`] and
/// reuse it for every program build and filter run — instance and device
/// initialization is the expensive part of the whole pipeline.
///
/// # Field drop order
/// `_instance` is declared last so the instance outlives the device and
/// queue; some drivers misbehave when the instance dies first.
#[derive(Debug)]
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    max_invocations: u32,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a device under the default policy (first discrete GPU,
    /// falling back as described on [`DevicePolicy::PreferDiscrete`]).
    pub fn new() -> Result<Self, GpuError> {
        Self::with_policy(DevicePolicy::PreferDiscrete)
    }

    /// Create a device under an explicit selection policy.
    pub fn with_policy(policy: DevicePolicy) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(policy))
    }

    async fn init_async(policy: DevicePolicy) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapters: Vec<wgpu::Adapter> =
            instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        if adapters.is_empty() {
            return Err(GpuError::NoAdapter);
        }

        eprintln!("[blurforge] {} adapter(s) found:", adapters.len());
        for (i, a) in adapters.iter().enumerate() {
            let info = a.get_info();
            eprintln!(
                "[blurforge]   {i}: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        let adapter = select_adapter(adapters, policy)?;

        // Gate on compute support before creating the device. Analogous
        // to refusing a device that reports no image support: everything
        // this crate does is a compute dispatch over textures.
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(GpuError::NoComputeSupport(adapter.get_info().name));
        }

        let raw = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw.name.clone(),
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
        };
        eprintln!("[blurforge] selected adapter: {adapter_info}");

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("blurforge"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let max_invocations =
            device.limits().max_compute_invocations_per_workgroup;
        let workgroup_size = WorkgroupSize::DEFAULT;
        debug_assert!(workgroup_size.total() <= max_invocations);

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            workgroup_size,
            max_invocations,
            _instance: instance,
        })
    }

    /// Override the default workgroup size.
    ///
    /// Returns `Err` if either dimension is zero or the total invocation
    /// count exceeds the device limit.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        validate_workgroup(x, y, self.max_invocations)?;
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    /// Workgroup counts covering an image of the given size: ceiling
    /// division per axis, so the grid covers every pixel even when the
    /// image dimensions are not workgroup multiples. The kernel guards
    /// against the out-of-bounds invocations this rounding creates.
    pub fn dispatch_size(&self, img_w: u32, img_h: u32) -> (u32, u32) {
        (
            img_w.div_ceil(self.workgroup_size.x),
            img_h.div_ceil(self.workgroup_size.y),
        )
    }

    /// Print a capability report for every visible adapter to stderr:
    /// identity plus the limits that matter to this harness.
    pub fn device_query() {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        eprintln!("[blurforge] {} adapter(s):", adapters.len());
        for (i, a) in adapters.iter().enumerate() {
            let info = a.get_info();
            let limits = a.limits();
            let downlevel = a.get_downlevel_capabilities();
            eprintln!("[blurforge] adapter {i}: {}", info.name);
            eprintln!("[blurforge]   backend:              {:?}", info.backend);
            eprintln!("[blurforge]   device type:          {:?}", info.device_type);
            eprintln!("[blurforge]   vendor/device id:     {:#06x}/{:#06x}", info.vendor, info.device);
            eprintln!("[blurforge]   driver:               {} {}", info.driver, info.driver_info);
            eprintln!(
                "[blurforge]   compute shaders:      {}",
                downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
            );
            eprintln!(
                "[blurforge]   max invocations/wg:   {}",
                limits.max_compute_invocations_per_workgroup
            );
            eprintln!(
                "[blurforge]   max workgroup dims:   {}×{}×{}",
                limits.max_compute_workgroup_size_x,
                limits.max_compute_workgroup_size_y,
                limits.max_compute_workgroup_size_z
            );
            eprintln!(
                "[blurforge]   max 2D texture dim:   {}",
                limits.max_texture_dimension_2d
            );
            eprintln!(
                "[blurforge]   max buffer size:      {}",
                limits.max_buffer_size
            );
        }
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, workgroup: {} }}",
            self.adapter_info, self.workgroup_size
        )
    }
}

/// Check a requested workgroup configuration against the device's
/// invocation limit. A zero dimension is its own error: it is not a
/// limits problem, it would dispatch nothing.
fn validate_workgroup(x: u32, y: u32, max: u32) -> Result<(), GpuError> {
    if x == 0 || y == 0 {
        return Err(GpuError::ZeroWorkgroupDim { x, y });
    }
    let total = x * y;
    if total > max {
        return Err(GpuError::WorkgroupTooLarge { total, max });
    }
    Ok(())
}

/// Apply the selection policy to the enumerated adapter list.
fn select_adapter(
    adapters: Vec<wgpu::Adapter>,
    policy: DevicePolicy,
) -> Result<wgpu::Adapter, GpuError> {
    match policy {
        DevicePolicy::Index(i) => {
            let count = adapters.len();
            adapters
                .into_iter()
                .nth(i)
                .ok_or(GpuError::InvalidDeviceIndex { index: i, count })
        }
        DevicePolicy::PreferDiscrete => {
            let mut fallback_real: Option<wgpu::Adapter> = None;
            let mut fallback_any: Option<wgpu::Adapter> = None;
            for a in adapters {
                match a.get_info().device_type {
                    wgpu::DeviceType::DiscreteGpu => return Ok(a),
                    // iGPUs are skipped while scanning for a dGPU but kept
                    // as the preferred fallback.
                    wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
                    | wgpu::DeviceType::Other => {
                        fallback_real.get_or_insert(a);
                    }
                    wgpu::DeviceType::Cpu => {
                        fallback_any.get_or_insert(a);
                    }
                }
            }
            if let Some(a) = fallback_real {
                eprintln!(
                    "[blurforge] no discrete GPU found — using {}",
                    a.get_info().name
                );
                return Ok(a);
            }
            if let Some(a) = fallback_any {
                eprintln!(
                    "[blurforge] warning: only a software adapter is available ({})",
                    a.get_info().name
                );
                return Ok(a);
            }
            Err(GpuError::NoAdapter)
        }
    }
}

/// Errors from device discovery and configuration.
#[derive(Debug)]
pub enum GpuError {
    /// Enumeration found no adapter at all. Check that a GPU driver with
    /// Vulkan/Metal/DX12 support is installed.
    NoAdapter,
    /// The selected adapter does not support compute shaders.
    NoComputeSupport(String),
    /// `DevicePolicy::Index` pointed past the end of the adapter list.
    InvalidDeviceIndex { index: usize, count: usize },
    /// The device request failed (driver problem, unsupported limits).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Requested workgroup size has a zero dimension.
    ZeroWorkgroupDim { x: u32, y: u32 },
    /// Requested workgroup size exceeds the device invocation limit.
    WorkgroupTooLarge { total: u32, max: u32 },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "no GPU adapter found"),
            GpuError::NoComputeSupport(name) => {
                write!(f, "adapter {name:?} does not support compute shaders")
            }
            GpuError::InvalidDeviceIndex { index, count } => write!(
                f,
                "invalid device index {index}: only {count} adapter(s) available"
            ),
            GpuError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            GpuError::ZeroWorkgroupDim { x, y } => write!(
                f,
                "workgroup dimensions must be non-zero, got {x}×{y}"
            ),
            GpuError::WorkgroupTooLarge { total, max } => write!(
                f,
                "workgroup size {total} exceeds the device limit of {max} invocations"
            ),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // GPU-touching tests are #[ignore]d so the suite passes on machines
    // without a usable adapter. Run them with:
    //   cargo test -- --include-ignored

    #[test]
    fn default_workgroup_is_16x16() {
        let ws = WorkgroupSize::DEFAULT;
        assert_eq!((ws.x, ws.y), (16, 16));
        assert_eq!(ws.total(), 256);
    }

    #[test]
    fn default_policy_prefers_discrete() {
        assert_eq!(DevicePolicy::default(), DevicePolicy::PreferDiscrete);
    }

    // dispatch_size is a pure function of the workgroup configuration; a
    // stub keeps these tests runnable without a device.
    struct DispatchStub {
        ws: WorkgroupSize,
    }

    impl DispatchStub {
        fn dispatch_size(&self, w: u32, h: u32) -> (u32, u32) {
            (w.div_ceil(self.ws.x), h.div_ceil(self.ws.y))
        }
    }

    #[test]
    fn dispatch_size_exact_multiple() {
        let s = DispatchStub { ws: WorkgroupSize::DEFAULT };
        assert_eq!(s.dispatch_size(512, 512), (32, 32));
        assert_eq!(s.dispatch_size(16, 16), (1, 1));
    }

    #[test]
    fn dispatch_size_rounds_up() {
        let s = DispatchStub { ws: WorkgroupSize::DEFAULT };
        // ceil(100/16) = 7.
        assert_eq!(s.dispatch_size(100, 100), (7, 7));
        assert_eq!(s.dispatch_size(17, 1), (2, 1));
        assert_eq!(s.dispatch_size(1, 1), (1, 1));
    }

    #[test]
    fn workgroup_validation_distinguishes_zero_from_too_large() {
        validate_workgroup(16, 16, 256).expect("16×16 fits in 256");
        validate_workgroup(1, 1, 256).expect("1×1 is always valid");

        let err = validate_workgroup(0, 16, 256).unwrap_err();
        assert!(matches!(err, GpuError::ZeroWorkgroupDim { x: 0, y: 16 }), "got {err}");
        assert!(err.to_string().contains("non-zero"), "message: {err}");
        let err = validate_workgroup(16, 0, 256).unwrap_err();
        assert!(matches!(err, GpuError::ZeroWorkgroupDim { .. }), "got {err}");

        let err = validate_workgroup(32, 32, 256).unwrap_err();
        assert!(matches!(err, GpuError::WorkgroupTooLarge { total: 1024, max: 256 }), "got {err}");
    }

    #[test]
    #[ignore = "requires a compute-capable GPU"]
    fn gpu_init_default_policy() {
        let gpu = GpuDevice::new().expect("should initialize a GPU device");
        eprintln!("{gpu}");
        assert!(gpu.workgroup_size.total() <= gpu.max_invocations);
    }

    #[test]
    #[ignore = "requires a compute-capable GPU"]
    fn gpu_invalid_index_is_rejected() {
        let err = GpuDevice::with_policy(DevicePolicy::Index(usize::MAX)).unwrap_err();
        assert!(matches!(err, GpuError::InvalidDeviceIndex { .. }), "got {err}");
    }

    #[test]
    #[ignore = "requires a compute-capable GPU"]
    fn gpu_workgroup_size_validation() {
        let mut gpu = GpuDevice::new().expect("should initialize a GPU device");
        // 16×16 must be accepted everywhere compute runs.
        gpu.set_workgroup_size(16, 16).expect("16×16 should be valid");
        // An absurd size must be rejected against the device limit.
        let err = gpu.set_workgroup_size(4096, 4096).unwrap_err();
        assert!(matches!(err, GpuError::WorkgroupTooLarge { .. }), "got {err}");
        // A zero dimension is rejected with its own error, not a limit one.
        let err = gpu.set_workgroup_size(0, 16).unwrap_err();
        assert!(matches!(err, GpuError::ZeroWorkgroupDim { .. }), "got {err}");
    }
}
