// gpu/program.rs — Shader source collection, program build, kernel cache.
//
// A `ShaderSet` is the concatenated WGSL source a program is built from.
// It comes from one of two places:
//
//   ShaderSet::from_dir  — every `*.wgsl` file in a directory, hidden
//                          files skipped, sorted by name so the build is
//                          deterministic.
//   ShaderSet::embedded  — the source compiled into the binary, for
//                          deployments with no shader directory on disk.
//
// A `Program` is the built shader module plus a cache of one compute
// pipeline per entry point, handed out by name. Pipeline layouts are
// derived from the shader (`layout: None`) so the cache serves any entry
// point without per-kernel layout plumbing.
//
// Workgroup dimensions are specialized by replacing the `{{WG_X}}` /
// `{{WG_Y}}` tokens in the source before compilation: naga does not
// accept `override` expressions inside `@workgroup_size`, so the values
// are baked into the text instead.
//
// On a failed build the runtime's error text is written to
// `build_log.txt` and the exact source that was compiled to
// `build_source.txt`, both in the working directory — when a driver
// rejects a shader, the message alone is rarely enough to debug it.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::gpu::device::GpuDevice;

/// File extension a shader source file must carry to be picked up.
const SHADER_EXTENSION: &str = "wgsl";

/// The gaussian filter kernel shipped with the crate, used by
/// [`ShaderSet::embedded`].
const EMBEDDED_SOURCE: &str = include_str!("../shaders/gaussian.wgsl");

/// Entry point name of the shipped gaussian kernel.
pub const GAUSSIAN_KERNEL: &str = "gaussian_filter";

/// A concatenated WGSL source ready to be built into a [`Program`].
#[derive(Debug)]
pub struct ShaderSet {
    source: String,
    /// Where the source came from, for logging and error context.
    origin: String,
}

impl ShaderSet {
    /// Collect every `.wgsl` file in `dir` into one source.
    ///
    /// Hidden files (leading '.') and files with any other extension are
    /// skipped. Files are concatenated in name order. An empty result is
    /// an error — a program with no kernels cannot do anything.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| ProgramError::ShaderDir(dir.to_path_buf(), e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| ProgramError::ShaderDir(dir.to_path_buf(), e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(SHADER_EXTENSION) {
                continue;
            }
            paths.push(path);
        }
        // Directory iteration order is filesystem-dependent; sort so the
        // concatenated program is stable across runs and machines.
        paths.sort();

        if paths.is_empty() {
            return Err(ProgramError::NoSources(dir.to_path_buf()));
        }

        let mut source = String::new();
        for path in &paths {
            let text = fs::read_to_string(path)
                .map_err(|e| ProgramError::ShaderDir(path.clone(), e))?;
            source.push_str(&text);
            source.push('\n');
        }

        eprintln!(
            "[blurforge] program source: {} file(s) from {}",
            paths.len(),
            dir.display()
        );
        Ok(ShaderSet { source, origin: dir.display().to_string() })
    }

    /// Use the source compiled into the binary (the shipped gaussian
    /// kernel). No filesystem access.
    pub fn embedded() -> Self {
        ShaderSet {
            source: EMBEDDED_SOURCE.to_string(),
            origin: "embedded".to_string(),
        }
    }

    /// The concatenated source before workgroup specialization.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Bake the workgroup dimensions into the source text.
    fn specialize(&self, wg_x: u32, wg_y: u32) -> String {
        self.source
            .replace("{{WG_X}}", &wg_x.to_string())
            .replace("{{WG_Y}}", &wg_y.to_string())
    }
}

/// A built shader module with a per-entry-point pipeline cache.
pub struct Program {
    module: wgpu::ShaderModule,
    /// One compute pipeline per entry point, created on first request.
    kernels: HashMap<String, wgpu::ComputePipeline>,
    origin: String,
}

impl Program {
    /// Build a program from a shader set, specialized to the device's
    /// active workgroup size.
    ///
    /// On failure the driver's error text is returned and also dumped to
    /// `build_log.txt` / `build_source.txt` in the working directory.
    pub fn build(gpu: &GpuDevice, set: &ShaderSet) -> Result<Self, ProgramError> {
        let source =
            set.specialize(gpu.workgroup_size.x, gpu.workgroup_size.y);

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("blurforge program"),
                source: wgpu::ShaderSource::Wgsl(source.clone().into()),
            });
        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            let log = err.to_string();
            dump_build_failure(&log, &source);
            return Err(ProgramError::Build { origin: set.origin.clone(), log });
        }

        eprintln!("[blurforge] program built ({})", set.origin);
        Ok(Program {
            module,
            kernels: HashMap::new(),
            origin: set.origin.clone(),
        })
    }

    /// Get the compute pipeline for the named entry point, creating and
    /// caching it on first use.
    pub fn kernel(
        &mut self,
        gpu: &GpuDevice,
        name: &str,
    ) -> Result<&wgpu::ComputePipeline, ProgramError> {
        if !self.kernels.contains_key(name) {
            gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipeline = gpu.device.create_compute_pipeline(
                &wgpu::ComputePipelineDescriptor {
                    label: Some(name),
                    // Layout derived from the shader's own binding
                    // declarations.
                    layout: None,
                    module: &self.module,
                    entry_point: name,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                },
            );
            if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
                return Err(ProgramError::Kernel {
                    name: name.to_string(),
                    log: err.to_string(),
                });
            }
            self.kernels.insert(name.to_string(), pipeline);
        }
        Ok(&self.kernels[name])
    }

    /// Number of pipelines created so far.
    pub fn cached_kernels(&self) -> usize {
        self.kernels.len()
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Program {{ origin: {}, cached kernels: {} }}",
            self.origin,
            self.kernels.len()
        )
    }
}

/// Write the failed build's log and source next to the working directory
/// so the rejected program can be inspected offline.
fn dump_build_failure(log: &str, source: &str) {
    if let Err(e) = fs::write("build_log.txt", log) {
        eprintln!("[blurforge] could not write build_log.txt: {e}");
    }
    if let Err(e) = fs::write("build_source.txt", source) {
        eprintln!("[blurforge] could not write build_source.txt: {e}");
    }
    eprintln!("[blurforge] program build failed — see build_log.txt / build_source.txt");
}

/// Errors from shader collection and program build.
#[derive(Debug)]
pub enum ProgramError {
    /// Could not read the shader directory or one of its files.
    ShaderDir(PathBuf, std::io::Error),
    /// The directory contained no `.wgsl` files.
    NoSources(PathBuf),
    /// The driver rejected the program; `log` is its error text.
    Build { origin: String, log: String },
    /// The named entry point could not be turned into a pipeline
    /// (typically: no such function in the program).
    Kernel { name: String, log: String },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::ShaderDir(path, e) => {
                write!(f, "failed to read shader path {}: {e}", path.display())
            }
            ProgramError::NoSources(dir) => {
                write!(f, "no .wgsl files found in {}", dir.display())
            }
            ProgramError::Build { origin, log } => {
                write!(f, "program build failed ({origin}): {log}")
            }
            ProgramError::Kernel { name, log } => {
                write!(f, "failed to create kernel {name:?}: {log}")
            }
        }
    }
}

impl std::error::Error for ProgramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProgramError::ShaderDir(_, e) => Some(e),
            _ => None,
        }
    }
}
