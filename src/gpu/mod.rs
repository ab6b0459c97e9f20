// gpu/mod.rs — wgpu compute layer.
//
// Everything device-side lives here:
//
//   device  — adapter discovery, selection policy, device/queue creation,
//             workgroup sizing and dispatch geometry.
//   program — shader source collection (directory or embedded), module
//             build with failure diagnostics, per-entry-point pipeline
//             cache.
//   filter  — the gaussian filter driver: upload, dispatch, readback.
//
// There is exactly one submission path and completion is always waited on
// synchronously; nothing here is concurrent on the host side.

pub mod device;
pub mod filter;
pub mod program;
