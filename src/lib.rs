// blurforge: host-side harness for GPU gaussian image filtering.
//
// The crate is split the same way the work is split:
//
//   CPU side — `frame` (RGBA8 container), `bitmap` (file I/O),
//              `convolution` (reference blur the GPU path is validated
//              against).
//
//   GPU side — `gpu::device` (adapter discovery and selection),
//              `gpu::program` (shader collection, build, kernel cache),
//              `gpu::filter` (upload → dispatch → readback driver).
//
// The CPU implementation of the blur is authoritative: the GPU kernel is
// checked pixel-for-pixel against it in tests.

pub mod bitmap;
pub mod convolution;
pub mod frame;
pub mod gpu;
