// frame.rs — Host-side RGBA8 image container with explicit row stride.
//
// Memory layout (stride = 5 px, width = 4 px, 4 bytes per pixel):
//
//   byte index:  |-- row 0: 4 px --|pad|  |-- row 1: 4 px --|pad|  ...
//   pixel (x,y) starts at byte (y * stride + x) * 4.
//
// The stride exists so frames read back from the GPU can keep their
// row-alignment padding until the caller asks for a compact copy. Frames
// loaded from disk always have stride == width.

use std::fmt;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A 2D RGBA8 image with runtime dimensions.
///
/// Pixels are stored row-major as `[r, g, b, a]` byte quadruplets. The
/// stride is measured in *pixels*, not bytes, and satisfies
/// `stride >= width`.
pub struct RgbaFrame {
    /// Pixel data. Length = height * stride * 4 bytes.
    data: Vec<u8>,
    width: usize,
    height: usize,
    /// Row stride in pixels. Pixels for row y start at byte
    /// `y * stride * 4`.
    stride: usize,
}

impl RgbaFrame {
    /// Allocate a zeroed (transparent black) frame with stride == width.
    pub fn new(width: usize, height: usize) -> Self {
        RgbaFrame {
            data: vec![0u8; width * height * BYTES_PER_PIXEL],
            width,
            height,
            stride: width,
        }
    }

    /// Wrap an existing RGBA byte buffer with stride == width.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * 4`.
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width * height * BYTES_PER_PIXEL,
            "buffer length {} does not match {width}×{height} RGBA8",
            data.len()
        );
        RgbaFrame { data, width, height, stride: width }
    }

    /// Wrap an existing RGBA byte buffer with an explicit stride.
    ///
    /// # Panics
    /// Panics if `stride < width` or
    /// `data.len() != stride * height * 4`.
    pub fn from_vec_with_stride(
        width: usize,
        height: usize,
        stride: usize,
        data: Vec<u8>,
    ) -> Self {
        assert!(stride >= width, "stride {stride} < width {width}");
        assert_eq!(
            data.len(),
            stride * height * BYTES_PER_PIXEL,
            "buffer length {} does not match stride {stride} × height {height} RGBA8",
            data.len()
        );
        RgbaFrame { data, width, height, stride }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in pixels.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The raw byte buffer, padding included.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The active bytes of row `y` (padding excluded).
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride * BYTES_PER_PIXEL;
        &self.data[start..start + self.width * BYTES_PER_PIXEL]
    }

    /// Read the pixel at (x, y) as `[r, g, b, a]`.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    pub fn get(&self, x: usize, y: usize) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "({x},{y}) out of bounds");
        let i = (y * self.stride + x) * BYTES_PER_PIXEL;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Write the pixel at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    pub fn set(&mut self, x: usize, y: usize, px: [u8; 4]) {
        assert!(x < self.width && y < self.height, "({x},{y}) out of bounds");
        let i = (y * self.stride + x) * BYTES_PER_PIXEL;
        self.data[i..i + BYTES_PER_PIXEL].copy_from_slice(&px);
    }

    /// Iterate over `(x, y, [r, g, b, a])` for every active pixel,
    /// row-major, skipping stride padding.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, [u8; 4])> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| (x, y, self.get(x, y)))
        })
    }

    /// A compact copy with stride == width (padding stripped). Returns a
    /// plain byte vector of length `width * height * 4`.
    pub fn to_compact_bytes(&self) -> Vec<u8> {
        if self.stride == self.width {
            return self.data.clone();
        }
        let row_bytes = self.width * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_bytes * self.height);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }
}

impl fmt::Debug for RgbaFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RgbaFrame {{ {}×{}, stride {} }}",
            self.width, self.height, self.stride
        )
    }
}
