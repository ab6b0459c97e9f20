// bitmap.rs — Image file I/O.
//
// Loading always converts to RGBA8, whatever the file held — the filter
// pipeline works in one pixel format only. Saving infers the container
// format from the file extension (`.bmp`, `.png`, ...), so the caller
// chooses the format by naming the output file.

use std::fmt;
use std::path::Path;

use crate::frame::RgbaFrame;

/// Errors from bitmap loading and saving.
#[derive(Debug)]
pub enum BitmapError {
    /// Decode/encode failure from the image codec (unsupported format,
    /// corrupt file, unknown output extension).
    Codec(image::ImageError),
    /// Filesystem-level failure opening or creating the file.
    Io(std::io::Error),
}

impl fmt::Display for BitmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitmapError::Codec(e) => write!(f, "image codec error: {e}"),
            BitmapError::Io(e) => write!(f, "image file I/O error: {e}"),
        }
    }
}

impl std::error::Error for BitmapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BitmapError::Codec(e) => Some(e),
            BitmapError::Io(e) => Some(e),
        }
    }
}

impl From<image::ImageError> for BitmapError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => BitmapError::Io(io),
            other => BitmapError::Codec(other),
        }
    }
}

/// Load an image file and convert it to an RGBA8 frame.
///
/// Any format the `image` crate can decode is accepted; the pixel data is
/// converted to RGBA8 with stride == width.
pub fn load(path: impl AsRef<Path>) -> Result<RgbaFrame, BitmapError> {
    let img = image::open(path.as_ref())?.to_rgba8();
    let (w, h) = img.dimensions();
    // into_raw: row-major RGBA bytes, stride == width.
    Ok(RgbaFrame::from_vec(w as usize, h as usize, img.into_raw()))
}

/// Save a frame to disk. The container format is inferred from the file
/// extension; an unrecognized extension is a codec error.
///
/// Frames with stride padding are compacted before encoding.
pub fn save(path: impl AsRef<Path>, frame: &RgbaFrame) -> Result<(), BitmapError> {
    let bytes = frame.to_compact_bytes();
    image::save_buffer(
        path.as_ref(),
        &bytes,
        frame.width() as u32,
        frame.height() as u32,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(())
}
