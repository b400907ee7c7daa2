//! Raster source abstraction.
//!
//! A `RasterSource` is one handle onto a georeferenced raster: dimensions, a
//! coverage probe for rectangular windows, and typed window reads. Handles
//! are thread-confined (backends are generally not safe to share across
//! threads), so the loader opens one handle per reader worker through a
//! `RasterOpener`, plus a primary handle for the synchronous path.

use anyhow::Result;
use std::path::Path;
use std::sync::Once;

use crate::dtype::PixelType;

pub mod memory;

#[cfg(feature = "gdal")]
pub mod gdal;

pub use memory::{MemoryOpener, MemoryRaster};

/// Backend-reported coverage of a rectangular window.
#[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum CoverageStatus {
    /// Every pixel in the window is flagged "no data".
    Empty,
    /// Some pixels carry data.
    Partial,
    /// Every pixel carries data.
    Full,
}

/// One open raster handle.
///
/// Implementations must be `Send` so a handle can move onto the reader
/// thread that owns it; they are never shared between threads, which is why
/// `read_window` can take `&mut self`.
pub trait RasterSource: Send {
    /// Raster width in pixels.
    fn width(&self) -> usize;

    /// Raster height in pixels.
    fn height(&self) -> usize;

    /// Number of bands in the raster.
    fn band_count(&self) -> usize;

    /// Classifies the window `(x, y, w, h)` against the nodata mask.
    fn coverage_status(&self, x: usize, y: usize, w: usize, h: usize) -> Result<CoverageStatus>;

    /// Reads the window `(x, y, w, h)` into `out` as `dtype`-typed words,
    /// pixel-interleaved in the order of `bands` (1-based indices), natural
    /// stride, no padding. `out` must be exactly
    /// `dtype.word_size() * bands.len() * w * h` bytes.
    fn read_window(
        &mut self,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        dtype: PixelType,
        bands: &[usize],
        out: &mut [u8],
    ) -> Result<()>;
}

/// Opens fresh handles onto a raster, one per caller.
pub trait RasterOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterSource>>;
}

static BACKEND_INIT: Once = Once::new();

/// One-time raster backend registration. Idempotent: repeated calls behave
/// as one. With the `gdal` feature this registers the GDAL drivers; the
/// in-memory backend needs no setup.
pub fn init() {
    BACKEND_INIT.call_once(|| {
        #[cfg(feature = "gdal")]
        gdal::register_drivers();
    });
}

/// Backend teardown counterpart to [`init`]. Driver registries live for the
/// process, so this is a no-op today; it exists so hosts can pair the calls.
pub fn deinit() {}
