//! Concurrent chip reader for very large georeferenced rasters.
//!
//! A pool of reader threads continuously extracts fixed-size windows
//! ("chips") from a raster and parks them in a bounded ring of prefetch
//! slots; the trainer drains the ring through a blocking pull call. Window
//! selection enforces a deterministic train/eval partition of the chip
//! grid, so the two sample populations can never overlap.
//!
//! The raster backend is abstracted behind [`RasterSource`] /
//! [`RasterOpener`]: the crate ships an in-memory implementation, and a
//! GDAL-backed one behind the `gdal` feature.

pub mod config;
pub mod dtype;
pub mod loader;
mod pool;
pub mod raster;
pub mod selector;
mod worker;

pub use config::{ChipLoaderConfig, ChipLoaderConfigBuilder, Mode};
pub use dtype::PixelType;
pub use loader::ChipLoader;
pub use raster::{CoverageStatus, MemoryOpener, MemoryRaster, RasterOpener, RasterSource};
pub use selector::WindowSampler;

/// One-time raster backend registration. Idempotent; see [`raster::init`].
pub fn init() {
    raster::init();
}

/// Backend teardown counterpart to [`init`]. See [`raster::deinit`].
pub fn deinit() {
    raster::deinit();
}
