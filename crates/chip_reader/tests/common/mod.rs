//! Shared synthetic rasters for the integration tests.
//!
//! Pixel values are chosen so a delivered chip proves where it came from:
//! origin-coded rasters store the chip-grid id of the containing chip in
//! every pixel, and band-coded rasters store `band * 10_000 + pixel index`
//! so band order is visible per pixel.

use chip_reader::{ChipLoaderConfig, MemoryRaster, Mode, PixelType};

/// Raster where every pixel holds the chip id `j * grid_width + i` of the
/// window containing it. Chip ids fit in a `u8` for the grids used here.
pub fn origin_coded_raster(width: usize, height: usize, window: usize) -> MemoryRaster {
    let grid_width = width / window;
    MemoryRaster::from_fn(width, height, 1, move |_b, x, y| {
        ((y / window) * grid_width + x / window) as f64
    })
}

/// Recovers the chip-grid origin from a chip delivered off an
/// origin-coded raster.
pub fn decode_origin(chip: &[u8], grid_width: usize) -> (usize, usize) {
    let id = chip[0] as usize;
    (id % grid_width, id / grid_width)
}

/// Multi-band raster with `band * 10_000 + (y * width + x)` per pixel,
/// readable as `u16` for the sizes used here.
pub fn band_coded_raster(width: usize, height: usize, bands: usize) -> MemoryRaster {
    MemoryRaster::from_fn(width, height, bands, move |b, x, y| {
        (b * 10_000 + y * width + x) as f64
    })
}

/// Reference configuration shared by the integration tests: 100-pixel
/// chips, two readers, four slots, single u8 band, fixed seed.
pub fn reference_config(mode: Mode) -> ChipLoaderConfig {
    ChipLoaderConfig::builder()
        .imagery_path("imagery")
        .imagery_dtype(PixelType::U8)
        .mode(mode)
        .window_size(100)
        .num_readers(2)
        .num_slots(4)
        .seed(42)
        .build()
}
