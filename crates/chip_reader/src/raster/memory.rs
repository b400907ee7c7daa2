//! In-memory raster backend.
//!
//! `MemoryRaster` keeps one canonical `f64` plane per band and converts to
//! the requested pixel type on every read, the same implicit translation a
//! georeferenced backend performs. It doubles as the synthetic backend for
//! the test suite: pixel values can encode anything a test wants to verify
//! about a delivered chip.

use anyhow::{ensure, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{CoverageStatus, RasterOpener, RasterSource};
use crate::dtype::{write_word, PixelType};

/// An in-memory raster of `f64` band planes.
///
/// Cloning is cheap: the planes are reference-counted, so every clone is
/// an independent handle onto the same pixels.
#[derive(Clone)]
pub struct MemoryRaster {
    width: usize,
    height: usize,
    bands: Arc<[Vec<f64>]>,
    nodata: Option<f64>,
}

impl MemoryRaster {
    /// Creates a raster from row-major band planes, each `width * height`
    /// long.
    pub fn new(width: usize, height: usize, bands: Vec<Vec<f64>>) -> Result<Self> {
        ensure!(width > 0 && height > 0, "Raster dimensions must be nonzero");
        ensure!(!bands.is_empty(), "A raster needs at least one band");
        for (index, plane) in bands.iter().enumerate() {
            ensure!(
                plane.len() == width * height,
                "Band {} has {} samples, expected {}",
                index + 1,
                plane.len(),
                width * height
            );
        }
        Ok(Self {
            width,
            height,
            bands: Arc::from(bands),
            nodata: None,
        })
    }

    /// Creates a raster by evaluating `f(band, x, y)` over the grid.
    /// `band` is 1-based, matching the indices used in read requests.
    pub fn from_fn<F>(width: usize, height: usize, band_count: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f64,
    {
        let bands: Vec<Vec<f64>> = (1..=band_count)
            .map(|b| {
                let mut plane = Vec::with_capacity(width * height);
                for y in 0..height {
                    for x in 0..width {
                        plane.push(f(b, x, y));
                    }
                }
                plane
            })
            .collect();
        Self {
            width,
            height,
            bands: Arc::from(bands),
            nodata: None,
        }
    }

    /// Marks `value` as the nodata sentinel. A pixel counts as missing when
    /// every band holds the sentinel; the coverage probe classifies windows
    /// against that mask.
    pub fn with_nodata(mut self, value: f64) -> Self {
        self.nodata = Some(value);
        self
    }

    fn sample(&self, band: usize, x: usize, y: usize) -> f64 {
        self.bands[band - 1][y * self.width + x]
    }

    fn pixel_missing(&self, x: usize, y: usize) -> bool {
        match self.nodata {
            Some(sentinel) => (1..=self.bands.len()).all(|b| self.sample(b, x, y) == sentinel),
            None => false,
        }
    }

    fn check_window(&self, x: usize, y: usize, w: usize, h: usize) -> Result<()> {
        ensure!(w > 0 && h > 0, "Window dimensions must be nonzero");
        ensure!(
            x + w <= self.width && y + h <= self.height,
            "Window ({}, {}, {}, {}) exceeds raster extent {}x{}",
            x,
            y,
            w,
            h,
            self.width,
            self.height
        );
        Ok(())
    }
}

impl RasterSource for MemoryRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn coverage_status(&self, x: usize, y: usize, w: usize, h: usize) -> Result<CoverageStatus> {
        self.check_window(x, y, w, h)?;
        if self.nodata.is_none() {
            return Ok(CoverageStatus::Full);
        }
        let mut missing = 0usize;
        for row in y..y + h {
            for col in x..x + w {
                if self.pixel_missing(col, row) {
                    missing += 1;
                }
            }
        }
        Ok(match missing {
            0 => CoverageStatus::Full,
            n if n == w * h => CoverageStatus::Empty,
            _ => CoverageStatus::Partial,
        })
    }

    fn read_window(
        &mut self,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        dtype: PixelType,
        bands: &[usize],
        out: &mut [u8],
    ) -> Result<()> {
        self.check_window(x, y, w, h)?;
        ensure!(!bands.is_empty(), "The band list must name at least one band");
        for &band in bands {
            ensure!(
                band >= 1 && band <= self.bands.len(),
                "Band index {} out of range for a {}-band raster",
                band,
                self.bands.len()
            );
        }
        let word = dtype.word_size();
        let expected = word * bands.len() * w * h;
        ensure!(
            out.len() == expected,
            "Output buffer is {} bytes, expected {}",
            out.len(),
            expected
        );

        let mut offset = 0;
        for row in y..y + h {
            for col in x..x + w {
                for &band in bands {
                    let value = self.sample(band, col, row);
                    write_word(dtype, value, &mut out[offset..offset + word]);
                    offset += word;
                }
            }
        }
        Ok(())
    }
}

/// Opener serving `MemoryRaster` clones by path.
///
/// Paths registered through [`with_raster`](Self::with_raster) resolve to
/// their own raster (an imagery/label pair, say); anything else falls back
/// to the raster given at construction. Every `open` hands out a fresh
/// clone, so callers get independent handles onto shared pixels.
pub struct MemoryOpener {
    fallback: MemoryRaster,
    by_path: HashMap<PathBuf, MemoryRaster>,
}

impl MemoryOpener {
    pub fn new(fallback: MemoryRaster) -> Self {
        Self {
            fallback,
            by_path: HashMap::new(),
        }
    }

    /// Registers a raster under a specific path.
    pub fn with_raster(mut self, path: impl Into<PathBuf>, raster: MemoryRaster) -> Self {
        self.by_path.insert(path.into(), raster);
        self
    }
}

impl RasterOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterSource>> {
        let raster = self.by_path.get(path).unwrap_or(&self.fallback);
        Ok(Box::new(raster.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> MemoryRaster {
        MemoryRaster::from_fn(width, height, 1, |_b, x, y| (y * width + x) as f64)
    }

    #[test]
    fn rejects_mismatched_planes() {
        assert!(MemoryRaster::new(4, 4, vec![vec![0.0; 15]]).is_err());
        assert!(MemoryRaster::new(4, 4, vec![]).is_err());
        assert!(MemoryRaster::new(4, 4, vec![vec![0.0; 16]]).is_ok());
    }

    #[test]
    fn reads_are_pixel_interleaved_in_band_order() -> Result<()> {
        let raster = MemoryRaster::from_fn(4, 4, 3, |b, x, y| (b * 100 + y * 4 + x) as f64);
        let mut handle = raster;
        let mut out = vec![0u8; 2 * 3 * 2 * 2];
        handle.read_window(1, 2, 2, 2, PixelType::U16, &[3, 1, 2], &mut out)?;

        // First pixel (1, 2): bands 3, 1, 2 in order.
        let words: Vec<u16> = out
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(&words[..3], &[309, 109, 209]);
        // Second pixel (2, 2).
        assert_eq!(&words[3..6], &[310, 110, 210]);
        Ok(())
    }

    #[test]
    fn read_validates_extent_bands_and_buffer() {
        let mut raster = gradient(8, 8);
        let mut out = vec![0u8; 4];
        assert!(raster
            .read_window(7, 7, 2, 2, PixelType::U8, &[1], &mut out)
            .is_err());
        assert!(raster
            .read_window(0, 0, 2, 2, PixelType::U8, &[2], &mut out)
            .is_err());
        assert!(raster
            .read_window(0, 0, 2, 2, PixelType::U16, &[1], &mut out)
            .is_err());
        assert!(raster
            .read_window(0, 0, 2, 2, PixelType::U8, &[1], &mut out)
            .is_ok());
    }

    #[test]
    fn coverage_tracks_nodata_mask() -> Result<()> {
        // Left half nodata, right half data.
        let raster = MemoryRaster::from_fn(8, 8, 1, |_b, x, _y| if x < 4 { -1.0 } else { 1.0 })
            .with_nodata(-1.0);
        assert_eq!(raster.coverage_status(0, 0, 4, 4)?, CoverageStatus::Empty);
        assert_eq!(raster.coverage_status(4, 0, 4, 4)?, CoverageStatus::Full);
        assert_eq!(raster.coverage_status(2, 0, 4, 4)?, CoverageStatus::Partial);
        Ok(())
    }

    #[test]
    fn coverage_is_full_without_a_sentinel() -> Result<()> {
        let raster = gradient(8, 8);
        assert_eq!(raster.coverage_status(0, 0, 8, 8)?, CoverageStatus::Full);
        Ok(())
    }

    #[test]
    fn opener_routes_registered_paths() -> Result<()> {
        let labels = MemoryRaster::from_fn(4, 4, 1, |_b, _x, _y| 9.0);
        let opener = MemoryOpener::new(gradient(4, 4)).with_raster("labels", labels);
        let mut handle = opener.open(Path::new("labels"))?;
        let mut out = vec![0u8; 1];
        handle.read_window(0, 0, 1, 1, PixelType::U8, &[1], &mut out)?;
        assert_eq!(out[0], 9);
        Ok(())
    }

    #[test]
    fn opener_clones_share_pixels() -> Result<()> {
        let opener = MemoryOpener::new(gradient(4, 4));
        let mut a = opener.open(Path::new("ignored"))?;
        let mut b = opener.open(Path::new("ignored"))?;
        let mut out_a = vec![0u8; 4];
        let mut out_b = vec![0u8; 4];
        a.read_window(0, 0, 2, 2, PixelType::U8, &[1], &mut out_a)?;
        b.read_window(0, 0, 2, 2, PixelType::U8, &[1], &mut out_b)?;
        assert_eq!(out_a, out_b);
        Ok(())
    }
}
