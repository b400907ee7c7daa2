//! GDAL raster backend (feature `gdal`).
//!
//! One `gdal::Dataset` per handle. GDAL datasets are not safe to share
//! across threads, which is the reason the loader opens a fresh handle for
//! every reader worker instead of sharing this one.

use anyhow::{ensure, Context, Result};
use gdal::Dataset;
use std::path::Path;

use super::{CoverageStatus, RasterOpener, RasterSource};
use crate::dtype::{write_word, PixelType};

pub(crate) fn register_drivers() {
    gdal::DriverManager::register_all();
}

/// A raster backed by one open GDAL dataset.
pub struct GdalRaster {
    dataset: Dataset,
    width: usize,
    height: usize,
    bands: usize,
}

impl GdalRaster {
    /// Opens any GDAL-supported raster (GeoTIFF, VRT, NetCDF, ...).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dataset = Dataset::open(path.as_ref())
            .with_context(|| format!("Failed to open raster {}", path.as_ref().display()))?;
        let (width, height) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        ensure!(bands > 0, "Raster {} has no bands", path.as_ref().display());
        Ok(Self {
            dataset,
            width,
            height,
            bands,
        })
    }

    fn read_band_window(&self, band: usize, x: usize, y: usize, w: usize, h: usize) -> Result<Vec<f64>> {
        let band = self.dataset.rasterband(band)?;
        let buffer = band.read_as::<f64>((x as isize, y as isize), (w, h), (w, h), None)?;
        Ok(buffer.data().to_vec())
    }
}

impl RasterSource for GdalRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands
    }

    fn coverage_status(&self, x: usize, y: usize, w: usize, h: usize) -> Result<CoverageStatus> {
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
        // Classify against the first band's nodata value. Without one the
        // dataset has no mask and every window counts as covered.
        let band = self.dataset.rasterband(1)?;
        let Some(sentinel) = band.no_data_value() else {
            return Ok(CoverageStatus::Full);
        };
        let samples = self.read_band_window(1, x, y, w, h)?;
        let missing = samples.iter().filter(|&&v| v == sentinel).count();
        Ok(match missing {
            0 => CoverageStatus::Full,
            n if n == samples.len() => CoverageStatus::Empty,
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
        ensure!(!bands.is_empty(), "The band list must name at least one band");
        for &band in bands {
            ensure!(
                band >= 1 && band <= self.bands,
                "Band index {} out of range for a {}-band raster",
                band,
                self.bands
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

        let stride = bands.len() * word;
        for (slot, &band) in bands.iter().enumerate() {
            let samples = self.read_band_window(band, x, y, w, h)?;
            for (pixel, &value) in samples.iter().enumerate() {
                let offset = pixel * stride + slot * word;
                write_word(dtype, value, &mut out[offset..offset + word]);
            }
        }
        Ok(())
    }
}

/// Opener producing one fresh `GdalRaster` per call.
pub struct GdalOpener;

impl RasterOpener for GdalOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterSource>> {
        Ok(Box::new(GdalRaster::open(path)?))
    }
}
