//! Configuration for the chip loader.
//!
//! `ChipLoaderConfig` stores the parameters that control how chips are
//! prefetched. Everything here is copied into the loader at `start` and is
//! read-only for the lifetime of the run.
//!
//! Example:
//! ```ignore
//! let config = ChipLoaderConfig::builder()
//!     .imagery_path("s1_mosaic.tif")
//!     .imagery_dtype(PixelType::U16)
//!     .mode(Mode::Training)
//!     .window_size(256)
//!     .bands(vec![3, 1, 2])
//!     .num_readers(4)
//!     .num_slots(8)
//!     .build();
//! ```

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dtype::PixelType;

/// Run-wide operation mode.
///
/// `Idle` is the stopped state; `start` moves the loader into one of the
/// other three and `stop` moves it back. Training and Evaluation spawn
/// reader workers; Inference serves synchronous reads only.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    Idle = 0,
    Training = 1,
    Evaluation = 2,
    Inference = 3,
}

impl Mode {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Mode {
        match value {
            1 => Mode::Training,
            2 => Mode::Evaluation,
            3 => Mode::Inference,
            _ => Mode::Idle,
        }
    }

    /// True for the modes that run reader workers.
    pub(crate) fn spawns_readers(self) -> bool {
        matches!(self, Mode::Training | Mode::Evaluation)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Idle => "Idle",
            Mode::Training => "Training",
            Mode::Evaluation => "Evaluation",
            Mode::Inference => "Inference",
        };
        write!(f, "{}", s)
    }
}

/// Configuration for a [`ChipLoader`](crate::ChipLoader) run.
#[derive(Clone, Debug)]
pub struct ChipLoaderConfig {
    /// Number of reader worker threads (ignored in Inference mode).
    pub num_readers: usize,
    /// Number of prefetch slots in the ring.
    pub num_slots: usize,
    /// Path of the imagery raster.
    pub imagery_path: PathBuf,
    /// Path of the label raster, if one exists.
    pub label_path: Option<PathBuf>,
    /// Pixel type the imagery windows are read as.
    pub imagery_dtype: PixelType,
    /// Pixel type the label windows are read as (unused without `label_path`).
    pub label_dtype: PixelType,
    /// Operation mode for the run. Must not be `Idle`.
    pub mode: Mode,
    /// Chip edge length in pixels.
    pub window_size: usize,
    /// 1-based band indices, in the order they appear in delivered chips.
    pub bands: Vec<usize>,
    /// Base RNG seed for the reader workers. Worker `i` derives its own
    /// stream from `seed + i`; `None` picks a fresh seed per run.
    pub seed: Option<u64>,
}

impl Default for ChipLoaderConfig {
    fn default() -> Self {
        Self {
            num_readers: 1,
            num_slots: 2,
            imagery_path: PathBuf::new(),
            label_path: None,
            imagery_dtype: PixelType::U8,
            label_dtype: PixelType::U8,
            mode: Mode::Training,
            window_size: 256,
            bands: vec![1],
            seed: None,
        }
    }
}

impl ChipLoaderConfig {
    pub fn builder() -> ChipLoaderConfigBuilder {
        ChipLoaderConfigBuilder::default()
    }

    /// Exact byte size of one imagery chip payload.
    pub fn imagery_chip_bytes(&self) -> usize {
        self.imagery_dtype.word_size() * self.bands.len() * self.window_size * self.window_size
    }

    /// Exact byte size of one label chip payload (labels are single-band).
    pub fn label_chip_bytes(&self) -> usize {
        self.label_dtype.word_size() * self.window_size * self.window_size
    }

    /// Validates the raster-independent parts of the configuration.
    /// Raster-dependent checks (band indices, window fit) happen at `start`
    /// once the primary handle is open.
    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(
            self.mode != Mode::Idle,
            "Cannot start in Idle mode; pick Training, Evaluation, or Inference"
        );
        ensure!(
            self.num_readers >= 1,
            "num_readers must be >= 1, but got num_readers={}",
            self.num_readers
        );
        ensure!(
            self.num_slots >= 1,
            "num_slots must be >= 1, but got num_slots={}",
            self.num_slots
        );
        ensure!(
            self.window_size >= 1,
            "window_size must be >= 1, but got window_size={}",
            self.window_size
        );
        ensure!(
            !self.bands.is_empty(),
            "The band list must name at least one band"
        );
        ensure!(
            self.bands.iter().all(|&b| b >= 1),
            "Band indices are 1-based; 0 is not a valid band"
        );
        Ok(())
    }
}

/// Builder for `ChipLoaderConfig` with method chaining.
#[derive(Default)]
pub struct ChipLoaderConfigBuilder {
    config: ChipLoaderConfig,
}

impl ChipLoaderConfigBuilder {
    /// Set the number of reader workers (must be >= 1).
    pub fn num_readers(mut self, n: usize) -> Self {
        self.config.num_readers = n;
        self
    }

    /// Set the number of prefetch slots (must be >= 1).
    pub fn num_slots(mut self, m: usize) -> Self {
        self.config.num_slots = m;
        self
    }

    /// Set the imagery raster path.
    pub fn imagery_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.imagery_path = path.into();
        self
    }

    /// Set the label raster path. Leaving it unset runs without labels.
    pub fn label_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.label_path = Some(path.into());
        self
    }

    /// Set the imagery pixel type.
    pub fn imagery_dtype(mut self, dtype: PixelType) -> Self {
        self.config.imagery_dtype = dtype;
        self
    }

    /// Set the label pixel type.
    pub fn label_dtype(mut self, dtype: PixelType) -> Self {
        self.config.label_dtype = dtype;
        self
    }

    /// Set the operation mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the chip edge length in pixels.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        self
    }

    /// Set the 1-based band indices. Delivered chips interleave pixel
    /// values in exactly this order.
    pub fn bands(mut self, bands: Vec<usize>) -> Self {
        self.config.bands = bands;
        self
    }

    /// Set the base RNG seed for reproducible window selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ChipLoaderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_valid() {
        let config = ChipLoaderConfig::builder().build();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_readers, 1);
        assert_eq!(config.bands, vec![1]);
    }

    #[test]
    fn rejects_invalid_counts() {
        assert!(ChipLoaderConfig::builder()
            .num_readers(0)
            .build()
            .validate()
            .is_err());
        assert!(ChipLoaderConfig::builder()
            .num_slots(0)
            .build()
            .validate()
            .is_err());
        assert!(ChipLoaderConfig::builder()
            .window_size(0)
            .build()
            .validate()
            .is_err());
        assert!(ChipLoaderConfig::builder()
            .bands(vec![])
            .build()
            .validate()
            .is_err());
        assert!(ChipLoaderConfig::builder()
            .bands(vec![0])
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_idle_mode() {
        let config = ChipLoaderConfig::builder().mode(Mode::Idle).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn payload_sizes_follow_dtype_and_bands() {
        let config = ChipLoaderConfig::builder()
            .window_size(100)
            .bands(vec![3, 1, 2])
            .imagery_dtype(PixelType::U16)
            .label_dtype(PixelType::I32)
            .build();
        assert_eq!(config.imagery_chip_bytes(), 2 * 3 * 100 * 100);
        assert_eq!(config.label_chip_bytes(), 4 * 100 * 100);
    }

    #[test]
    fn mode_round_trips_through_u8() {
        for mode in [Mode::Idle, Mode::Training, Mode::Evaluation, Mode::Inference] {
            assert_eq!(Mode::from_u8(mode.as_u8()), mode);
        }
        assert_eq!(Mode::from_u8(200), Mode::Idle);
    }
}
