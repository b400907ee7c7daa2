//! Window selection and the train/eval partition.
//!
//! Chips live on a grid of `window_size`-aligned origins. A chip coordinate
//! `(i, j)` belongs to the training set when `(i + j) % 7 != 0` and to the
//! evaluation set when `(i + j) % 7 == 0`. The two predicates are disjoint
//! and together cover every coordinate, so the train and eval populations
//! never overlap. The split runs along anti-diagonals at roughly 6/7 train
//! to 1/7 eval.
//!
//! Sampling is uniform over chip coordinates with replacement; inadmissible
//! draws and windows the coverage probe reports as entirely empty are
//! rejected and redrawn. Evaluation reuses the same rejection sampling (see
//! [`WindowSampler::admissible_origins`] for the deterministic enumeration
//! of the same set).

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::Mode;
use crate::raster::{CoverageStatus, RasterSource};

/// Draws admissible chip origins for one mode over one raster's grid.
///
/// The grid spans `width / window_size` by `height / window_size` chips;
/// remainder pixels past the last full window are ignored.
#[derive(Copy, Clone, Debug)]
pub struct WindowSampler {
    mode: Mode,
    grid_width: usize,
    grid_height: usize,
    window_size: usize,
}

impl WindowSampler {
    pub fn new(mode: Mode, width: usize, height: usize, window_size: usize) -> Result<Self> {
        ensure!(
            window_size >= 1,
            "window_size must be >= 1, but got window_size={}",
            window_size
        );
        let grid_width = width / window_size;
        let grid_height = height / window_size;
        ensure!(
            grid_width >= 1 && grid_height >= 1,
            "window_size {} does not fit a {}x{} raster",
            window_size,
            width,
            height
        );
        Ok(Self {
            mode,
            grid_width,
            grid_height,
            window_size,
        })
    }

    /// The partition predicate on chip coordinates. Training and Evaluation
    /// are complementary; the other modes admit every coordinate.
    pub fn admissible(mode: Mode, i: usize, j: usize) -> bool {
        match mode {
            Mode::Training => (i + j) % 7 != 0,
            Mode::Evaluation => (i + j) % 7 == 0,
            Mode::Inference | Mode::Idle => true,
        }
    }

    /// Draws an admissible origin in pixel coordinates, or `None` after
    /// `max_attempts` rejections.
    ///
    /// Attempts are bounded so a caller polling a raster with no admissible
    /// window (all-empty coverage, or a grid too small for the mode's
    /// partition) regains control instead of spinning here; coverage-probe
    /// errors count as rejections.
    pub fn sample(
        &self,
        rng: &mut StdRng,
        source: &dyn RasterSource,
        max_attempts: usize,
    ) -> Option<(usize, usize)> {
        for _ in 0..max_attempts {
            let i = rng.random_range(0..self.grid_width);
            let j = rng.random_range(0..self.grid_height);
            if !Self::admissible(self.mode, i, j) {
                continue;
            }
            let x = i * self.window_size;
            let y = j * self.window_size;
            match source.coverage_status(x, y, self.window_size, self.window_size) {
                Ok(CoverageStatus::Empty) | Err(_) => continue,
                Ok(_) => return Some((x, y)),
            }
        }
        None
    }

    /// Deterministic row-major enumeration of the mode's admissible chip
    /// coordinates, ignoring coverage. This is the enumeration a
    /// deterministic evaluation pass would walk; the prefetch path itself
    /// samples with replacement.
    pub fn admissible_origins(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mode = self.mode;
        (0..self.grid_height).flat_map(move |j| {
            (0..self.grid_width)
                .filter(move |&i| Self::admissible(mode, i, j))
                .map(move |i| (i, j))
        })
    }

    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    pub fn grid_height(&self) -> usize {
        self.grid_height
    }
}
