//! The chip loader: lifecycle controller and consumer API.
//!
//! `ChipLoader::start` opens raster handles, allocates the slot ring, and
//! (in Training or Evaluation mode) spawns the reader workers. The trainer
//! then drains chips through `get_next`, which blocks until a prefetched
//! chip is available. Inference mode spawns nothing and serves synchronous
//! single-window reads through `get_inference_chip`.
//!
//! Shutdown is cooperative: `stop` (or dropping the loader) flips the mode
//! flag to Idle and joins every reader. An in-flight raster read is not
//! interrupted, so stop latency is bounded by the slowest outstanding read.

use anyhow::{bail, ensure, Context, Result};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::debug;

use crate::config::{ChipLoaderConfig, Mode};
use crate::pool::SlotPool;
use crate::raster::{CoverageStatus, RasterOpener, RasterSource};
use crate::selector::WindowSampler;
use crate::worker::{spawn_readers, ReaderSources, SharedState, SLOT_BACKOFF};

/// A running chip-reader instance.
///
/// Owns every resource of one run: the primary raster handle, the slot
/// ring, and the reader threads. Everything is released by [`stop`];
/// `Drop` performs the same shutdown, so a loader cannot outlive its
/// workers.
///
/// [`stop`]: ChipLoader::stop
pub struct ChipLoader {
    shared: Arc<SharedState>,
    workers: Vec<JoinHandle<()>>,
    /// The first handle opened; serves `get_inference_chip`. Reader workers
    /// hold their own handles. The mutex keeps the loader shareable across
    /// consumer threads; only the synchronous path ever takes it.
    primary: Mutex<Box<dyn RasterSource>>,
    width: usize,
    height: usize,
    cursor: AtomicUsize,
    imagery_bytes: usize,
    label_bytes: Option<usize>,
}

impl ChipLoader {
    /// Opens the rasters, allocates the slot ring, and spawns the readers.
    ///
    /// Every per-worker handle is opened before the first thread spawns, so
    /// any failure here unwinds through plain drops with no thread alive;
    /// the caller gets the error and nothing else.
    pub fn start(opener: &dyn RasterOpener, config: ChipLoaderConfig) -> Result<Self> {
        config.validate()?;

        let primary = opener
            .open(&config.imagery_path)
            .context("Failed to open the imagery raster")?;
        let width = primary.width();
        let height = primary.height();

        let sampler = WindowSampler::new(config.mode, width, height, config.window_size)?;
        for &band in &config.bands {
            ensure!(
                band <= primary.band_count(),
                "Band index {} out of range for a {}-band raster",
                band,
                primary.band_count()
            );
        }

        let imagery_bytes = config.imagery_chip_bytes();
        let label_bytes = config.label_path.as_ref().map(|_| config.label_chip_bytes());
        let pool = SlotPool::new(config.num_slots, imagery_bytes, label_bytes.unwrap_or(0));

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let num_readers = config.num_readers;
        let mode = config.mode;
        let shared = Arc::new(SharedState::new(mode, pool, config, sampler));

        let workers = if mode.spawns_readers() {
            let mut sources = Vec::with_capacity(num_readers);
            for worker_id in 0..num_readers {
                let imagery = opener
                    .open(&shared.config.imagery_path)
                    .with_context(|| format!("Failed to open imagery for reader {}", worker_id))?;
                let label = match &shared.config.label_path {
                    Some(path) => Some(opener.open(path).with_context(|| {
                        format!("Failed to open labels for reader {}", worker_id)
                    })?),
                    None => None,
                };
                sources.push(ReaderSources { imagery, label });
            }
            spawn_readers(&shared, sources, seed)?
        } else {
            Vec::new()
        };

        debug!(%mode, num_readers = workers.len(), width, height, "chip loader started");

        Ok(Self {
            shared,
            workers,
            primary: Mutex::new(primary),
            width,
            height,
            cursor: AtomicUsize::new(0),
            imagery_bytes,
            label_bytes,
        })
    }

    /// Cached raster width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Cached raster height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Exact byte size of one imagery chip, for sizing `get_next` buffers.
    pub fn imagery_chip_bytes(&self) -> usize {
        self.imagery_bytes
    }

    /// Exact byte size of one label chip, or `None` when the run has no
    /// label raster.
    pub fn label_chip_bytes(&self) -> Option<usize> {
        self.label_bytes
    }

    /// Blocks until a prefetched chip is available, then copies it out.
    ///
    /// The ring is drained in cursor order, not production order. Passing
    /// `None` for `label_out` skips the label copy; passing a buffer when
    /// the run has no label raster is an error. Buffer lengths must match
    /// [`imagery_chip_bytes`](Self::imagery_chip_bytes) and
    /// [`label_chip_bytes`](Self::label_chip_bytes) exactly.
    pub fn get_next(&self, imagery_out: &mut [u8], mut label_out: Option<&mut [u8]>) -> Result<()> {
        ensure!(
            self.shared.mode().spawns_readers(),
            "get_next requires Training or Evaluation mode"
        );
        ensure!(
            imagery_out.len() == self.imagery_bytes,
            "Imagery buffer is {} bytes, expected {}",
            imagery_out.len(),
            self.imagery_bytes
        );
        match (&label_out, self.label_bytes) {
            (Some(buffer), Some(expected)) => ensure!(
                buffer.len() == expected,
                "Label buffer is {} bytes, expected {}",
                buffer.len(),
                expected
            ),
            (Some(_), None) => {
                bail!("A label buffer was supplied but the run has no label raster")
            }
            (None, _) => {}
        }

        let num_slots = self.shared.pool.len();
        let mut misses = 0;
        loop {
            let position = self.cursor.fetch_add(1, Ordering::Relaxed);
            if let Some(mut guard) = self.shared.pool.get(position % num_slots).try_claim() {
                if guard.ready {
                    imagery_out.copy_from_slice(&guard.imagery);
                    if let Some(out) = label_out.as_deref_mut() {
                        out.copy_from_slice(&guard.label);
                    }
                    guard.ready = false;
                    return Ok(());
                }
            }
            misses += 1;
            if misses >= num_slots {
                // A full unsuccessful pass: back off before rescanning.
                thread::sleep(SLOT_BACKOFF);
                misses = 0;
            }
        }
    }

    /// Synchronous single-window read for Inference mode.
    ///
    /// Snaps `(x, y)` down to the chip grid and reads that window into
    /// `imagery_out`, retrying up to `attempts` times. Returns `true` once
    /// the buffer is filled. On any rejection (wrong mode, window outside
    /// the raster, empty coverage, wrong buffer size, `attempts`
    /// exhausted) the buffer is zeroed and the call returns `false`.
    pub fn get_inference_chip(
        &self,
        imagery_out: &mut [u8],
        x: usize,
        y: usize,
        attempts: usize,
    ) -> bool {
        if imagery_out.len() != self.imagery_bytes || self.shared.mode() != Mode::Inference {
            imagery_out.fill(0);
            return false;
        }

        let window = self.shared.config.window_size;
        let x = (x / window) * window;
        let y = (y / window) * window;
        if x + window > self.width || y + window > self.height {
            imagery_out.fill(0);
            return false;
        }

        let mut primary = match self.primary.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match primary.coverage_status(x, y, window, window) {
            Ok(CoverageStatus::Empty) | Err(_) => {
                imagery_out.fill(0);
                return false;
            }
            Ok(_) => {}
        }

        for attempt in 0..attempts {
            match primary.read_window(
                x,
                y,
                window,
                window,
                self.shared.config.imagery_dtype,
                &self.shared.config.bands,
                imagery_out,
            ) {
                Ok(()) => return true,
                Err(error) => {
                    debug!(x, y, attempt, %error, "inference read failed");
                }
            }
        }
        imagery_out.fill(0);
        false
    }

    /// Signals termination and joins every reader, then releases all
    /// resources. Returns only after the last worker has exited; the wait
    /// is bounded by the slowest in-flight raster read, which is never
    /// forcibly cancelled.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.set_mode(Mode::Idle);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("chip loader stopped");
    }
}

impl Drop for ChipLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
