//! Reader worker threads.
//!
//! Each worker owns its raster handles and its RNG, and shares only the
//! slot ring and the mode flag. The loop: draw an admissible window, walk
//! the ring for an empty slot with try-claims, read imagery (and label)
//! into the slot, mark it ready. Read errors are not surfaced: the worker
//! releases the slot, backs off, and starts over with a fresh window.
//!
//! The mode flag is the only termination signal. Workers re-check it after
//! every failed claim, and all back-off sleeps happen after the slot lock
//! is released, so `stop` is observed within one bounded iteration plus at
//! most one in-flight read.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use crate::config::{ChipLoaderConfig, Mode};
use crate::pool::SlotPool;
use crate::raster::RasterSource;
use crate::selector::WindowSampler;

/// Back-off after a busy or unavailable slot.
pub(crate) const SLOT_BACKOFF: Duration = Duration::from_micros(100);
/// Back-off after a failed raster read.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(1);
/// Rejection-sampling bound per window draw; a miss hands control back to
/// the loop so the mode flag stays responsive on hostile rasters.
const SAMPLE_ATTEMPTS: usize = 64;

/// State shared between the loader and its readers.
pub(crate) struct SharedState {
    mode: AtomicU8,
    pub pool: SlotPool,
    pub config: ChipLoaderConfig,
    pub sampler: WindowSampler,
}

impl SharedState {
    pub fn new(mode: Mode, pool: SlotPool, config: ChipLoaderConfig, sampler: WindowSampler) -> Self {
        Self {
            mode: AtomicU8::new(mode.as_u8()),
            pool,
            config,
            sampler,
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Stores the new mode with release ordering so workers that observe it
    /// also observe everything written before the transition.
    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode.as_u8(), Ordering::Release);
    }
}

/// The raster handles owned by one reader. Never shared.
pub(crate) struct ReaderSources {
    pub imagery: Box<dyn RasterSource>,
    pub label: Option<Box<dyn RasterSource>>,
}

/// Spawns one named reader thread per entry in `sources`. Worker `i` seeds
/// its RNG from `base_seed + i`, so runs with a fixed seed draw identical
/// window sequences per worker.
///
/// If any spawn fails, the threads already running are signalled through
/// the mode flag and joined before the error propagates, so a failed start
/// leaves nothing alive.
pub(crate) fn spawn_readers(
    shared: &Arc<SharedState>,
    sources: Vec<ReaderSources>,
    base_seed: u64,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(sources.len());
    for (worker_id, worker_sources) in sources.into_iter().enumerate() {
        let shared_worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(format!("chip-reader-{}", worker_id))
            .spawn(move || {
                let seed = base_seed.wrapping_add(worker_id as u64);
                run_reader(&shared_worker, worker_id, worker_sources, seed);
            })
            .with_context(|| format!("Failed to spawn reader thread {}", worker_id));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(error) => {
                shared.set_mode(Mode::Idle);
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(error);
            }
        }
    }
    Ok(handles)
}

fn run_reader(shared: &SharedState, worker_id: usize, mut sources: ReaderSources, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let window = shared.config.window_size;
    let num_slots = shared.pool.len();

    'produce: while shared.mode().spawns_readers() {
        let Some((x, y)) = shared
            .sampler
            .sample(&mut rng, sources.imagery.as_ref(), SAMPLE_ATTEMPTS)
        else {
            // Nothing admissible right now; yield and re-check the mode.
            thread::sleep(SLOT_BACKOFF);
            continue;
        };

        let mut slot_index = rng.random_range(0..num_slots);
        loop {
            if !shared.mode().spawns_readers() {
                break 'produce;
            }

            let Some(mut guard) = shared.pool.get(slot_index).try_claim() else {
                slot_index = (slot_index + 1) % num_slots;
                thread::sleep(SLOT_BACKOFF);
                continue;
            };
            if guard.ready {
                drop(guard);
                slot_index = (slot_index + 1) % num_slots;
                thread::sleep(SLOT_BACKOFF);
                continue;
            }

            if let Err(error) = sources.imagery.read_window(
                x,
                y,
                window,
                window,
                shared.config.imagery_dtype,
                &shared.config.bands,
                &mut guard.imagery,
            ) {
                drop(guard);
                debug!(worker_id, x, y, %error, "imagery read failed, redrawing window");
                thread::sleep(READ_ERROR_BACKOFF);
                continue 'produce;
            }

            if let Some(label_source) = sources.label.as_mut() {
                if let Err(error) = label_source.read_window(
                    x,
                    y,
                    window,
                    window,
                    shared.config.label_dtype,
                    &[1],
                    &mut guard.label,
                ) {
                    drop(guard);
                    debug!(worker_id, x, y, %error, "label read failed, redrawing window");
                    thread::sleep(READ_ERROR_BACKOFF);
                    continue 'produce;
                }
            }

            guard.ready = true;
            drop(guard);
            thread::yield_now();
            continue 'produce;
        }
    }

    debug!(worker_id, "reader exiting");
}
